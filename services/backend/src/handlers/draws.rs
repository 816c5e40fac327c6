use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use shared::GameType;
use validator::Validate;

use crate::{
    domain::{Draw, SettlementSummary},
    errors::{AppError, Result},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ListDrawsQuery {
    pub game_type: Option<String>,
}

pub async fn list_draws(
    State(state): State<AppState>,
    Query(query): Query<ListDrawsQuery>,
) -> Result<Json<Vec<Draw>>> {
    let game_type: GameType = query
        .game_type
        .as_deref()
        .unwrap_or("two_digit")
        .parse()
        .map_err(|_| AppError::InvalidInput("unknown game type".to_string()))?;

    let draws = state.registry.open_draws(game_type).await?;
    Ok(Json(draws))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitResultRequest {
    #[validate(length(min = 2, max = 3))]
    pub winning_number: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitResultResponse {
    pub summary: SettlementSummary,
    pub next_draw: Draw,
}

/// Settle the draw against the submitted result, then schedule the next
/// round of the same game
pub async fn submit_result(
    State(state): State<AppState>,
    Path(draw_id): Path<i64>,
    Json(req): Json<SubmitResultRequest>,
) -> Result<Json<SubmitResultResponse>> {
    req.validate()
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;

    let draw = state
        .store
        .draw(draw_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Draw {} not found", draw_id)))?;

    let summary = state.settlement.settle(draw_id, &req.winning_number).await?;
    let next_draw = state.scheduler.schedule_next(draw.game_type).await?;

    Ok(Json(SubmitResultResponse { summary, next_draw }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateMultiplierRequest {
    pub multiplier: i64,
}

pub async fn update_multiplier(
    State(state): State<AppState>,
    Path(draw_id): Path<i64>,
    Json(req): Json<UpdateMultiplierRequest>,
) -> Result<Json<Draw>> {
    let draw = state
        .registry
        .update_multiplier(draw_id, req.multiplier)
        .await?;
    Ok(Json(draw))
}

#[derive(Debug, Deserialize)]
pub struct ScheduleDrawRequest {
    pub game_type: String,
}

/// Manually schedule the next draw for a game (bootstrap and operator
/// tooling; settlement schedules the follow-up draw automatically)
pub async fn schedule_draw(
    State(state): State<AppState>,
    Json(req): Json<ScheduleDrawRequest>,
) -> Result<Json<Draw>> {
    let game_type: GameType = req
        .game_type
        .parse()
        .map_err(|_| AppError::InvalidInput("unknown game type".to_string()))?;

    let draw = state.scheduler.schedule_next(game_type).await?;
    Ok(Json(draw))
}
