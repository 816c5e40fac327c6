use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use shared::Amount;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::Bet,
    errors::{AppError, Result},
    state::AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct PlaceBetRequest {
    pub account_id: i64,
    pub draw_id: i64,
    #[validate(length(min = 2, max = 3))]
    pub number: String,
    #[validate(range(min = 1))]
    pub stake: i64,
}

#[derive(Debug, Serialize)]
pub struct PlaceBetResponse {
    pub bet: Bet,
}

pub async fn place_bet(
    State(state): State<AppState>,
    Json(req): Json<PlaceBetRequest>,
) -> Result<Json<PlaceBetResponse>> {
    req.validate()
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;

    let stake = Amount::new(req.stake).map_err(|e| AppError::InvalidInput(e.to_string()))?;
    let bet = state
        .bets
        .place_bet(req.account_id, req.draw_id, &req.number, stake)
        .await?;

    Ok(Json(PlaceBetResponse { bet }))
}

#[derive(Debug, Deserialize)]
pub struct ListBetsQuery {
    pub account_id: i64,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_bets(
    State(state): State<AppState>,
    Query(query): Query<ListBetsQuery>,
) -> Result<Json<Vec<Bet>>> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    let bets = state
        .bets
        .bets_for_account(query.account_id, limit, offset)
        .await?;

    tracing::debug!(
        account_id = query.account_id,
        bet_count = bets.len(),
        "Retrieved bet history"
    );
    Ok(Json(bets))
}

#[derive(Debug, Deserialize)]
pub struct CancelBetRequest {
    pub account_id: i64,
}

pub async fn cancel_bet(
    State(state): State<AppState>,
    Path(bet_id): Path<Uuid>,
    Json(req): Json<CancelBetRequest>,
) -> Result<Json<Bet>> {
    let bet = state.bets.cancel_bet(req.account_id, bet_id).await?;
    Ok(Json(bet))
}
