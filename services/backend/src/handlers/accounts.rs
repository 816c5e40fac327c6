use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use shared::Amount;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{Account, LedgerEntry},
    errors::{AppError, Result},
    state::AppState,
};

pub async fn create_account(State(state): State<AppState>) -> Result<Json<Account>> {
    let account = state.store.create_account().await?;
    tracing::info!(account_id = account.account_id, "Account created");
    Ok(Json(account))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> Result<Json<Account>> {
    let account = state
        .store
        .account(account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Account {} not found", account_id)))?;
    Ok(Json(account))
}

#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_ledger(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<Vec<LedgerEntry>>> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    let entries = state.store.ledger_entries(account_id, limit, offset).await?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize, Validate)]
pub struct MoveFundsRequest {
    #[validate(range(min = 1))]
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct MoveFundsResponse {
    pub entry: LedgerEntry,
    pub balance: Amount,
}

pub async fn deposit(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Json(req): Json<MoveFundsRequest>,
) -> Result<Json<MoveFundsResponse>> {
    req.validate()
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;

    let amount = Amount::new(req.amount).map_err(|e| AppError::InvalidInput(e.to_string()))?;
    let entry = state
        .wallet
        .deposit(account_id, amount, Uuid::new_v4())
        .await?;
    let balance = current_balance(&state, account_id).await?;

    tracing::info!(account_id, amount = %amount, "Deposit completed");
    metrics::counter!("deposits_total").increment(1);
    Ok(Json(MoveFundsResponse { entry, balance }))
}

pub async fn withdraw(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Json(req): Json<MoveFundsRequest>,
) -> Result<Json<MoveFundsResponse>> {
    req.validate()
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;

    let amount = Amount::new(req.amount).map_err(|e| AppError::InvalidInput(e.to_string()))?;
    let entry = state
        .wallet
        .withdraw(account_id, amount, Uuid::new_v4())
        .await?;
    let balance = current_balance(&state, account_id).await?;

    tracing::info!(account_id, amount = %amount, "Withdrawal completed");
    metrics::counter!("withdrawals_total").increment(1);
    Ok(Json(MoveFundsResponse { entry, balance }))
}

async fn current_balance(state: &AppState, account_id: i64) -> Result<Amount> {
    let account = state
        .store
        .account(account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Account {} not found", account_id)))?;
    Ok(account.balance)
}
