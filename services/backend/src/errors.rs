use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use shared::{Amount, AmountError};
use uuid::Uuid;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Amount, requested: Amount },

    #[error("account {0} not found")]
    AccountNotFound(i64),

    #[error("version conflict on account {0}")]
    VersionConflict(i64),

    #[error("amount arithmetic failed: {0}")]
    Amount(#[from] AmountError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WalletError {
    /// Whether a retry of the whole operation can succeed without any
    /// external state change
    pub fn is_transient(&self) -> bool {
        match self {
            WalletError::VersionConflict(_) => true,
            WalletError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("draw {0} not found")]
    NotFound(i64),

    #[error("betting window closed for draw {0}")]
    Closed(i64),

    #[error("draw {0} already completed")]
    AlreadyCompleted(i64),

    #[error("winning number must be exactly {expected} digits")]
    InvalidWinningNumber { expected: usize },

    #[error("multiplier must be greater than 1")]
    InvalidMultiplier,

    #[error("multiplier can only be changed on upcoming draws")]
    NotUpcoming,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum BetError {
    #[error("draw is closed for betting")]
    DrawClosed,

    #[error("stake out of range: must be between {min} and {max}")]
    InvalidStake { min: Amount, max: Amount },

    #[error("number must be exactly {expected} digits")]
    InvalidNumber { expected: usize },

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("account {0} not found")]
    AccountNotFound(i64),

    #[error("bet {0} not found")]
    BetNotFound(Uuid),

    #[error("bet can no longer be cancelled")]
    NotCancellable,

    #[error("storage conflict, retries exhausted")]
    Conflict,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("draw {0} not found")]
    DrawNotFound(i64),

    #[error("draw {0} already settled")]
    AlreadySettled(i64),

    #[error("winning number must be exactly {expected} digits")]
    InvalidWinningNumber { expected: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Bet(#[from] BetError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Bet(e) => match e {
                BetError::DrawClosed
                | BetError::InvalidStake { .. }
                | BetError::InvalidNumber { .. }
                | BetError::InsufficientBalance
                | BetError::NotCancellable => (StatusCode::BAD_REQUEST, e.to_string()),
                BetError::AccountNotFound(_) | BetError::BetNotFound(_) => {
                    (StatusCode::NOT_FOUND, e.to_string())
                }
                BetError::Conflict => (StatusCode::CONFLICT, e.to_string()),
                BetError::Store(inner) => {
                    tracing::error!(error = ?inner, "Store error during bet operation");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
            AppError::Settlement(e) => match e {
                SettlementError::AlreadySettled(_) => (StatusCode::CONFLICT, e.to_string()),
                SettlementError::DrawNotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
                SettlementError::InvalidWinningNumber { .. } => {
                    (StatusCode::BAD_REQUEST, e.to_string())
                }
                SettlementError::Store(inner) => {
                    tracing::error!(error = ?inner, "Store error during settlement");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
            AppError::Registry(e) => match e {
                RegistryError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
                RegistryError::Closed(_)
                | RegistryError::AlreadyCompleted(_)
                | RegistryError::InvalidWinningNumber { .. }
                | RegistryError::InvalidMultiplier
                | RegistryError::NotUpcoming => (StatusCode::BAD_REQUEST, e.to_string()),
                RegistryError::Store(inner) => {
                    tracing::error!(error = ?inner, "Store error during registry operation");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
            AppError::Wallet(e) => match e {
                WalletError::InsufficientFunds { .. } => (StatusCode::BAD_REQUEST, e.to_string()),
                WalletError::AccountNotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
                WalletError::VersionConflict(_) => (StatusCode::CONFLICT, e.to_string()),
                WalletError::Amount(_) => (StatusCode::BAD_REQUEST, e.to_string()),
                WalletError::Store(inner) => {
                    tracing::error!(error = ?inner, "Store error during wallet operation");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
            AppError::Store(e) => {
                tracing::error!(error = ?e, "Store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(e) => {
                tracing::error!(error = ?e, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
