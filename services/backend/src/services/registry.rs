//! Lottery registry: draw lifecycle and bet-window validation.
//!
//! `complete` is the linchpin against double settlement: the underlying
//! conditional update lets exactly one caller through, every other caller
//! (including retries of the same request) observes `AlreadyCompleted`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::GameType;

use crate::domain::{Draw, DrawStatus};
use crate::errors::RegistryError;
use crate::store::{Store, StoreTx};

pub struct LotteryRegistry {
    store: Arc<dyn Store>,
}

impl LotteryRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Earliest draw still accepting bets for a game, if any
    pub async fn open_draw(&self, game_type: GameType) -> Result<Option<Draw>, RegistryError> {
        let draws = self.store.open_draws(game_type, Utc::now()).await?;
        Ok(draws.into_iter().next())
    }

    /// All draws still accepting bets for a game, earliest first
    pub async fn open_draws(&self, game_type: GameType) -> Result<Vec<Draw>, RegistryError> {
        Ok(self.store.open_draws(game_type, Utc::now()).await?)
    }

    /// Load the draw inside the caller's transaction and verify its
    /// betting window is still open at `now`
    pub async fn validate_window(
        &self,
        tx: &mut dyn StoreTx,
        draw_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Draw, RegistryError> {
        let draw = tx
            .draw(draw_id)
            .await?
            .ok_or(RegistryError::NotFound(draw_id))?;
        if !draw.is_open(now) {
            return Err(RegistryError::Closed(draw_id));
        }
        Ok(draw)
    }

    /// Transition a draw to completed and freeze its winning number.
    /// Exactly one caller succeeds; all later callers (settlement
    /// retries included) get `AlreadyCompleted`.
    pub async fn complete(
        &self,
        tx: &mut dyn StoreTx,
        draw_id: i64,
        winning_number: &str,
    ) -> Result<Draw, RegistryError> {
        let draw = tx
            .draw(draw_id)
            .await?
            .ok_or(RegistryError::NotFound(draw_id))?;

        if !draw.game_type.is_valid_number(winning_number) {
            return Err(RegistryError::InvalidWinningNumber {
                expected: draw.game_type.digit_width(),
            });
        }

        if !tx.complete_draw(draw_id, winning_number).await? {
            return Err(RegistryError::AlreadyCompleted(draw_id));
        }

        tracing::info!(draw_id, winning_number, "Draw completed");
        Ok(Draw {
            status: DrawStatus::Completed,
            winning_number: Some(winning_number.to_string()),
            ..draw
        })
    }

    /// Change the payout multiplier of an upcoming draw. Draws that are
    /// ongoing or completed keep the multiplier their bets were priced
    /// with.
    pub async fn update_multiplier(
        &self,
        draw_id: i64,
        multiplier: i64,
    ) -> Result<Draw, RegistryError> {
        if multiplier <= 1 {
            return Err(RegistryError::InvalidMultiplier);
        }

        let mut tx = self.store.begin().await?;
        let draw = tx
            .draw(draw_id)
            .await?
            .ok_or(RegistryError::NotFound(draw_id))?;
        if draw.status != DrawStatus::Upcoming {
            tx.rollback().await?;
            return Err(RegistryError::NotUpcoming);
        }
        if !tx.update_multiplier(draw_id, multiplier).await? {
            tx.rollback().await?;
            return Err(RegistryError::NotUpcoming);
        }
        tx.commit().await?;

        tracing::info!(draw_id, multiplier, "Draw multiplier updated");
        Ok(Draw { multiplier, ..draw })
    }
}
