//! Bet engine: admission of new bets and cancellation of pending ones.
//!
//! Placement runs window check, stake/number validation, funds
//! reservation and the bet insert inside one store transaction, so a
//! failed reservation can never leave a bet row behind and a crash can
//! never leave funds reserved without a bet.

use std::sync::Arc;

use chrono::Utc;
use shared::{Amount, MAX_BALANCE_RETRIES};
use uuid::Uuid;

use crate::domain::{Bet, BetStatus, DrawStatus};
use crate::errors::{BetError, RegistryError, WalletError};
use crate::services::registry::LotteryRegistry;
use crate::services::wallet::WalletService;
use crate::store::{NewBet, Store};

pub struct BetEngine {
    store: Arc<dyn Store>,
    wallet: Arc<WalletService>,
    registry: Arc<LotteryRegistry>,
}

impl BetEngine {
    pub fn new(
        store: Arc<dyn Store>,
        wallet: Arc<WalletService>,
        registry: Arc<LotteryRegistry>,
    ) -> Self {
        Self {
            store,
            wallet,
            registry,
        }
    }

    /// Validate and record a bet, reserving the stake atomically.
    ///
    /// The whole admission commits or rolls back as one unit; version
    /// conflicts on the account are retried in a fresh transaction up to
    /// MAX_BALANCE_RETRIES times.
    pub async fn place_bet(
        &self,
        account_id: i64,
        draw_id: i64,
        number: &str,
        stake: Amount,
    ) -> Result<Bet, BetError> {
        let span = tracing::info_span!("place_bet", account_id, draw_id, number, stake = %stake);
        let _enter = span.enter();

        for _ in 0..MAX_BALANCE_RETRIES {
            let mut tx = self.store.begin().await?;

            let draw = match self
                .registry
                .validate_window(&mut *tx, draw_id, Utc::now())
                .await
            {
                Ok(draw) => draw,
                Err(RegistryError::NotFound(_)) | Err(RegistryError::Closed(_)) => {
                    tx.rollback().await?;
                    return Err(BetError::DrawClosed);
                }
                Err(RegistryError::Store(e)) => return Err(e.into()),
                Err(e) => {
                    tx.rollback().await?;
                    tracing::error!(error = %e, "Unexpected window validation failure");
                    return Err(BetError::DrawClosed);
                }
            };

            if stake < draw.min_bet || stake > draw.max_bet {
                tx.rollback().await?;
                return Err(BetError::InvalidStake {
                    min: draw.min_bet,
                    max: draw.max_bet,
                });
            }

            if !draw.game_type.is_valid_number(number) {
                tx.rollback().await?;
                return Err(BetError::InvalidNumber {
                    expected: draw.game_type.digit_width(),
                });
            }

            let bet_id = Uuid::new_v4();
            // frozen at creation; later multiplier changes do not touch it
            let potential_payout =
                stake
                    .checked_mul(draw.multiplier)
                    .map_err(|_| BetError::InvalidStake {
                        min: draw.min_bet,
                        max: draw.max_bet,
                    })?;

            match self
                .wallet
                .reserve(&mut *tx, account_id, stake, bet_id)
                .await
            {
                Ok(_) => {}
                Err(WalletError::InsufficientFunds { .. }) => {
                    tx.rollback().await?;
                    return Err(BetError::InsufficientBalance);
                }
                Err(WalletError::AccountNotFound(id)) => {
                    tx.rollback().await?;
                    return Err(BetError::AccountNotFound(id));
                }
                Err(WalletError::VersionConflict(_)) => {
                    tx.rollback().await?;
                    continue;
                }
                Err(WalletError::Store(e)) => return Err(e.into()),
                Err(WalletError::Amount(e)) => {
                    tx.rollback().await?;
                    tracing::error!(error = %e, "Amount arithmetic failed during reserve");
                    return Err(BetError::Conflict);
                }
            }

            let bet = tx
                .insert_bet(NewBet {
                    bet_id,
                    account_id,
                    draw_id,
                    number: number.to_string(),
                    stake,
                    potential_payout,
                })
                .await?;
            tx.commit().await?;

            tracing::info!(bet_id = %bet.bet_id, payout = %bet.potential_payout, "Bet placed");
            metrics::counter!("bets_placed_total").increment(1);
            return Ok(bet);
        }

        tracing::warn!(account_id, "Bet placement exhausted balance retries");
        Err(BetError::Conflict)
    }

    /// Cancel a pending bet and refund its stake. Only the owning
    /// account may cancel, and only while the draw is not completed.
    /// The refund is idempotent per bet, so a retried cancellation never
    /// pays twice.
    pub async fn cancel_bet(&self, account_id: i64, bet_id: Uuid) -> Result<Bet, BetError> {
        for _ in 0..MAX_BALANCE_RETRIES {
            let mut tx = self.store.begin().await?;

            let bet = tx.bet(bet_id).await?.ok_or(BetError::BetNotFound(bet_id))?;
            if bet.account_id != account_id {
                tx.rollback().await?;
                return Err(BetError::BetNotFound(bet_id));
            }
            if bet.status != BetStatus::Pending {
                tx.rollback().await?;
                return Err(BetError::NotCancellable);
            }

            let draw = tx
                .draw(bet.draw_id)
                .await?
                .ok_or(BetError::BetNotFound(bet_id))?;
            if draw.status == DrawStatus::Completed {
                tx.rollback().await?;
                return Err(BetError::NotCancellable);
            }

            if !tx
                .update_bet_status(bet_id, BetStatus::Pending, BetStatus::Cancelled)
                .await?
            {
                tx.rollback().await?;
                return Err(BetError::NotCancellable);
            }

            match self
                .wallet
                .refund(&mut *tx, bet.account_id, bet.stake, bet_id)
                .await
            {
                Ok(_) => {}
                Err(WalletError::VersionConflict(_)) => {
                    tx.rollback().await?;
                    continue;
                }
                Err(WalletError::Store(e)) => return Err(e.into()),
                Err(e) => {
                    tx.rollback().await?;
                    tracing::error!(error = %e, %bet_id, "Refund failed during cancellation");
                    return Err(BetError::Conflict);
                }
            }

            tx.commit().await?;

            tracing::info!(%bet_id, "Bet cancelled and stake refunded");
            metrics::counter!("bets_cancelled_total").increment(1);
            return Ok(Bet {
                status: BetStatus::Cancelled,
                ..bet
            });
        }

        Err(BetError::Conflict)
    }

    /// Bet history for one account, newest first
    pub async fn bets_for_account(
        &self,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Bet>, BetError> {
        Ok(self.store.bets_for_account(account_id, limit, offset).await?)
    }
}
