//! Settlement engine: resolves every pending bet of a draw against its
//! winning number, exactly once.
//!
//! Phase 1 flips the draw to completed in its own transaction — the
//! idempotence boundary. Phase 2 reads the pending bets. Phase 3 settles
//! each bet independently (status flip plus, for winners, an idempotent
//! credit, atomically per bet); a failing bet never blocks the rest, it
//! is retried with backoff and then reported in the summary.

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use uuid::Uuid;

use crate::config::SettlementConfig;
use crate::domain::{Bet, BetStatus, SettlementFailure, SettlementSummary};
use crate::errors::{RegistryError, SettlementError, WalletError};
use crate::notify::Notifier;
use crate::services::registry::LotteryRegistry;
use crate::services::wallet::WalletService;
use crate::store::Store;

pub struct SettlementEngine {
    store: Arc<dyn Store>,
    wallet: Arc<WalletService>,
    registry: Arc<LotteryRegistry>,
    notifier: Arc<dyn Notifier>,
    config: SettlementConfig,
}

enum BetOutcome {
    Won,
    Lost,
    /// A previous attempt already flipped this bet; nothing left to do
    AlreadySettled,
}

impl SettlementEngine {
    pub fn new(
        store: Arc<dyn Store>,
        wallet: Arc<WalletService>,
        registry: Arc<LotteryRegistry>,
        notifier: Arc<dyn Notifier>,
        config: SettlementConfig,
    ) -> Self {
        Self {
            store,
            wallet,
            registry,
            notifier,
            config,
        }
    }

    /// Settle a draw against its winning number. Safe to re-invoke: the
    /// second and every later call returns `AlreadySettled` without
    /// touching any bet or balance.
    pub async fn settle(
        &self,
        draw_id: i64,
        winning_number: &str,
    ) -> Result<SettlementSummary, SettlementError> {
        let span = tracing::info_span!("settle", draw_id, winning_number);
        let _enter = span.enter();

        // Phase 1: linearizable completion. Once this commits, the bet
        // engine's window check rejects all further admissions.
        let mut tx = self.store.begin().await?;
        match self.registry.complete(&mut *tx, draw_id, winning_number).await {
            Ok(_) => {}
            Err(RegistryError::NotFound(id)) => {
                tx.rollback().await?;
                return Err(SettlementError::DrawNotFound(id));
            }
            Err(RegistryError::AlreadyCompleted(id)) => {
                tx.rollback().await?;
                tracing::info!(draw_id, "Duplicate settlement request ignored");
                return Err(SettlementError::AlreadySettled(id));
            }
            Err(RegistryError::InvalidWinningNumber { expected }) => {
                tx.rollback().await?;
                return Err(SettlementError::InvalidWinningNumber { expected });
            }
            Err(RegistryError::Store(e)) => return Err(e.into()),
            Err(e) => {
                tx.rollback().await?;
                tracing::error!(error = %e, "Unexpected completion failure");
                return Err(SettlementError::DrawNotFound(draw_id));
            }
        }
        tx.commit().await?;

        // Phase 2: the pending set is now frozen.
        let pending = self.store.pending_bets(draw_id).await?;

        // Phase 3: per-bet resolution.
        let mut summary = SettlementSummary {
            draw_id,
            winning_number: winning_number.to_string(),
            total_bets: pending.len(),
            total_winners: 0,
            total_payout: shared::Amount::ZERO,
            failures: Vec::new(),
        };

        for bet in &pending {
            let won = bet.number == winning_number;
            match self.settle_bet_with_retry(bet, won).await {
                Ok(BetOutcome::Won) => {
                    summary.total_winners += 1;
                    summary.total_payout = summary
                        .total_payout
                        .checked_add(bet.potential_payout)
                        .unwrap_or(summary.total_payout);
                    self.notifier
                        .notify_winner(bet.account_id, bet.bet_id, bet.potential_payout)
                        .await;
                }
                Ok(BetOutcome::Lost) | Ok(BetOutcome::AlreadySettled) => {}
                Err(e) => {
                    tracing::error!(
                        bet_id = %bet.bet_id,
                        account_id = bet.account_id,
                        error = %e,
                        "Bet settlement failed, recorded for remediation"
                    );
                    metrics::counter!("settlement_bet_failures_total").increment(1);
                    summary.failures.push(SettlementFailure {
                        bet_id: bet.bet_id,
                        account_id: bet.account_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        self.notifier
            .broadcast_draw_result(draw_id, winning_number)
            .await;

        tracing::info!(
            draw_id,
            total_bets = summary.total_bets,
            total_winners = summary.total_winners,
            total_payout = %summary.total_payout,
            failures = summary.failures.len(),
            "Draw settled"
        );
        metrics::counter!("settlements_total").increment(1);
        metrics::counter!("payouts_minor_units_total")
            .increment(summary.total_payout.as_minor() as u64);

        Ok(summary)
    }

    /// Resolve one bet, retrying transient store failures with
    /// exponential backoff up to the configured attempt limit
    async fn settle_bet_with_retry(
        &self,
        bet: &Bet,
        won: bool,
    ) -> Result<BetOutcome, WalletError> {
        let mut policy = self.backoff_policy();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.settle_bet(bet.bet_id, bet.account_id, bet.potential_payout, won).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = policy
                        .next_backoff()
                        .unwrap_or(Duration::from_millis(self.config.backoff_max_ms));
                    tracing::warn!(
                        bet_id = %bet.bet_id,
                        attempt,
                        error = %e,
                        "Transient settlement failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One bet's status flip and (for winners) payout, atomic per bet
    async fn settle_bet(
        &self,
        bet_id: Uuid,
        account_id: i64,
        payout: shared::Amount,
        won: bool,
    ) -> Result<BetOutcome, WalletError> {
        let mut tx = self.store.begin().await?;

        let target = if won { BetStatus::Won } else { BetStatus::Lost };
        if !tx.update_bet_status(bet_id, BetStatus::Pending, target).await? {
            tx.rollback().await?;
            return Ok(BetOutcome::AlreadySettled);
        }

        if won {
            // idempotent per bet_id: a retry after a partial failure
            // cannot credit twice
            self.wallet.credit(&mut *tx, account_id, payout, bet_id).await?;
        }

        tx.commit().await?;
        Ok(if won { BetOutcome::Won } else { BetOutcome::Lost })
    }

    fn backoff_policy(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.backoff_base_ms))
            .with_max_interval(Duration::from_millis(self.config.backoff_max_ms))
            .with_multiplier(2.0)
            .with_max_elapsed_time(None)
            .build()
    }
}
