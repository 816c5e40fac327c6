//! Notification collaborator. Fire-and-forget by contract: a failing
//! notifier can never roll back or delay a settlement, so the trait
//! returns nothing and implementations absorb their own errors.

use async_trait::async_trait;
use shared::Amount;
use uuid::Uuid;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_winner(&self, account_id: i64, bet_id: Uuid, amount: Amount);
    async fn broadcast_draw_result(&self, draw_id: i64, winning_number: &str);
}

/// Default notifier: emits structured log events. The production
/// deployment swaps in a push-gateway implementation at startup.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_winner(&self, account_id: i64, bet_id: Uuid, amount: Amount) {
        tracing::info!(account_id, %bet_id, %amount, "Winner notified");
    }

    async fn broadcast_draw_result(&self, draw_id: i64, winning_number: &str) {
        tracing::info!(draw_id, winning_number, "Draw result broadcast");
    }
}
