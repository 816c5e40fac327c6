//! Storage abstraction: a `Store` hands out transactional units of work
//! (`StoreTx`). Every operation that must be atomic takes an explicit
//! transaction; dropping a transaction without committing rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{Amount, GameType};
use uuid::Uuid;

use crate::domain::{Account, Bet, BetStatus, Draw, LedgerEntry, LedgerReason};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether retrying the enclosing transaction can succeed
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Database(e) => match e {
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
                // serialization_failure, deadlock_detected, unique_violation:
                // all resolve on retry (the unique case lands on the
                // idempotence lookup next time around)
                sqlx::Error::Database(db) => {
                    matches!(db.code().as_deref(), Some("40001") | Some("40P01") | Some("23505"))
                }
                _ => false,
            },
            StoreError::Corrupt(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub account_id: i64,
    pub delta: i64,
    pub reason: LedgerReason,
    pub reference_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewDraw {
    pub game_type: GameType,
    pub draw_time: DateTime<Utc>,
    pub min_bet: Amount,
    pub max_bet: Amount,
    pub multiplier: i64,
}

#[derive(Debug, Clone)]
pub struct NewBet {
    pub bet_id: Uuid,
    pub account_id: i64,
    pub draw_id: i64,
    pub number: String,
    pub stake: Amount,
    pub potential_payout: Amount,
}

/// Durable storage handle. Plain reads run outside any transaction;
/// mutations go through [`Store::begin`].
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;

    async fn create_account(&self) -> Result<Account, StoreError>;
    async fn account(&self, account_id: i64) -> Result<Option<Account>, StoreError>;
    async fn ledger_entries(
        &self,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>, StoreError>;

    async fn draw(&self, draw_id: i64) -> Result<Option<Draw>, StoreError>;
    /// Draws still accepting bets for a game, earliest first
    async fn open_draws(
        &self,
        game_type: GameType,
        now: DateTime<Utc>,
    ) -> Result<Vec<Draw>, StoreError>;

    async fn bet(&self, bet_id: Uuid) -> Result<Option<Bet>, StoreError>;
    async fn pending_bets(&self, draw_id: i64) -> Result<Vec<Bet>, StoreError>;
    async fn bets_for_account(
        &self,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Bet>, StoreError>;
}

/// One unit of work. All reads observe, and all writes join, the same
/// transaction; nothing is visible to others until `commit`.
#[async_trait]
pub trait StoreTx: Send {
    async fn account(&mut self, account_id: i64) -> Result<Option<Account>, StoreError>;

    /// Compare-and-swap balance update keyed on `expected_version`.
    /// Returns `Ok(false)` when the version no longer matches (a
    /// concurrent mutation won); the caller retries in a fresh
    /// transaction.
    async fn update_balance(
        &mut self,
        account_id: i64,
        new_balance: Amount,
        expected_version: i64,
    ) -> Result<bool, StoreError>;

    async fn append_ledger(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError>;
    async fn find_ledger_entry(
        &mut self,
        reference_id: Uuid,
        reason: LedgerReason,
    ) -> Result<Option<LedgerEntry>, StoreError>;

    /// Reads a draw and holds it against completion for the rest of this
    /// transaction, so a bet insert and the window check it passed cannot
    /// interleave with a concurrent settlement.
    async fn draw(&mut self, draw_id: i64) -> Result<Option<Draw>, StoreError>;
    async fn insert_draw(&mut self, draw: NewDraw) -> Result<Draw, StoreError>;

    /// One-way transition to completed. Returns `Ok(false)` when the draw
    /// was already completed; exactly one caller ever observes `Ok(true)`.
    async fn complete_draw(
        &mut self,
        draw_id: i64,
        winning_number: &str,
    ) -> Result<bool, StoreError>;

    /// Conditional multiplier change; `Ok(false)` unless the draw is
    /// still upcoming.
    async fn update_multiplier(&mut self, draw_id: i64, multiplier: i64)
        -> Result<bool, StoreError>;

    async fn insert_bet(&mut self, bet: NewBet) -> Result<Bet, StoreError>;
    async fn bet(&mut self, bet_id: Uuid) -> Result<Option<Bet>, StoreError>;

    /// Conditional status flip; `Ok(false)` when the bet was not in
    /// `from`. Settlement relies on this to flip pending bets exactly
    /// once.
    async fn update_bet_status(
        &mut self,
        bet_id: Uuid,
        from: BetStatus,
        to: BetStatus,
    ) -> Result<bool, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
