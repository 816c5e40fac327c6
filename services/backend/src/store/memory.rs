//! In-memory store used by tests and local development. Transactions
//! stage writes against a copy of the state and apply them on commit; the
//! store-wide lock is held for the lifetime of a transaction, so units of
//! work are fully serialized (a stricter schedule than Postgres, with the
//! same observable guarantees).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{Amount, GameType};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{Account, Bet, BetStatus, Draw, DrawStatus, LedgerEntry, LedgerReason};
use crate::store::{NewBet, NewDraw, NewLedgerEntry, Store, StoreError, StoreTx};

#[derive(Default, Clone)]
struct MemState {
    accounts: HashMap<i64, Account>,
    ledger: Vec<LedgerEntry>,
    draws: HashMap<i64, Draw>,
    bets: HashMap<Uuid, Bet>,
    next_account_id: i64,
    next_draw_id: i64,
    next_entry_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx { guard, staged }))
    }

    async fn create_account(&self) -> Result<Account, StoreError> {
        let mut state = self.state.lock().await;
        state.next_account_id += 1;
        let now = Utc::now();
        let account = Account {
            account_id: state.next_account_id,
            balance: Amount::ZERO,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        state.accounts.insert(account.account_id, account.clone());
        Ok(account)
    }

    async fn account(&self, account_id: i64) -> Result<Option<Account>, StoreError> {
        Ok(self.state.lock().await.accounts.get(&account_id).cloned())
    }

    async fn ledger_entries(
        &self,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .ledger
            .iter()
            .rev()
            .filter(|e| e.account_id == account_id)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn draw(&self, draw_id: i64) -> Result<Option<Draw>, StoreError> {
        Ok(self.state.lock().await.draws.get(&draw_id).cloned())
    }

    async fn open_draws(
        &self,
        game_type: GameType,
        now: DateTime<Utc>,
    ) -> Result<Vec<Draw>, StoreError> {
        let state = self.state.lock().await;
        let mut draws: Vec<Draw> = state
            .draws
            .values()
            .filter(|d| d.game_type == game_type && d.is_open(now))
            .cloned()
            .collect();
        draws.sort_by_key(|d| (d.draw_time, d.draw_id));
        Ok(draws)
    }

    async fn bet(&self, bet_id: Uuid) -> Result<Option<Bet>, StoreError> {
        Ok(self.state.lock().await.bets.get(&bet_id).cloned())
    }

    async fn pending_bets(&self, draw_id: i64) -> Result<Vec<Bet>, StoreError> {
        let state = self.state.lock().await;
        let mut bets: Vec<Bet> = state
            .bets
            .values()
            .filter(|b| b.draw_id == draw_id && b.status == BetStatus::Pending)
            .cloned()
            .collect();
        bets.sort_by_key(|b| (b.created_at, b.bet_id));
        Ok(bets)
    }

    async fn bets_for_account(
        &self,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Bet>, StoreError> {
        let state = self.state.lock().await;
        let mut bets: Vec<Bet> = state
            .bets
            .values()
            .filter(|b| b.account_id == account_id)
            .cloned()
            .collect();
        bets.sort_by_key(|b| (std::cmp::Reverse(b.created_at), b.bet_id));
        Ok(bets
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemState>,
    staged: MemState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn account(&mut self, account_id: i64) -> Result<Option<Account>, StoreError> {
        Ok(self.staged.accounts.get(&account_id).cloned())
    }

    async fn update_balance(
        &mut self,
        account_id: i64,
        new_balance: Amount,
        expected_version: i64,
    ) -> Result<bool, StoreError> {
        match self.staged.accounts.get_mut(&account_id) {
            Some(account) if account.version == expected_version => {
                account.balance = new_balance;
                account.version += 1;
                account.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn append_ledger(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        self.staged.next_entry_id += 1;
        let entry = LedgerEntry {
            entry_id: self.staged.next_entry_id,
            account_id: entry.account_id,
            delta: entry.delta,
            reason: entry.reason,
            reference_id: entry.reference_id,
            created_at: Utc::now(),
        };
        self.staged.ledger.push(entry.clone());
        Ok(entry)
    }

    async fn find_ledger_entry(
        &mut self,
        reference_id: Uuid,
        reason: LedgerReason,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        Ok(self
            .staged
            .ledger
            .iter()
            .find(|e| e.reference_id == reference_id && e.reason == reason)
            .cloned())
    }

    async fn draw(&mut self, draw_id: i64) -> Result<Option<Draw>, StoreError> {
        Ok(self.staged.draws.get(&draw_id).cloned())
    }

    async fn insert_draw(&mut self, draw: NewDraw) -> Result<Draw, StoreError> {
        self.staged.next_draw_id += 1;
        let draw = Draw {
            draw_id: self.staged.next_draw_id,
            game_type: draw.game_type,
            status: DrawStatus::Upcoming,
            draw_time: draw.draw_time,
            min_bet: draw.min_bet,
            max_bet: draw.max_bet,
            multiplier: draw.multiplier,
            winning_number: None,
            created_at: Utc::now(),
        };
        self.staged.draws.insert(draw.draw_id, draw.clone());
        Ok(draw)
    }

    async fn complete_draw(
        &mut self,
        draw_id: i64,
        winning_number: &str,
    ) -> Result<bool, StoreError> {
        match self.staged.draws.get_mut(&draw_id) {
            Some(draw) if draw.status != DrawStatus::Completed => {
                draw.status = DrawStatus::Completed;
                draw.winning_number = Some(winning_number.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_multiplier(
        &mut self,
        draw_id: i64,
        multiplier: i64,
    ) -> Result<bool, StoreError> {
        match self.staged.draws.get_mut(&draw_id) {
            Some(draw) if draw.status == DrawStatus::Upcoming => {
                draw.multiplier = multiplier;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_bet(&mut self, bet: NewBet) -> Result<Bet, StoreError> {
        let bet = Bet {
            bet_id: bet.bet_id,
            account_id: bet.account_id,
            draw_id: bet.draw_id,
            number: bet.number,
            stake: bet.stake,
            potential_payout: bet.potential_payout,
            status: BetStatus::Pending,
            created_at: Utc::now(),
        };
        self.staged.bets.insert(bet.bet_id, bet.clone());
        Ok(bet)
    }

    async fn bet(&mut self, bet_id: Uuid) -> Result<Option<Bet>, StoreError> {
        Ok(self.staged.bets.get(&bet_id).cloned())
    }

    async fn update_bet_status(
        &mut self,
        bet_id: Uuid,
        from: BetStatus,
        to: BetStatus,
    ) -> Result<bool, StoreError> {
        match self.staged.bets.get_mut(&bet_id) {
            Some(bet) if bet.status == from => {
                bet.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // staged writes are simply discarded
        Ok(())
    }
}
