//! Shared test harness: engines wired over the in-memory store, a
//! notifier that records what it was told, and a store wrapper that
//! injects transient outages.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use shared::{Amount, GameType};
use uuid::Uuid;

use backend::config::SettlementConfig;
use backend::domain::{Account, Bet, Draw, LedgerEntry};
use backend::notify::Notifier;
use backend::services::{BetEngine, DrawScheduler, LotteryRegistry, SettlementEngine, WalletService};
use backend::store::{MemoryStore, NewDraw, Store, StoreError, StoreTx};

pub struct TestContext {
    pub store: Arc<dyn Store>,
    pub wallet: Arc<WalletService>,
    pub registry: Arc<LotteryRegistry>,
    pub bets: Arc<BetEngine>,
    pub settlement: Arc<SettlementEngine>,
    pub scheduler: Arc<DrawScheduler>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    /// Wire the engines over any store, e.g. a [`FlakyStore`]
    pub fn with_store(store: Arc<dyn Store>) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let wallet = Arc::new(WalletService::new(store.clone()));
        let registry = Arc::new(LotteryRegistry::new(store.clone()));
        let bets = Arc::new(BetEngine::new(
            store.clone(),
            wallet.clone(),
            registry.clone(),
        ));
        let settlement = Arc::new(SettlementEngine::new(
            store.clone(),
            wallet.clone(),
            registry.clone(),
            notifier.clone(),
            // short backoff so retry tests stay fast
            SettlementConfig {
                max_retries: 3,
                backoff_base_ms: 5,
                backoff_max_ms: 20,
            },
        ));
        let scheduler = Arc::new(DrawScheduler::new(store.clone()));

        Self {
            store,
            wallet,
            registry,
            bets,
            settlement,
            scheduler,
            notifier,
        }
    }

    /// A fresh account holding `minor` units
    pub async fn funded_account(&self, minor: i64) -> i64 {
        let account = self.store.create_account().await.unwrap();
        if minor > 0 {
            self.wallet
                .deposit(account.account_id, Amount::new_unchecked(minor), Uuid::new_v4())
                .await
                .unwrap();
        }
        account.account_id
    }

    /// An upcoming draw two hours out, with the game's default limits
    pub async fn open_draw(&self, game_type: GameType) -> Draw {
        self.draw_at(game_type, Utc::now() + Duration::hours(2)).await
    }

    pub async fn draw_at(&self, game_type: GameType, draw_time: DateTime<Utc>) -> Draw {
        let mut tx = self.store.begin().await.unwrap();
        let draw = tx
            .insert_draw(NewDraw {
                game_type,
                draw_time,
                min_bet: game_type.default_min_bet(),
                max_bet: game_type.default_max_bet(),
                multiplier: game_type.default_multiplier(),
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        draw
    }

    pub async fn account(&self, account_id: i64) -> Account {
        self.store.account(account_id).await.unwrap().unwrap()
    }

    pub async fn balance(&self, account_id: i64) -> i64 {
        self.account(account_id).await.balance.as_minor()
    }

    pub async fn ledger(&self, account_id: i64) -> Vec<LedgerEntry> {
        self.store.ledger_entries(account_id, 1000, 0).await.unwrap()
    }

    /// Sum of ledger deltas; must always equal the account balance
    pub async fn ledger_total(&self, account_id: i64) -> i64 {
        self.ledger(account_id).await.iter().map(|e| e.delta).sum()
    }

    pub async fn bet(&self, bet_id: Uuid) -> Bet {
        self.store.bet(bet_id).await.unwrap().unwrap()
    }
}

/// Records every notification instead of delivering it
#[derive(Default)]
pub struct RecordingNotifier {
    winners: Mutex<Vec<(i64, Uuid, i64)>>,
    broadcasts: Mutex<Vec<(i64, String)>>,
}

impl RecordingNotifier {
    pub fn winners(&self) -> Vec<(i64, Uuid, i64)> {
        self.winners.lock().unwrap().clone()
    }

    pub fn broadcasts(&self) -> Vec<(i64, String)> {
        self.broadcasts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_winner(&self, account_id: i64, bet_id: Uuid, amount: Amount) {
        self.winners
            .lock()
            .unwrap()
            .push((account_id, bet_id, amount.as_minor()));
    }

    async fn broadcast_draw_result(&self, draw_id: i64, winning_number: &str) {
        self.broadcasts
            .lock()
            .unwrap()
            .push((draw_id, winning_number.to_string()));
    }
}

/// Store wrapper that fails `begin` with a transient error a configured
/// number of times, after letting a configured number of calls through.
/// Everything else delegates to the wrapped in-memory store.
pub struct FlakyStore {
    inner: MemoryStore,
    skip: AtomicU32,
    fail: AtomicU32,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            skip: AtomicU32::new(0),
            fail: AtomicU32::new(0),
        }
    }

    /// Let the next `skip` begins through, then fail the `fail` after that
    pub fn inject(&self, skip: u32, fail: u32) {
        self.skip.store(skip, Ordering::SeqCst);
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        if self.skip.load(Ordering::SeqCst) > 0 {
            self.skip.fetch_sub(1, Ordering::SeqCst);
        } else if self.fail.load(Ordering::SeqCst) > 0 {
            self.fail.fetch_sub(1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("injected outage".to_string()));
        }
        self.inner.begin().await
    }

    async fn create_account(&self) -> Result<Account, StoreError> {
        self.inner.create_account().await
    }

    async fn account(&self, account_id: i64) -> Result<Option<Account>, StoreError> {
        self.inner.account(account_id).await
    }

    async fn ledger_entries(
        &self,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        self.inner.ledger_entries(account_id, limit, offset).await
    }

    async fn draw(&self, draw_id: i64) -> Result<Option<Draw>, StoreError> {
        self.inner.draw(draw_id).await
    }

    async fn open_draws(
        &self,
        game_type: GameType,
        now: DateTime<Utc>,
    ) -> Result<Vec<Draw>, StoreError> {
        self.inner.open_draws(game_type, now).await
    }

    async fn bet(&self, bet_id: Uuid) -> Result<Option<Bet>, StoreError> {
        self.inner.bet(bet_id).await
    }

    async fn pending_bets(&self, draw_id: i64) -> Result<Vec<Bet>, StoreError> {
        self.inner.pending_bets(draw_id).await
    }

    async fn bets_for_account(
        &self,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Bet>, StoreError> {
        self.inner.bets_for_account(account_id, limit, offset).await
    }
}
