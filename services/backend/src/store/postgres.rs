//! Postgres-backed store. Conditional updates (`WHERE version = $n`,
//! `WHERE status <> 'completed'`) carry the concurrency guarantees; the
//! queries themselves are runtime-checked.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{Amount, GameType};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{Account, Bet, BetStatus, Draw, DrawStatus, LedgerEntry, LedgerReason};
use crate::store::{NewBet, NewDraw, NewLedgerEntry, Store, StoreError, StoreTx};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    account_id: i64,
    balance: i64,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let balance = Amount::new(row.balance)
            .map_err(|e| StoreError::Corrupt(format!("account {}: {}", row.account_id, e)))?;
        Ok(Account {
            account_id: row.account_id,
            balance,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LedgerRow {
    entry_id: i64,
    account_id: i64,
    delta: i64,
    reason: String,
    reference_id: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = StoreError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        let reason = LedgerReason::parse(&row.reason).ok_or_else(|| {
            StoreError::Corrupt(format!("ledger entry {}: reason {}", row.entry_id, row.reason))
        })?;
        Ok(LedgerEntry {
            entry_id: row.entry_id,
            account_id: row.account_id,
            delta: row.delta,
            reason,
            reference_id: row.reference_id,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DrawRow {
    draw_id: i64,
    game_type: String,
    status: String,
    draw_time: DateTime<Utc>,
    min_bet: i64,
    max_bet: i64,
    multiplier: i64,
    winning_number: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DrawRow> for Draw {
    type Error = StoreError;

    fn try_from(row: DrawRow) -> Result<Self, Self::Error> {
        let game_type: GameType = row.game_type.parse().map_err(|_| {
            StoreError::Corrupt(format!("draw {}: game type {}", row.draw_id, row.game_type))
        })?;
        let status = DrawStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Corrupt(format!("draw {}: status {}", row.draw_id, row.status))
        })?;
        Ok(Draw {
            draw_id: row.draw_id,
            game_type,
            status,
            draw_time: row.draw_time,
            min_bet: Amount::new(row.min_bet)
                .map_err(|e| StoreError::Corrupt(format!("draw {}: {}", row.draw_id, e)))?,
            max_bet: Amount::new(row.max_bet)
                .map_err(|e| StoreError::Corrupt(format!("draw {}: {}", row.draw_id, e)))?,
            multiplier: row.multiplier,
            winning_number: row.winning_number,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BetRow {
    bet_id: Uuid,
    account_id: i64,
    draw_id: i64,
    number: String,
    stake: i64,
    potential_payout: i64,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BetRow> for Bet {
    type Error = StoreError;

    fn try_from(row: BetRow) -> Result<Self, Self::Error> {
        let status = BetStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Corrupt(format!("bet {}: status {}", row.bet_id, row.status))
        })?;
        Ok(Bet {
            bet_id: row.bet_id,
            account_id: row.account_id,
            draw_id: row.draw_id,
            number: row.number,
            stake: Amount::new(row.stake)
                .map_err(|e| StoreError::Corrupt(format!("bet {}: {}", row.bet_id, e)))?,
            potential_payout: Amount::new(row.potential_payout)
                .map_err(|e| StoreError::Corrupt(format!("bet {}: {}", row.bet_id, e)))?,
            status,
            created_at: row.created_at,
        })
    }
}

const ACCOUNT_COLUMNS: &str = "account_id, balance, version, created_at, updated_at";
const LEDGER_COLUMNS: &str = "entry_id, account_id, delta, reason, reference_id, created_at";
const DRAW_COLUMNS: &str =
    "draw_id, game_type, status, draw_time, min_bet, max_bet, multiplier, winning_number, created_at";
const BET_COLUMNS: &str =
    "bet_id, account_id, draw_id, number, stake, potential_payout, status, created_at";

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn create_account(&self) -> Result<Account, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "INSERT INTO accounts DEFAULT VALUES RETURNING {ACCOUNT_COLUMNS}"
        ))
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn account(&self, account_id: i64) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = $1"
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn ledger_entries(
        &self,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query_as::<_, LedgerRow>(&format!(
            "SELECT {LEDGER_COLUMNS} FROM ledger_entries
             WHERE account_id = $1
             ORDER BY entry_id DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn draw(&self, draw_id: i64) -> Result<Option<Draw>, StoreError> {
        let row = sqlx::query_as::<_, DrawRow>(&format!(
            "SELECT {DRAW_COLUMNS} FROM draws WHERE draw_id = $1"
        ))
        .bind(draw_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn open_draws(
        &self,
        game_type: GameType,
        now: DateTime<Utc>,
    ) -> Result<Vec<Draw>, StoreError> {
        let rows = sqlx::query_as::<_, DrawRow>(&format!(
            "SELECT {DRAW_COLUMNS} FROM draws
             WHERE game_type = $1
               AND status IN ('upcoming', 'ongoing')
               AND draw_time > $2
             ORDER BY draw_time ASC"
        ))
        .bind(game_type.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn bet(&self, bet_id: Uuid) -> Result<Option<Bet>, StoreError> {
        let row = sqlx::query_as::<_, BetRow>(&format!(
            "SELECT {BET_COLUMNS} FROM bets WHERE bet_id = $1"
        ))
        .bind(bet_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn pending_bets(&self, draw_id: i64) -> Result<Vec<Bet>, StoreError> {
        let rows = sqlx::query_as::<_, BetRow>(&format!(
            "SELECT {BET_COLUMNS} FROM bets
             WHERE draw_id = $1 AND status = 'pending'
             ORDER BY created_at ASC, bet_id ASC"
        ))
        .bind(draw_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn bets_for_account(
        &self,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Bet>, StoreError> {
        let rows = sqlx::query_as::<_, BetRow>(&format!(
            "SELECT {BET_COLUMNS} FROM bets
             WHERE account_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn account(&mut self, account_id: i64) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = $1"
        ))
        .bind(account_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update_balance(
        &mut self,
        account_id: i64,
        new_balance: Amount,
        expected_version: i64,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE accounts
             SET balance = $2, version = version + 1, updated_at = now()
             WHERE account_id = $1 AND version = $3",
        )
        .bind(account_id)
        .bind(new_balance.as_minor())
        .bind(expected_version)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn append_ledger(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        let row = sqlx::query_as::<_, LedgerRow>(&format!(
            "INSERT INTO ledger_entries (account_id, delta, reason, reference_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {LEDGER_COLUMNS}"
        ))
        .bind(entry.account_id)
        .bind(entry.delta)
        .bind(entry.reason.as_str())
        .bind(entry.reference_id)
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn find_ledger_entry(
        &mut self,
        reference_id: Uuid,
        reason: LedgerReason,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        let row = sqlx::query_as::<_, LedgerRow>(&format!(
            "SELECT {LEDGER_COLUMNS} FROM ledger_entries
             WHERE reference_id = $1 AND reason = $2"
        ))
        .bind(reference_id)
        .bind(reason.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn draw(&mut self, draw_id: i64) -> Result<Option<Draw>, StoreError> {
        // FOR SHARE holds the row against complete_draw's UPDATE until
        // this transaction finishes, so window check + bet insert cannot
        // interleave with settlement.
        let row = sqlx::query_as::<_, DrawRow>(&format!(
            "SELECT {DRAW_COLUMNS} FROM draws WHERE draw_id = $1 FOR SHARE"
        ))
        .bind(draw_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn insert_draw(&mut self, draw: NewDraw) -> Result<Draw, StoreError> {
        let row = sqlx::query_as::<_, DrawRow>(&format!(
            "INSERT INTO draws (game_type, status, draw_time, min_bet, max_bet, multiplier)
             VALUES ($1, 'upcoming', $2, $3, $4, $5)
             RETURNING {DRAW_COLUMNS}"
        ))
        .bind(draw.game_type.as_str())
        .bind(draw.draw_time)
        .bind(draw.min_bet.as_minor())
        .bind(draw.max_bet.as_minor())
        .bind(draw.multiplier)
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn complete_draw(
        &mut self,
        draw_id: i64,
        winning_number: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE draws
             SET status = 'completed', winning_number = $2
             WHERE draw_id = $1 AND status <> 'completed'",
        )
        .bind(draw_id)
        .bind(winning_number)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_multiplier(
        &mut self,
        draw_id: i64,
        multiplier: i64,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE draws SET multiplier = $2 WHERE draw_id = $1 AND status = 'upcoming'",
        )
        .bind(draw_id)
        .bind(multiplier)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_bet(&mut self, bet: NewBet) -> Result<Bet, StoreError> {
        let row = sqlx::query_as::<_, BetRow>(&format!(
            "INSERT INTO bets (bet_id, account_id, draw_id, number, stake, potential_payout, status)
             VALUES ($1, $2, $3, $4, $5, $6, 'pending')
             RETURNING {BET_COLUMNS}"
        ))
        .bind(bet.bet_id)
        .bind(bet.account_id)
        .bind(bet.draw_id)
        .bind(&bet.number)
        .bind(bet.stake.as_minor())
        .bind(bet.potential_payout.as_minor())
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn bet(&mut self, bet_id: Uuid) -> Result<Option<Bet>, StoreError> {
        let row = sqlx::query_as::<_, BetRow>(&format!(
            "SELECT {BET_COLUMNS} FROM bets WHERE bet_id = $1 FOR UPDATE"
        ))
        .bind(bet_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update_bet_status(
        &mut self,
        bet_id: Uuid,
        from: BetStatus,
        to: BetStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE bets SET status = $3 WHERE bet_id = $1 AND status = $2")
            .bind(bet_id)
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
