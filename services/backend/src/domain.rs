use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{Amount, GameType};
use uuid::Uuid;

/// One user wallet. Mutated only through the wallet service; `version`
/// increments on every balance change and backs the optimistic CAS.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub account_id: i64,
    pub balance: Amount,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    Bet,
    Payout,
    Deposit,
    Withdrawal,
    Refund,
}

impl LedgerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerReason::Bet => "bet",
            LedgerReason::Payout => "payout",
            LedgerReason::Deposit => "deposit",
            LedgerReason::Withdrawal => "withdrawal",
            LedgerReason::Refund => "refund",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bet" => Some(LedgerReason::Bet),
            "payout" => Some(LedgerReason::Payout),
            "deposit" => Some(LedgerReason::Deposit),
            "withdrawal" => Some(LedgerReason::Withdrawal),
            "refund" => Some(LedgerReason::Refund),
            _ => None,
        }
    }
}

/// Append-only record of one balance-affecting event. Immutable once
/// written; the sum of deltas for an account equals its balance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub entry_id: i64,
    pub account_id: i64,
    pub delta: i64,
    pub reason: LedgerReason,
    pub reference_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DrawStatus {
    Upcoming,
    Ongoing,
    Completed,
}

impl DrawStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrawStatus::Upcoming => "upcoming",
            DrawStatus::Ongoing => "ongoing",
            DrawStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upcoming" => Some(DrawStatus::Upcoming),
            "ongoing" => Some(DrawStatus::Ongoing),
            "completed" => Some(DrawStatus::Completed),
            _ => None,
        }
    }
}

/// One lottery round. Completion is one-way; `winning_number` is set
/// exactly once and never changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Draw {
    pub draw_id: i64,
    pub game_type: GameType,
    pub status: DrawStatus,
    pub draw_time: DateTime<Utc>,
    pub min_bet: Amount,
    pub max_bet: Amount,
    pub multiplier: i64,
    pub winning_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Draw {
    /// Whether bets are still admitted at `now`
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, DrawStatus::Upcoming | DrawStatus::Ongoing) && self.draw_time > now
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
    Cancelled,
}

impl BetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetStatus::Pending => "pending",
            BetStatus::Won => "won",
            BetStatus::Lost => "lost",
            BetStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BetStatus::Pending),
            "won" => Some(BetStatus::Won),
            "lost" => Some(BetStatus::Lost),
            "cancelled" => Some(BetStatus::Cancelled),
            _ => None,
        }
    }
}

/// A stake on a number for one draw. `potential_payout` is frozen at
/// placement time; later multiplier changes never affect it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bet {
    pub bet_id: Uuid,
    pub account_id: i64,
    pub draw_id: i64,
    pub number: String,
    pub stake: Amount,
    pub potential_payout: Amount,
    pub status: BetStatus,
    pub created_at: DateTime<Utc>,
}

/// A per-bet settlement failure left for operator remediation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementFailure {
    pub bet_id: Uuid,
    pub account_id: i64,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementSummary {
    pub draw_id: i64,
    pub winning_number: String,
    pub total_bets: usize,
    pub total_winners: usize,
    pub total_payout: Amount,
    pub failures: Vec<SettlementFailure>,
}
