//! Shared constants for the lottery settlement system
//!
//! This module centralizes game parameters and retry tuning to prevent
//! inconsistencies between the engines, the HTTP layer, and the tests.

use chrono::Weekday;

/// Minimum stake for a two-digit bet, in minor units
///
/// Rationale: keeps per-bet ledger overhead meaningful relative to the
/// stake. Draws are created with this default; operators may raise it
/// per draw.
pub const TWO_DIGIT_MIN_BET: i64 = 100;

/// Maximum stake for a two-digit bet, in minor units
///
/// Rationale: caps single-bet exposure at multiplier 85. A max-stake win
/// pays 4,250,000 minor units.
pub const TWO_DIGIT_MAX_BET: i64 = 50_000;

/// Default payout multiplier for two-digit draws
pub const TWO_DIGIT_MULTIPLIER: i64 = 85;

/// Minimum stake for a three-digit bet, in minor units
pub const THREE_DIGIT_MIN_BET: i64 = 500;

/// Maximum stake for a three-digit bet, in minor units
///
/// Rationale: a max-stake three-digit win pays 50,000,000 minor units at
/// multiplier 500; anything larger needs operator sign-off and a custom
/// draw.
pub const THREE_DIGIT_MAX_BET: i64 = 100_000;

/// Default payout multiplier for three-digit draws
pub const THREE_DIGIT_MULTIPLIER: i64 = 500;

/// Two-digit draw times, (hour, minute) in UTC, twice daily
pub const TWO_DIGIT_DRAW_TIMES: [(u32, u32); 2] = [(12, 0), (16, 30)];

/// Three-digit draw weekdays (draws run at THREE_DIGIT_DRAW_TIME)
pub const THREE_DIGIT_DRAW_DAYS: [Weekday; 2] = [Weekday::Wed, Weekday::Sun];

/// Three-digit draw time, (hour, minute) in UTC
pub const THREE_DIGIT_DRAW_TIME: (u32, u32) = (16, 30);

/// Maximum attempts for an optimistic balance update before surfacing a
/// conflict error
///
/// Rationale: a hot account under heavy concurrent betting loses the
/// version CAS occasionally; three attempts absorb normal contention
/// without masking a stuck row.
pub const MAX_BALANCE_RETRIES: u32 = 3;

/// Maximum transient retries per bet during settlement
pub const MAX_SETTLEMENT_RETRIES: u32 = 3;

/// Base backoff delay in milliseconds for settlement retry logic
pub const SETTLEMENT_BACKOFF_BASE_MS: u64 = 100;

/// Maximum backoff delay in milliseconds for settlement retry logic
pub const SETTLEMENT_BACKOFF_MAX_MS: u64 = 2_000;
