//! Type-safe wrappers for domain primitives
//!
//! These types enforce validation at construction time and provide checked
//! arithmetic so money math can never silently wrap.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount must not be negative: {0}")]
    Negative(i64),

    #[error("amount overflow in arithmetic operation")]
    Overflow,

    #[error("amount underflow in arithmetic operation")]
    Underflow,
}

/// A non-negative money amount in fixed-point integer minor units
///
/// Balances, stakes and payouts are always `Amount`; signed ledger deltas
/// stay raw `i64`. Never constructed from floats.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Create a new Amount, rejecting negative values
    pub fn new(minor: i64) -> Result<Self, AmountError> {
        if minor < 0 {
            return Err(AmountError::Negative(minor));
        }
        Ok(Self(minor))
    }

    /// Create without validation (for values already proven non-negative)
    pub const fn new_unchecked(minor: i64) -> Self {
        Self(minor)
    }

    /// Raw minor-unit value
    pub const fn as_minor(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(&self, other: Amount) -> Result<Self, AmountError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(AmountError::Overflow)
    }

    /// Checked subtraction; fails rather than going negative
    pub fn checked_sub(&self, other: Amount) -> Result<Self, AmountError> {
        let v = self.0.checked_sub(other.0).ok_or(AmountError::Underflow)?;
        if v < 0 {
            return Err(AmountError::Underflow);
        }
        Ok(Self(v))
    }

    /// Checked multiplication by a scalar multiplier
    pub fn checked_mul(&self, multiplier: i64) -> Result<Self, AmountError> {
        if multiplier < 0 {
            return Err(AmountError::Negative(multiplier));
        }
        self.0
            .checked_mul(multiplier)
            .map(Self)
            .ok_or(AmountError::Overflow)
    }
}

impl TryFrom<i64> for Amount {
    type Error = AmountError;

    fn try_from(minor: i64) -> Result<Self, Self::Error> {
        Self::new(minor)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown game type: {0}")]
pub struct ParseGameTypeError(String);

/// Lottery game discriminator
///
/// Determines the fixed digit width of the played number and the default
/// stake bounds, multiplier and draw timetable of new draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    TwoDigit,
    ThreeDigit,
}

impl GameType {
    /// Fixed width of a valid played number
    pub fn digit_width(&self) -> usize {
        match self {
            GameType::TwoDigit => 2,
            GameType::ThreeDigit => 3,
        }
    }

    /// Whether `number` is a valid played number for this game
    pub fn is_valid_number(&self, number: &str) -> bool {
        number.len() == self.digit_width() && number.bytes().all(|b| b.is_ascii_digit())
    }

    pub fn default_min_bet(&self) -> Amount {
        match self {
            GameType::TwoDigit => Amount::new_unchecked(TWO_DIGIT_MIN_BET),
            GameType::ThreeDigit => Amount::new_unchecked(THREE_DIGIT_MIN_BET),
        }
    }

    pub fn default_max_bet(&self) -> Amount {
        match self {
            GameType::TwoDigit => Amount::new_unchecked(TWO_DIGIT_MAX_BET),
            GameType::ThreeDigit => Amount::new_unchecked(THREE_DIGIT_MAX_BET),
        }
    }

    pub fn default_multiplier(&self) -> i64 {
        match self {
            GameType::TwoDigit => TWO_DIGIT_MULTIPLIER,
            GameType::ThreeDigit => THREE_DIGIT_MULTIPLIER,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::TwoDigit => "two_digit",
            GameType::ThreeDigit => "three_digit",
        }
    }
}

impl std::str::FromStr for GameType {
    type Err = ParseGameTypeError;

    // Accepts both the storage form and the short client form
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "two_digit" | "2d" | "2D" => Ok(GameType::TwoDigit),
            "three_digit" | "3d" | "3D" => Ok(GameType::ThreeDigit),
            other => Err(ParseGameTypeError(other.to_string())),
        }
    }
}

impl std::fmt::Display for GameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
