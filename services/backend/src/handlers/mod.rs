pub mod accounts;
pub mod bets;
pub mod draws;
pub mod health;
pub mod metrics;
