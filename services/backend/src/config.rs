use serde::Deserialize;
use std::env;

use shared::{MAX_SETTLEMENT_RETRIES, SETTLEMENT_BACKOFF_BASE_MS, SETTLEMENT_BACKOFF_MAX_MS};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api_port: u16,
    pub database: DatabaseConfig,
    pub settlement: SettlementConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_SETTLEMENT_RETRIES,
            backoff_base_ms: SETTLEMENT_BACKOFF_BASE_MS,
            backoff_max_ms: SETTLEMENT_BACKOFF_MAX_MS,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()?,
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
                pool_size: env::var("DATABASE_POOL_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()?,
            },
            settlement: SettlementConfig {
                max_retries: env::var("SETTLEMENT_MAX_RETRIES")
                    .unwrap_or_else(|_| MAX_SETTLEMENT_RETRIES.to_string())
                    .parse()?,
                backoff_base_ms: env::var("SETTLEMENT_BACKOFF_BASE_MS")
                    .unwrap_or_else(|_| SETTLEMENT_BACKOFF_BASE_MS.to_string())
                    .parse()?,
                backoff_max_ms: env::var("SETTLEMENT_BACKOFF_MAX_MS")
                    .unwrap_or_else(|_| SETTLEMENT_BACKOFF_MAX_MS.to_string())
                    .parse()?,
            },
        })
    }
}
