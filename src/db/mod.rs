#[cfg(test)]
pub mod memory;
pub mod migrate;
pub mod models;
pub mod store;

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::error::{AppError, Result};
use crate::types::{FetchLogEntry, MarketSnapshot, PricePoint, Symbol};

pub use store::PgMarketStore;

/// Persistence operations used by the ingest and read paths.
#[async_trait]
pub trait MarketRepository: Send + Sync {
    /// `SymbolNotFound` when the code has never been ingested.
    async fn read_symbol(&self, code: &str) -> Result<Symbol>;

    /// Newest first. `SymbolNotFound` when no rows exist for the code.
    async fn read_prices(&self, code: &str) -> Result<Vec<PricePoint>>;

    /// Insert or refresh name/exchange; returns the persistent id. Never
    /// rewrites `created_at`.
    #[cfg_attr(not(test), allow(dead_code))]
    async fn upsert_symbol(&self, code: &str, display_name: &str, exchange: &str) -> Result<i32>;

    /// Symbol upsert plus every price upsert, all-or-nothing.
    async fn upsert_snapshot(&self, snapshot: &MarketSnapshot) -> Result<i32>;

    async fn append_fetch_log(&self, entry: &FetchLogEntry) -> Result<()>;

    async fn last_successful_fetch(&self, code: &str) -> Result<Option<DateTime<Utc>>>;

    /// Every persisted code, ascending.
    async fn list_symbols(&self) -> Result<Vec<String>>;
}

pub(crate) fn validate_code(code: &str) -> Result<()> {
    if code.trim().is_empty() {
        return Err(AppError::Validation("symbol code must not be empty".to_string()));
    }
    Ok(())
}

pub async fn connect(cfg: &DatabaseConfig) -> Result<PgPool> {
    let ssl_mode = PgSslMode::from_str(&cfg.sslmode)
        .map_err(|e| AppError::Config(format!("database.sslmode {:?}: {e}", cfg.sslmode)))?;
    let options = PgConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.user)
        .password(&cfg.password)
        .database(&cfg.dbname)
        .ssl_mode(ssl_mode);

    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(cfg.connection_timeout())
        .connect_with(options)
        .await?;
    Ok(pool)
}
