//! In-memory `MarketRepository` for tests, with failure injection.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::db::{validate_code, MarketRepository};
use crate::error::{AppError, Result};
use crate::types::{FetchLogEntry, MarketSnapshot, PricePoint, Symbol};

#[derive(Default)]
struct Inner {
    symbols: BTreeMap<String, Symbol>,
    prices: HashMap<i32, BTreeMap<DateTime<Utc>, PricePoint>>,
    logs: Vec<FetchLogEntry>,
    next_id: i32,
    fail_snapshot: bool,
    fail_fetch_log: bool,
    fail_lookup: bool,
    snapshot_delay: Option<Duration>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fetch_logs(&self) -> Vec<FetchLogEntry> {
        self.inner.read().await.logs.clone()
    }

    pub async fn symbol_count(&self) -> usize {
        self.inner.read().await.symbols.len()
    }

    pub async fn price_count(&self, code: &str) -> usize {
        let guard = self.inner.read().await;
        guard
            .symbols
            .get(code)
            .and_then(|s| guard.prices.get(&s.id))
            .map_or(0, BTreeMap::len)
    }

    /// Insert a symbol with prices directly, bypassing the audit trail.
    pub async fn seed(&self, snapshot: &MarketSnapshot) {
        let mut guard = self.inner.write().await;
        apply_snapshot(&mut guard, snapshot);
    }

    pub async fn seed_fetch_log(&self, entry: FetchLogEntry) {
        self.inner.write().await.logs.push(entry);
    }

    pub async fn fail_snapshot_writes(&self) {
        self.inner.write().await.fail_snapshot = true;
    }

    pub async fn fail_fetch_log_writes(&self) {
        self.inner.write().await.fail_fetch_log = true;
    }

    pub async fn fail_lookups(&self) {
        self.inner.write().await.fail_lookup = true;
    }

    /// Hold every snapshot write for `delay` before applying it.
    pub async fn delay_snapshot_writes(&self, delay: Duration) {
        self.inner.write().await.snapshot_delay = Some(delay);
    }
}

fn upsert_symbol_row(inner: &mut Inner, code: &str, display_name: &str, exchange: &str) -> i32 {
    if let Some(existing) = inner.symbols.get_mut(code) {
        existing.display_name = display_name.to_string();
        existing.exchange = exchange.to_string();
        return existing.id;
    }
    inner.next_id += 1;
    let id = inner.next_id;
    inner.symbols.insert(
        code.to_string(),
        Symbol {
            id,
            symbol_code: code.to_string(),
            display_name: display_name.to_string(),
            exchange: exchange.to_string(),
            created_at: Utc::now(),
        },
    );
    id
}

fn apply_snapshot(inner: &mut Inner, snapshot: &MarketSnapshot) -> i32 {
    let id = upsert_symbol_row(
        inner,
        &snapshot.symbol_code,
        &snapshot.display_name,
        &snapshot.exchange,
    );
    let series = inner.prices.entry(id).or_default();
    for p in &snapshot.prices {
        series.insert(p.time, p.clone());
    }
    id
}

fn storage_failure(what: &str) -> AppError {
    AppError::Database(sqlx::Error::Protocol(format!("injected {what} failure")))
}

#[async_trait]
impl MarketRepository for MemoryStore {
    async fn read_symbol(&self, code: &str) -> Result<Symbol> {
        let guard = self.inner.read().await;
        if guard.fail_lookup {
            return Err(storage_failure("lookup"));
        }
        guard
            .symbols
            .get(code)
            .cloned()
            .ok_or_else(|| AppError::SymbolNotFound(code.to_string()))
    }

    async fn read_prices(&self, code: &str) -> Result<Vec<PricePoint>> {
        let guard = self.inner.read().await;
        if guard.fail_lookup {
            return Err(storage_failure("lookup"));
        }
        let series = guard
            .symbols
            .get(code)
            .and_then(|s| guard.prices.get(&s.id))
            .filter(|series| !series.is_empty())
            .ok_or_else(|| AppError::SymbolNotFound(code.to_string()))?;
        Ok(series.values().rev().cloned().collect())
    }

    async fn upsert_symbol(&self, code: &str, display_name: &str, exchange: &str) -> Result<i32> {
        validate_code(code)?;
        let mut guard = self.inner.write().await;
        Ok(upsert_symbol_row(&mut guard, code, display_name, exchange))
    }

    async fn upsert_snapshot(&self, snapshot: &MarketSnapshot) -> Result<i32> {
        validate_code(&snapshot.symbol_code)?;
        let (delay, fail) = {
            let guard = self.inner.read().await;
            (guard.snapshot_delay, guard.fail_snapshot)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(AppError::Transaction(sqlx::Error::Protocol(
                "injected snapshot failure".to_string(),
            )));
        }
        let mut guard = self.inner.write().await;
        Ok(apply_snapshot(&mut guard, snapshot))
    }

    async fn append_fetch_log(&self, entry: &FetchLogEntry) -> Result<()> {
        let mut guard = self.inner.write().await;
        if guard.fail_fetch_log {
            return Err(storage_failure("fetch log"));
        }
        guard.logs.push(entry.clone());
        Ok(())
    }

    async fn last_successful_fetch(&self, code: &str) -> Result<Option<DateTime<Utc>>> {
        let guard = self.inner.read().await;
        if guard.fail_lookup {
            return Err(storage_failure("lookup"));
        }
        Ok(guard
            .logs
            .iter()
            .filter(|l| l.success && l.symbol_code == code)
            .map(|l| l.fetched_at)
            .max())
    }

    async fn list_symbols(&self) -> Result<Vec<String>> {
        let guard = self.inner.read().await;
        if guard.fail_lookup {
            return Err(storage_failure("lookup"));
        }
        Ok(guard.symbols.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_symbol_refreshes_metadata_in_place() {
        let store = MemoryStore::new();
        let id = store.upsert_symbol("MSFT", "Microsoft", "NMS").await.unwrap();
        let created = store.read_symbol("MSFT").await.unwrap();

        let again = store
            .upsert_symbol("MSFT", "Microsoft Corporation", "NASDAQ")
            .await
            .unwrap();
        assert_eq!(again, id);

        let updated = store.read_symbol("MSFT").await.unwrap();
        assert_eq!(updated.display_name, "Microsoft Corporation");
        assert_eq!(updated.exchange, "NASDAQ");
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(store.symbol_count().await, 1);
    }

    #[tokio::test]
    async fn upsert_symbol_rejects_blank_code() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.upsert_symbol("  ", "Nothing", "NMS").await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(store.symbol_count().await, 0);
    }
}
