use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::db::models::{PriceRow, SymbolRow};
use crate::db::{validate_code, MarketRepository};
use crate::error::{AppError, Result};
use crate::types::{FetchLogEntry, MarketSnapshot, PricePoint, Symbol};

/// Rows per multi-row price upsert. Eight binds each keeps a statement well
/// under the Postgres limit of 65535 parameters.
const PRICE_BATCH_ROWS: usize = 1000;

const UPSERT_SYMBOL_SQL: &str = r#"
    INSERT INTO symbols (symbol, name, exchange)
    VALUES ($1, $2, $3)
    ON CONFLICT (symbol) DO UPDATE
    SET name = EXCLUDED.name,
        exchange = EXCLUDED.exchange
    RETURNING id
"#;

pub struct PgMarketStore {
    pool: PgPool,
}

impl PgMarketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Collapse duplicate timestamps (last one wins) and order by time. One
/// statement may not upsert the same `(symbol_id, time)` twice.
fn dedupe_by_time(prices: &[PricePoint]) -> Vec<&PricePoint> {
    let mut by_time: BTreeMap<DateTime<Utc>, &PricePoint> = BTreeMap::new();
    for p in prices {
        by_time.insert(p.time, p);
    }
    by_time.into_values().collect()
}

#[async_trait]
impl MarketRepository for PgMarketStore {
    async fn read_symbol(&self, code: &str) -> Result<Symbol> {
        let row = sqlx::query_as::<_, SymbolRow>(
            "SELECT id, symbol, name, exchange, created_at FROM symbols WHERE symbol = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Symbol::from)
            .ok_or_else(|| AppError::SymbolNotFound(code.to_string()))
    }

    async fn read_prices(&self, code: &str) -> Result<Vec<PricePoint>> {
        let rows = sqlx::query_as::<_, PriceRow>(
            r#"
            SELECT sp.time,
                   sp.open::float8      AS open,
                   sp.high::float8      AS high,
                   sp.low::float8       AS low,
                   sp.close::float8     AS close,
                   sp.adj_close::float8 AS adj_close,
                   sp.volume
            FROM stock_prices sp
            JOIN symbols s ON s.id = sp.symbol_id
            WHERE s.symbol = $1
            ORDER BY sp.time DESC
            "#,
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(AppError::SymbolNotFound(code.to_string()));
        }
        Ok(rows.into_iter().map(PricePoint::from).collect())
    }

    async fn upsert_symbol(&self, code: &str, display_name: &str, exchange: &str) -> Result<i32> {
        validate_code(code)?;
        let id = sqlx::query_scalar::<_, i32>(UPSERT_SYMBOL_SQL)
            .bind(code)
            .bind(display_name)
            .bind(exchange)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    async fn upsert_snapshot(&self, snapshot: &MarketSnapshot) -> Result<i32> {
        validate_code(&snapshot.symbol_code)?;
        let prices = dedupe_by_time(&snapshot.prices);

        // Dropping `tx` without commit (error or cancelled caller) rolls back.
        let mut tx = self.pool.begin().await.map_err(AppError::Transaction)?;

        let symbol_id = sqlx::query_scalar::<_, i32>(UPSERT_SYMBOL_SQL)
            .bind(&snapshot.symbol_code)
            .bind(&snapshot.display_name)
            .bind(&snapshot.exchange)
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::Transaction)?;

        for chunk in prices.chunks(PRICE_BATCH_ROWS) {
            let mut qb = QueryBuilder::<Postgres>::new(
                "INSERT INTO stock_prices (time, symbol_id, open, high, low, close, adj_close, volume) ",
            );
            qb.push_values(chunk, |mut row, p| {
                row.push_bind(p.time)
                    .push_bind(symbol_id)
                    .push_bind(p.open)
                    .push_bind(p.high)
                    .push_bind(p.low)
                    .push_bind(p.close)
                    .push_bind(p.adj_close)
                    .push_bind(p.volume);
            });
            qb.push(
                " ON CONFLICT (symbol_id, time) DO UPDATE SET \
                 open = EXCLUDED.open, \
                 high = EXCLUDED.high, \
                 low = EXCLUDED.low, \
                 close = EXCLUDED.close, \
                 adj_close = EXCLUDED.adj_close, \
                 volume = EXCLUDED.volume",
            );
            qb.build()
                .execute(&mut *tx)
                .await
                .map_err(AppError::Transaction)?;
        }

        tx.commit().await.map_err(AppError::Transaction)?;
        debug!(
            symbol = %snapshot.symbol_code,
            symbol_id,
            rows = prices.len(),
            "snapshot committed"
        );
        Ok(symbol_id)
    }

    async fn append_fetch_log(&self, entry: &FetchLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO price_fetch_logs (symbol, fetched_at, data_points, success, error_msg)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&entry.symbol_code)
        .bind(entry.fetched_at)
        .bind(entry.data_points)
        .bind(entry.success)
        .bind(&entry.error_msg)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn last_successful_fetch(&self, code: &str) -> Result<Option<DateTime<Utc>>> {
        let at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            SELECT fetched_at
            FROM price_fetch_logs
            WHERE symbol = $1 AND success = true
            ORDER BY fetched_at DESC
            LIMIT 1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(at)
    }

    async fn list_symbols(&self) -> Result<Vec<String>> {
        let codes = sqlx::query_scalar::<_, String>(
            r#"SELECT symbol FROM symbols ORDER BY symbol COLLATE "C""#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(codes)
    }
}
