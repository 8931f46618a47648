//! Row types matching the schema in `migrations/`. Used by sqlx for typed
//! queries; numeric columns are selected through `::float8` casts.

use chrono::{DateTime, Utc};

use crate::types::{PricePoint, Symbol};

#[derive(Debug, sqlx::FromRow)]
pub struct SymbolRow {
    pub id: i32,
    pub symbol: String,
    pub name: String,
    pub exchange: String,
    pub created_at: DateTime<Utc>,
}

impl From<SymbolRow> for Symbol {
    fn from(row: SymbolRow) -> Self {
        Symbol {
            id: row.id,
            symbol_code: row.symbol,
            display_name: row.name,
            exchange: row.exchange,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PriceRow {
    pub time: DateTime<Utc>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<i64>,
}

impl From<PriceRow> for PricePoint {
    fn from(row: PriceRow) -> Self {
        PricePoint {
            time: row.time,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            adj_close: row.adj_close,
            volume: row.volume,
        }
    }
}
