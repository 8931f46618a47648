use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Persisted entities
// ---------------------------------------------------------------------------

/// A ticker as stored in `symbols`. `symbol_code` is case-sensitive and never
/// rewritten once created; neither is `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub id: i32,
    pub symbol_code: String,
    pub display_name: String,
    pub exchange: String,
    pub created_at: DateTime<Utc>,
}

/// One OHLCV bar. Every value column may be absent because the vendor emits
/// nulls for bars with no trading.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub time: DateTime<Utc>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<i64>,
}

/// Row-oriented projection of one vendor chart response. Lives for a single
/// ingest attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub symbol_code: String,
    pub display_name: String,
    pub exchange: String,
    pub prices: Vec<PricePoint>,
}

/// Append-only audit record of one ingest attempt. Keyed by code, not id, so
/// failed first-ever attempts are recorded too.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchLogEntry {
    pub symbol_code: String,
    pub fetched_at: DateTime<Utc>,
    pub data_points: Option<i32>,
    pub success: bool,
    pub error_msg: Option<String>,
}

impl FetchLogEntry {
    pub fn success(symbol_code: &str, fetched_at: DateTime<Utc>, data_points: usize) -> Self {
        Self {
            symbol_code: symbol_code.to_string(),
            fetched_at,
            data_points: Some(clamp_points(data_points)),
            success: true,
            error_msg: None,
        }
    }

    pub fn failure(
        symbol_code: &str,
        fetched_at: DateTime<Utc>,
        data_points: usize,
        error_msg: String,
    ) -> Self {
        Self {
            symbol_code: symbol_code.to_string(),
            fetched_at,
            data_points: Some(clamp_points(data_points)),
            success: false,
            error_msg: Some(error_msg),
        }
    }
}

fn clamp_points(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

// ---------------------------------------------------------------------------
// Vendor query parameters
// ---------------------------------------------------------------------------

/// Bar width requested from the chart API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChartInterval {
    OneMinute,
    FiveMinutes,
    OneDay,
    OneWeek,
    OneMonth,
}

impl ChartInterval {
    pub fn as_str(self) -> &'static str {
        match self {
            ChartInterval::OneMinute => "1m",
            ChartInterval::FiveMinutes => "5m",
            ChartInterval::OneDay => "1d",
            ChartInterval::OneWeek => "1wk",
            ChartInterval::OneMonth => "1mo",
        }
    }
}

impl std::fmt::Display for ChartInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Look-back window requested from the chart API. Variant order is by width,
/// with `YearToDate` placed by its widest possible extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChartRange {
    OneDay,
    FiveDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
    YearToDate,
    OneYear,
    TwoYears,
    FiveYears,
    TenYears,
    Max,
}

impl ChartRange {
    pub fn as_str(self) -> &'static str {
        match self {
            ChartRange::OneDay => "1d",
            ChartRange::FiveDays => "5d",
            ChartRange::OneMonth => "1mo",
            ChartRange::ThreeMonths => "3mo",
            ChartRange::SixMonths => "6mo",
            ChartRange::YearToDate => "ytd",
            ChartRange::OneYear => "1y",
            ChartRange::TwoYears => "2y",
            ChartRange::FiveYears => "5y",
            ChartRange::TenYears => "10y",
            ChartRange::Max => "max",
        }
    }
}

impl std::fmt::Display for ChartRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
