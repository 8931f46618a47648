use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::api::health;
use crate::error::AppError;
use crate::market::{MarketData, MarketService};
use crate::types::PricePoint;

#[derive(Clone)]
pub struct ApiState {
    pub market: Arc<MarketService>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/symbols", get(list_symbols))
        .route("/symbols/:symbol", get(get_symbol))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDataResponse {
    pub symbol: String,
    pub symbol_price: Vec<PriceResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResponse {
    pub time: DateTime<Utc>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<i64>,
}

impl From<PricePoint> for PriceResponse {
    fn from(p: PricePoint) -> Self {
        Self {
            time: p.time,
            open: p.open,
            high: p.high,
            low: p.low,
            close: p.close,
            adj_close: p.adj_close,
            volume: p.volume,
        }
    }
}

impl From<MarketData> for MarketDataResponse {
    fn from(data: MarketData) -> Self {
        Self {
            symbol: data.symbol.symbol_code,
            symbol_price: data.prices.into_iter().map(PriceResponse::from).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_symbol(
    State(state): State<ApiState>,
    Path(symbol): Path<String>,
) -> Result<Json<MarketDataResponse>, AppError> {
    let data = state.market.get_market_data(&symbol).await?;
    Ok(Json(data.into()))
}

async fn list_symbols(State(state): State<ApiState>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.market.list_symbols().await?))
}
