use std::sync::Arc;

use crate::db::MarketRepository;
use crate::error::{AppError, Result};
use crate::types::{PricePoint, Symbol};

/// A symbol with its full stored history, newest bar first.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketData {
    pub symbol: Symbol,
    pub prices: Vec<PricePoint>,
}

/// Read path behind the HTTP API.
pub struct MarketService {
    repo: Arc<dyn MarketRepository>,
}

impl MarketService {
    pub fn new(repo: Arc<dyn MarketRepository>) -> Self {
        Self { repo }
    }

    /// `SymbolNotFound` when the symbol or its prices are missing.
    pub async fn get_market_data(&self, code: &str) -> Result<MarketData> {
        if code.trim().is_empty() {
            return Err(AppError::SymbolNotFound(code.to_string()));
        }
        let symbol = self.repo.read_symbol(code).await?;
        let prices = self.repo.read_prices(code).await?;
        Ok(MarketData { symbol, prices })
    }

    pub async fn list_symbols(&self) -> Result<Vec<String>> {
        self.repo.list_symbols().await
    }
}
