use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::db::MarketRepository;
use crate::error::{AppError, Result};
use crate::ingest::staleness::{days_since, select_query, COLD_START};
use crate::types::{ChartInterval, ChartRange, FetchLogEntry};
use crate::vendor::ChartProvider;

/// Outcome of one successful ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub symbol_code: String,
    pub interval: ChartInterval,
    pub range: ChartRange,
    pub data_points: usize,
}

/// Fetch-and-persist for one symbol at a time. Every terminal outcome leaves
/// exactly one `price_fetch_logs` row, except a cancellation that lands
/// during the snapshot write.
pub struct IngestionService {
    repo: Arc<dyn MarketRepository>,
    provider: Arc<dyn ChartProvider>,
}

impl IngestionService {
    pub fn new(repo: Arc<dyn MarketRepository>, provider: Arc<dyn ChartProvider>) -> Self {
        Self { repo, provider }
    }

    pub async fn ingest(&self, code: &str, cancel: &CancellationToken) -> Result<IngestReport> {
        let fetched_at = Utc::now();

        let planned = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::Cancelled),
            r = self.plan(code, fetched_at) => r,
        };
        let (interval, range) = match planned {
            Ok(query) => query,
            Err(e) => return self.fail(code, fetched_at, 0, e).await,
        };

        let snapshot = match self.provider.fetch(code, interval, range, cancel).await {
            Ok(snapshot) => snapshot,
            Err(e) => return self.fail(code, fetched_at, 0, e).await,
        };
        let data_points = snapshot.prices.len();
        // The vendor may normalise the code (`brk-b` -> `BRK-B`). From here on,
        // audit under the code the symbol row is stored as, so the next plan
        // finds its fetch history.
        let stored_code = snapshot.symbol_code.as_str();
        if stored_code != code {
            info!(requested = code, stored = stored_code, "vendor normalised symbol code");
        }

        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::Cancelled),
            r = self.repo.upsert_snapshot(&snapshot) => r,
        };
        match written {
            Ok(_) => {}
            Err(AppError::Cancelled) => {
                // The write was dropped and rolled back; nobody is waiting for an audit row.
                warn!(symbol = stored_code, "ingest cancelled during snapshot write");
                return Err(AppError::Cancelled);
            }
            Err(e) => return self.fail(stored_code, fetched_at, data_points, e).await,
        }

        self.repo
            .append_fetch_log(&FetchLogEntry::success(stored_code, fetched_at, data_points))
            .await?;

        info!(
            symbol = stored_code,
            interval = %interval,
            range = %range,
            points = data_points,
            "ingest complete"
        );
        Ok(IngestReport {
            symbol_code: stored_code.to_string(),
            interval,
            range,
            data_points,
        })
    }

    /// Pick the vendor query from fetch history.
    async fn plan(&self, code: &str, now: DateTime<Utc>) -> Result<(ChartInterval, ChartRange)> {
        match self.repo.read_symbol(code).await {
            Ok(_) => {}
            Err(AppError::SymbolNotFound(_)) => return Ok(COLD_START),
            Err(e) => return Err(e),
        }

        let last = self.repo.last_successful_fetch(code).await?.ok_or_else(|| {
            AppError::InconsistentState(format!(
                "symbol {code} is stored but has no successful fetch on record"
            ))
        })?;
        Ok(select_query(days_since(last, now)))
    }

    async fn fail(
        &self,
        code: &str,
        fetched_at: DateTime<Utc>,
        data_points: usize,
        cause: AppError,
    ) -> Result<IngestReport> {
        warn!(symbol = code, error = %cause, "ingest failed");
        let entry = FetchLogEntry::failure(code, fetched_at, data_points, cause.to_string());
        if let Err(audit) = self.repo.append_fetch_log(&entry).await {
            error!(symbol = code, error = %audit, "failed to record fetch log");
            return Err(AppError::AuditWrite {
                cause: Box::new(cause),
                audit: Box::new(audit),
            });
        }
        Err(cause)
    }
}
