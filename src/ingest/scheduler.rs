use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::YahooFinanceConfig;
use crate::db::MarketRepository;
use crate::error::Result;
use crate::ingest::IngestionService;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Not started because shutdown arrived mid-pass.
    pub skipped: usize,
}

/// Periodically re-ingests every persisted symbol plus the configured
/// defaults. One pass at startup, then one per `update_interval_minutes`.
pub struct AutoUpdater {
    ingest: Arc<IngestionService>,
    repo: Arc<dyn MarketRepository>,
    default_symbols: Vec<String>,
    every: Duration,
    max_concurrent: usize,
}

impl AutoUpdater {
    pub fn new(
        ingest: Arc<IngestionService>,
        repo: Arc<dyn MarketRepository>,
        cfg: &YahooFinanceConfig,
    ) -> Self {
        Self {
            ingest,
            repo,
            default_symbols: cfg.default_symbols.clone(),
            every: cfg.update_interval(),
            max_concurrent: cfg.max_concurrent_ingests.max(1),
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval(self.every);
        // A pass that overruns the interval swallows the missed tick instead of
        // starting a second pass back to back.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            every_secs = self.every.as_secs(),
            max_concurrent = self.max_concurrent,
            "auto-updater started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let summary = self.run_pass(&shutdown).await;
            info!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                skipped = summary.skipped,
                "auto-update pass complete"
            );
        }
        info!("auto-updater stopped");
    }

    pub async fn run_pass(&self, shutdown: &CancellationToken) -> PassSummary {
        let codes = match self.pass_symbols().await {
            Ok(codes) => codes,
            Err(e) => {
                error!(error = %e, "auto-update could not list symbols");
                return PassSummary::default();
            }
        };
        debug!(symbols = codes.len(), "auto-update pass starting");

        let succeeded = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);

        futures_util::stream::iter(codes)
            .for_each_concurrent(self.max_concurrent, |code| {
                let (succeeded, failed, skipped) = (&succeeded, &failed, &skipped);
                async move {
                    if shutdown.is_cancelled() {
                        skipped.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                    let token = shutdown.child_token();
                    match self.ingest.ingest(&code, &token).await {
                        Ok(_) => {
                            succeeded.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            if !e.is_cancelled() {
                                warn!(symbol = %code, error = %e, "scheduled ingest failed");
                            }
                        }
                    }
                }
            })
            .await;

        PassSummary {
            succeeded: succeeded.into_inner(),
            failed: failed.into_inner(),
            skipped: skipped.into_inner(),
        }
    }

    /// Persisted symbols first, then defaults not yet stored. Each code once.
    async fn pass_symbols(&self) -> Result<Vec<String>> {
        let mut codes = self.repo.list_symbols().await?;
        for code in &self.default_symbols {
            let code = code.trim();
            // Stored codes are vendor-normalised; `brk-b` is already `BRK-B`.
            if !code.is_empty() && !codes.iter().any(|c| c.eq_ignore_ascii_case(code)) {
                codes.push(code.to_string());
            }
        }
        Ok(codes)
    }
}
