mod api;
mod config;
mod db;
mod error;
mod ingest;
mod logging;
mod market;
mod types;
mod vendor;

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::api::{router, ApiState};
use crate::config::{Config, SHUTDOWN_GRACE_SECS};
use crate::db::{MarketRepository, PgMarketStore};
use crate::error::{AppError, Result};
use crate::ingest::{AutoUpdater, IngestionService};
use crate::market::MarketService;
use crate::vendor::{ChartProvider, YahooClient};

#[tokio::main]
async fn main() {
    let cfg = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init(&cfg.logging) {
        eprintln!("Logging setup error: {e}");
        std::process::exit(1);
    }

    let result = match std::env::args().nth(1).as_deref() {
        None | Some("serve") => run(cfg).await,
        Some("migrate-down") => migrate_down(cfg).await,
        Some(other) => {
            eprintln!("Unknown command {other:?} (expected `serve` or `migrate-down`)");
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = db::connect(&cfg.database).await?;
    info!(
        host = %cfg.database.host,
        dbname = %cfg.database.dbname,
        max_connections = cfg.database.max_connections,
        "Database connected"
    );
    if cfg.migrations.enabled {
        db::migrate::run_migrations(&pool).await?;
    } else {
        warn!("Migrations disabled; assuming the schema is current");
    }

    // --- Services ---
    let repo: Arc<dyn MarketRepository> = Arc::new(PgMarketStore::new(pool.clone()));
    let provider: Arc<dyn ChartProvider> = Arc::new(YahooClient::new(&cfg.yahoo_finance)?);
    let ingest = Arc::new(IngestionService::new(repo.clone(), provider));
    let market = Arc::new(MarketService::new(repo.clone()));

    let shutdown = CancellationToken::new();

    // --- Spawn tasks ---
    let updater = if cfg.yahoo_finance.enable_auto_update {
        let updater = AutoUpdater::new(ingest, repo, &cfg.yahoo_finance);
        let token = shutdown.clone();
        Some(tokio::spawn(async move { updater.run(token).await }))
    } else {
        info!("Auto-update disabled");
        None
    };

    // HTTP API server
    let app = router(ApiState { market });
    let bind_addr = cfg.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    let stop_accepting = shutdown.clone();
    let mut server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stop_accepting.cancelled().await })
            .into_future(),
    );

    tokio::select! {
        _ = shutdown_signal() => info!("Shutdown signal received"),
        res = &mut server => {
            shutdown.cancel();
            return match res {
                Ok(served) => served.map_err(AppError::from),
                Err(e) => Err(AppError::Io(std::io::Error::other(e))),
            };
        }
    }

    shutdown.cancel();
    let drain = async {
        if let Err(e) = server.await {
            warn!("HTTP server task ended abnormally: {e}");
        }
        if let Some(updater) = updater {
            if let Err(e) = updater.await {
                warn!("Auto-updater task ended abnormally: {e}");
            }
        }
    };
    if tokio::time::timeout(Duration::from_secs(SHUTDOWN_GRACE_SECS), drain)
        .await
        .is_err()
    {
        warn!("Grace period of {SHUTDOWN_GRACE_SECS}s elapsed with work still in flight");
    }

    pool.close().await;
    info!("Shutdown complete");
    Ok(())
}

async fn migrate_down(cfg: Config) -> Result<()> {
    let pool = db::connect(&cfg.database).await?;
    db::migrate::migrate_down(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
