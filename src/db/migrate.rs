use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::info;

use crate::error::Result;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Apply pending migrations. Already-applied ones are skipped, so a second
/// run is a no-op.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR.run(pool).await?;
    info!(available = MIGRATOR.iter().count(), "database migrations up to date");
    Ok(())
}

/// Revert every applied migration. Only reachable through `migrate-down`.
pub async fn migrate_down(pool: &PgPool) -> Result<()> {
    MIGRATOR.undo(pool, 0).await?;
    info!("database migrations reverted");
    Ok(())
}
