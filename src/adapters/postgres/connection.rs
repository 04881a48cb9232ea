//! Process-wide connection pool.

use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::OnceCell;

use crate::config::DatabaseConfig;
use crate::domain::foundation::{DomainError, ErrorCode};

static POOL: OnceCell<PgPool> = OnceCell::const_new();

/// Returns the shared pool, connecting on first use.
///
/// Concurrent first callers wait on the same initialization; a failed
/// attempt leaves the cell empty so the next caller retries.
pub async fn shared_pool(config: &DatabaseConfig) -> Result<PgPool, DomainError> {
    POOL.get_or_try_init(|| connect(config)).await.cloned()
}

async fn connect(config: &DatabaseConfig) -> Result<PgPool, DomainError> {
    let pool = PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(config.idle_timeout())
        .connect(config.url.expose_secret())
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to connect: {}", e))
        })?;

    tracing::info!(
        max_connections = config.max_connections,
        "Connected to PostgreSQL"
    );

    if config.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Migrations failed: {}", e))
        })?;
        tracing::info!("Database migrations applied");
    }

    Ok(pool)
}
