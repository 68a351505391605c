use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

const ACQUIRE_TIMEOUT_SECS: u64 = 5;

/// Connects to PostgreSQL and brings the schema up to date before any
/// request is served.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    info!("Connecting to PostgreSQL (max {max_connections} connections)...");

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    let migrator = sqlx::migrate!("./migrations");
    migrator
        .run(&pool)
        .await
        .context("Failed to apply database migrations")?;
    info!("Schema ready ({} migrations known)", migrator.iter().count());

    Ok(pool)
}
