//! Database migration command.
//!
//! Applies `crates/server/migrations/` and creates the session table used
//! by `tower-sessions`. Safe to run repeatedly.

use sqlx::PgPool;
use tower_sessions_sqlx_store::PostgresStore;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run all migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let database_url = super::database_url().map_err(|_| {
        MigrationError::MissingEnvVar("SHARERIDES_DATABASE_URL")
    })?;

    tracing::info!("Connecting to database...");
    let pool = sharerides_server::db::create_pool(&database_url)?;

    tracing::info!("Running schema migrations...");
    apply(&pool).await?;

    pool.close().await;
    tracing::info!("Migrations complete!");
    Ok(())
}

/// Apply the schema and the session table to `pool`.
///
/// # Errors
///
/// Returns an error if a migration fails.
pub async fn apply(pool: &PgPool) -> Result<(), MigrationError> {
    sqlx::migrate!("../server/migrations").run(pool).await?;

    tracing::info!("Creating session table...");
    PostgresStore::new(pool.clone()).migrate().await?;
    Ok(())
}
