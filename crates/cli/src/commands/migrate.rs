//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! mg-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string
//!   (falls back to `DATABASE_URL`, set by Fly.io postgres attach)
//!
//! The storefront and admin binaries share one commerce database, so a
//! single migration set covers both. Neither binary runs migrations on
//! startup; this command is the only writer of the schema.

use sqlx::PgPool;

/// Errors that can occur while running migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run commerce database migrations.
pub async fn run() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = database_url()?;

    tracing::info!("Connecting to commerce database...");
    let pool = PgPool::connect(&database_url).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}

fn database_url() -> Result<String, MigrationError> {
    if let Ok(url) = std::env::var("STOREFRONT_DATABASE_URL") {
        return Ok(url);
    }
    std::env::var("DATABASE_URL")
        .map_err(|_| MigrationError::MissingEnvVar("STOREFRONT_DATABASE_URL"))
}
