//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! relay-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `RELAY_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! `crates/relay/migrations/`

use devops_relay::kv::postgres::create_pool;
use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Create or upgrade the `relay_kv` table.
///
/// # Errors
///
/// Returns `MigrationError` if no database is configured or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("RELAY_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingEnvVar("RELAY_DATABASE_URL"))?;

    tracing::info!("Connecting to relay database...");
    let pool = create_pool(&database_url).await?;

    tracing::info!("Running relay migrations...");
    sqlx::migrate!("../relay/migrations").run(&pool).await?;

    tracing::info!("Relay migrations complete!");
    Ok(())
}
