//! CLI command implementations.

pub mod catalog;
pub mod migrate;

use secrecy::ExposeSecret;
use sqlx::PgPool;

use credentials_api::config::{ConfigError, get_database_url};

/// Connect to the credentials database named by `CREDENTIALS_DATABASE_URL`
/// (or `DATABASE_URL`).
async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = get_database_url("CREDENTIALS_DATABASE_URL")?;

    tracing::info!("Connecting to credentials database...");
    Ok(PgPool::connect(database_url.expose_secret()).await?)
}

/// Errors shared by all commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
