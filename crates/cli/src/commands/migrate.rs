//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! credentials-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `CREDENTIALS_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Migrations live in `crates/api/migrations/`:
//! ```text
//! migrations/
//! ├── 20260301000001_create_credentials_schema.sql
//! └── 20260301000002_create_user_credentials.sql
//! ```

use super::{CommandError, connect};

/// Errors that can occur while migrating.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let pool = connect().await?;

    tracing::info!("Running credentials migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Credentials migrations complete!");
    Ok(())
}
