//! Credential storage.
//!
//! # Database: `credentials`
//!
//! ## Tables
//!
//! - `credential_definition` - Catalog of issuable credentials (program or course certificates)
//! - `user_credential` - One row per issuance, unique per (username, definition)
//! - `user_credential_attribute` - Facts attached at issuance, cascade-deleted with their credential
//!
//! # Backends
//!
//! Services talk to storage through the [`CredentialStore`] trait:
//!
//! - [`PgCredentialStore`] - `PostgreSQL`, used by the service binary and the CLI
//! - [`InMemoryCredentialStore`] - process-local, used by tests
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p credentials-cli -- migrate
//! ```

pub mod credentials;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use credentials_core::{
    CertificateType, CredentialDefinition, CredentialFilter, CredentialPatch, CredentialReference,
    UserCredential, UserCredentialId, Username, ValidatedAttributes,
};

pub use credentials::PgCredentialStore;
pub use memory::InMemoryCredentialStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The storage backend cannot serve requests.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Everything needed to create a user credential.
#[derive(Debug, Clone)]
pub struct NewUserCredential {
    pub username: Username,
    pub credential: CredentialDefinition,
    pub download_url: Option<String>,
    pub attributes: ValidatedAttributes,
}

/// Result of a find-or-create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    /// A new record was written, together with its attributes.
    Created(UserCredential),
    /// A record for the pair already existed and was left untouched.
    Existing(UserCredential),
}

impl IssueOutcome {
    /// The credential, whether new or existing.
    #[must_use]
    pub fn into_credential(self) -> UserCredential {
        match self {
            Self::Created(credential) | Self::Existing(credential) => credential,
        }
    }

    /// Whether this call created the record.
    #[must_use]
    pub const fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// A window into an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: i64,
    pub limit: i64,
}

/// One page of results plus the size of the whole result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// Storage operations the services depend on.
///
/// Implementations must make [`CredentialStore::get_or_create_user_credential`]
/// atomic: concurrent calls for the same (username, definition) pair produce
/// exactly one record, and a record is never observable without its
/// attributes.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a program certificate by program id.
    async fn find_program_certificate(
        &self,
        program_id: i64,
    ) -> Result<Option<CredentialDefinition>, RepositoryError>;

    /// Look up a course certificate by course run and track.
    async fn find_course_certificate(
        &self,
        course_id: &str,
        certificate_type: CertificateType,
    ) -> Result<Option<CredentialDefinition>, RepositoryError>;

    /// Register a definition, or return the existing one for the same natural
    /// key. The flag is `true` when a new definition was written.
    async fn get_or_create_definition(
        &self,
        reference: &CredentialReference,
    ) -> Result<(CredentialDefinition, bool), RepositoryError>;

    /// All registered definitions, oldest first.
    async fn list_definitions(&self) -> Result<Vec<CredentialDefinition>, RepositoryError>;

    /// Find the credential for (username, definition), or create it with its
    /// attributes as one unit.
    async fn get_or_create_user_credential(
        &self,
        new: NewUserCredential,
    ) -> Result<IssueOutcome, RepositoryError>;

    /// Get a user credential with its definition and attributes.
    async fn get_user_credential(
        &self,
        id: UserCredentialId,
    ) -> Result<Option<UserCredential>, RepositoryError>;

    /// Credentials matching `filter`, in creation order.
    async fn list_user_credentials(
        &self,
        filter: &CredentialFilter,
        page: PageRequest,
    ) -> Result<Page<UserCredential>, RepositoryError>;

    /// Apply `patch` and return the updated record, or `None` for an unknown id.
    async fn update_user_credential(
        &self,
        id: UserCredentialId,
        patch: &CredentialPatch,
    ) -> Result<Option<UserCredential>, RepositoryError>;

    /// Round-trip to the backend, for readiness checks.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
