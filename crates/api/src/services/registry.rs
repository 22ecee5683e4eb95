//! Credential registry.
//!
//! Resolves a [`CredentialReference`] to the catalog entry it names. Each
//! reference variant has its own lookup; adding a credential kind means adding
//! a variant and its arm here, not touching issuance.

use thiserror::Error;

use credentials_core::{CredentialDefinition, CredentialReference};

use crate::db::{CredentialStore, RepositoryError};

/// Errors that can occur while resolving a reference.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// No definition matches the reference.
    #[error("Credential ID [{identifier}] for [{kind} matching query does not exist.]")]
    NotFound {
        identifier: String,
        kind: &'static str,
    },

    /// The lookup itself failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Looks up credential definitions by natural key.
pub struct CredentialRegistry<'a> {
    store: &'a dyn CredentialStore,
}

impl<'a> CredentialRegistry<'a> {
    /// Create a registry over `store`.
    #[must_use]
    pub const fn new(store: &'a dyn CredentialStore) -> Self {
        Self { store }
    }

    /// Resolve `reference` to its definition.
    ///
    /// An unknown reference is a client data error and is logged at ERROR with
    /// the same text the caller receives.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::NotFound` if no definition matches.
    /// Returns `ResolutionError::Repository` if the lookup fails.
    pub async fn resolve(
        &self,
        reference: &CredentialReference,
    ) -> Result<CredentialDefinition, ResolutionError> {
        let found = match reference {
            CredentialReference::Program { program_id } => {
                self.store.find_program_certificate(*program_id).await?
            }
            CredentialReference::Course {
                course_id,
                certificate_type,
            } => {
                self.store
                    .find_course_certificate(course_id, *certificate_type)
                    .await?
            }
        };

        found.ok_or_else(|| {
            let err = ResolutionError::NotFound {
                identifier: reference.identifier(),
                kind: reference.kind_name(),
            };
            tracing::error!(
                credential_id = %reference.identifier(),
                credential_kind = reference.kind_name(),
                "{err}"
            );
            err
        })
    }
}
