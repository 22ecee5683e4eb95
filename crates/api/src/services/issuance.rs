//! Issuance engine.
//!
//! Turns a decoded issuance request into a stored user credential. All
//! validation happens before the store is touched; the find-or-create itself
//! is delegated to [`CredentialStore::get_or_create_user_credential`], which
//! is atomic per (username, definition) pair.

use serde_json::Value;
use thiserror::Error;

use credentials_core::{
    AttributeInput, Caller, CredentialReference, Username, ValidationErrors, validate_attributes,
};

use super::registry::{CredentialRegistry, ResolutionError};
use crate::db::{CredentialStore, IssueOutcome, NewUserCredential, RepositoryError};

/// Errors that can occur during issuance.
#[derive(Debug, Error)]
pub enum IssuanceError {
    /// The request failed validation; nothing was written.
    #[error("{0}")]
    Invalid(ValidationErrors),

    /// Storage failed after validation passed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A structurally decoded issuance request.
///
/// Field contents are still unchecked: the username may be blank, the
/// credential may not name anything, attributes may be blank or repeated.
/// A member is `None` when it was absent or malformed; the reason is in
/// `errors`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueRequest {
    pub username: Option<String>,
    /// The raw `credential` member, parsed into a reference during issuance.
    pub credential: Option<Value>,
    pub attributes: Option<Vec<AttributeInput>>,
    pub download_url: Option<String>,
    /// Problems found while decoding the body.
    pub errors: ValidationErrors,
}

/// Issues credentials to users.
pub struct IssuanceEngine<'a> {
    store: &'a dyn CredentialStore,
    registry: CredentialRegistry<'a>,
}

impl<'a> IssuanceEngine<'a> {
    /// Create an issuance engine over `store`.
    #[must_use]
    pub const fn new(store: &'a dyn CredentialStore) -> Self {
        Self {
            store,
            registry: CredentialRegistry::new(store),
        }
    }

    /// Find or create the credential `request` describes.
    ///
    /// Every field is validated and all problems are reported together. When
    /// the user already holds the credential, the existing record is returned
    /// unchanged and the submitted attributes are discarded.
    ///
    /// # Errors
    ///
    /// Returns `IssuanceError::Invalid` with a field-keyed map if any field is
    /// invalid or the credential cannot be resolved.
    /// Returns `IssuanceError::Repository` if storage fails.
    pub async fn issue(
        &self,
        caller: &Caller,
        request: IssueRequest,
    ) -> Result<IssueOutcome, IssuanceError> {
        let mut errors = request.errors;

        let username = match request.username.as_deref().map(Username::parse) {
            None => None,
            Some(Ok(username)) => Some(username),
            Some(Err(e)) => {
                errors.add_message("username", e.to_string());
                None
            }
        };

        let attributes = match request.attributes.map(validate_attributes) {
            None => None,
            Some(Ok(attributes)) => Some(attributes),
            Some(Err(e)) => {
                errors.set("attributes", e.into());
                None
            }
        };

        let definition = match request.credential.as_ref().map(CredentialReference::from_json) {
            None => None,
            Some(Ok(reference)) => match self.registry.resolve(&reference).await {
                Ok(definition) => Some(definition),
                Err(e @ ResolutionError::NotFound { .. }) => {
                    errors.add_message("credential", e.to_string());
                    None
                }
                Err(ResolutionError::Repository(e)) => return Err(e.into()),
            },
            Some(Err(e)) => {
                errors.add_message("credential", e.to_string());
                None
            }
        };

        let (Some(username), Some(attributes), Some(definition)) =
            (username, attributes, definition)
        else {
            return Err(IssuanceError::Invalid(errors));
        };
        if !errors.is_empty() {
            return Err(IssuanceError::Invalid(errors));
        }

        let submitted = attributes.len();
        let identifier = definition.reference().identifier();
        let outcome = self
            .store
            .get_or_create_user_credential(NewUserCredential {
                username,
                credential: definition,
                download_url: request.download_url,
                attributes,
            })
            .await?;

        match &outcome {
            IssueOutcome::Created(credential) => {
                tracing::info!(
                    caller = %caller.label,
                    user_credential_id = %credential.id,
                    username = %credential.username,
                    credential_id = %identifier,
                    attributes = credential.attributes.len(),
                    "Issued user credential"
                );
            }
            IssueOutcome::Existing(credential) => {
                tracing::warn!(
                    caller = %caller.label,
                    user_credential_id = %credential.id,
                    dropped_attributes = submitted,
                    "User [{}] already has a credential for program [{}].",
                    credential.username,
                    identifier
                );
            }
        }

        Ok(outcome)
    }
}
