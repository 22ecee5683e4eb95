//! Retrieval, listing and updates of issued credentials.

use serde::Deserialize;
use thiserror::Error;

use credentials_core::{
    Caller, CredentialFilter, CredentialPatch, CredentialStatus, UserCredential, UserCredentialId,
    Username, ValidationErrors,
};

use crate::config::PaginationConfig;
use crate::db::{CredentialStore, PageRequest, RepositoryError};

/// Message returned when a list request has no username filter.
pub const USERNAME_FILTER_REQUIRED: &str =
    "A username query string parameter is required for filtering user credentials.";

/// Errors that can occur in credential queries and updates.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A filter was missing or invalid.
    #[error("{0}")]
    Invalid(ValidationErrors),

    /// The requested page is past the end of the result set.
    #[error("Invalid page.")]
    InvalidPage,

    /// No credential has this id.
    #[error("user credential {0} not found")]
    NotFound(UserCredentialId),

    /// Storage failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Raw list parameters as received from the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListParams {
    pub username: Option<String>,
    pub status: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// One page of a filtered listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPage {
    pub results: Vec<UserCredential>,
    /// Size of the whole filtered result set.
    pub count: i64,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
    /// Whether the client chose `page_size` explicitly.
    pub page_size_requested: bool,
    pub filter: CredentialFilter,
}

impl CredentialPage {
    /// Whether a page follows this one.
    #[must_use]
    pub fn has_next(&self) -> bool {
        i64::from(self.page) * i64::from(self.page_size) < self.count
    }

    /// Whether a page precedes this one.
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Read and update access to issued credentials.
pub struct CredentialService<'a> {
    store: &'a dyn CredentialStore,
    pagination: PaginationConfig,
}

impl<'a> CredentialService<'a> {
    /// Create a credential service over `store`.
    #[must_use]
    pub const fn new(store: &'a dyn CredentialStore, pagination: PaginationConfig) -> Self {
        Self { store, pagination }
    }

    /// Get one credential by id.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::NotFound` if the id is unknown.
    /// Returns `QueryError::Repository` if storage fails.
    pub async fn get(
        &self,
        caller: &Caller,
        id: UserCredentialId,
    ) -> Result<UserCredential, QueryError> {
        tracing::debug!(caller = %caller.label, user_credential_id = %id, "Fetching user credential");
        self.store
            .get_user_credential(id)
            .await?
            .ok_or(QueryError::NotFound(id))
    }

    /// List a user's credentials, optionally narrowed by status, in creation
    /// order.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Invalid` if `username` is absent or blank, or
    /// `status` is not a known status.
    /// Returns `QueryError::InvalidPage` if `page` is malformed or out of range.
    /// Returns `QueryError::Repository` if storage fails.
    pub async fn list(
        &self,
        caller: &Caller,
        params: ListParams,
    ) -> Result<CredentialPage, QueryError> {
        let filter = parse_filter(&params)?;
        let page = parse_page(params.page.as_deref())?;
        let (page_size, page_size_requested) = self.page_size(params.page_size.as_deref());

        let request = PageRequest {
            offset: i64::from(page - 1) * i64::from(page_size),
            limit: i64::from(page_size),
        };
        let found = self.store.list_user_credentials(&filter, request).await?;

        if page > 1 && request.offset >= found.total {
            return Err(QueryError::InvalidPage);
        }

        tracing::debug!(
            caller = %caller.label,
            username = %filter.username,
            status = ?filter.status,
            count = found.total,
            page,
            "Listed user credentials"
        );

        Ok(CredentialPage {
            results: found.items,
            count: found.total,
            page,
            page_size,
            page_size_requested,
            filter,
        })
    }

    /// Apply `patch` to a credential.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::NotFound` if the id is unknown.
    /// Returns `QueryError::Repository` if storage fails.
    pub async fn update(
        &self,
        caller: &Caller,
        id: UserCredentialId,
        patch: &CredentialPatch,
    ) -> Result<UserCredential, QueryError> {
        let updated = self
            .store
            .update_user_credential(id, patch)
            .await?
            .ok_or(QueryError::NotFound(id))?;

        tracing::info!(
            caller = %caller.label,
            user_credential_id = %id,
            status = %updated.status,
            "Updated user credential"
        );
        Ok(updated)
    }

    /// Page size for a request: the client's choice clamped to the maximum,
    /// or the default when absent or unusable.
    fn page_size(&self, raw: Option<&str>) -> (u32, bool) {
        match raw.map(str::trim).and_then(|s| s.parse::<u32>().ok()) {
            Some(size) if size > 0 => (size.min(self.pagination.max_page_size), true),
            _ => (self.pagination.default_page_size, false),
        }
    }
}

fn parse_filter(params: &ListParams) -> Result<CredentialFilter, QueryError> {
    let mut errors = ValidationErrors::new();

    let username = params
        .username
        .as_deref()
        .and_then(|raw| Username::parse(raw).ok());
    if username.is_none() {
        errors.add_message("username", USERNAME_FILTER_REQUIRED);
    }

    let status = match params.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match raw.parse::<CredentialStatus>() {
            Ok(status) => Some(status),
            Err(_) => {
                errors.add_message(
                    "status",
                    format!("Select a valid choice. {raw} is not one of the available choices."),
                );
                None
            }
        },
    };

    match username {
        Some(username) if errors.is_empty() => Ok(CredentialFilter { username, status }),
        _ => Err(QueryError::Invalid(errors)),
    }
}

fn parse_page(raw: Option<&str>) -> Result<u32, QueryError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(1),
        Some(raw) => match raw.parse::<u32>() {
            Ok(page) if page > 0 => Ok(page),
            _ => Err(QueryError::InvalidPage),
        },
    }
}
