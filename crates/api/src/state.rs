//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::{ApiTokens, PaginationConfig};
use crate::db::CredentialStore;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; holds the storage backend and the parts of
/// the configuration handlers need.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn CredentialStore>,
    tokens: ApiTokens,
    pagination: PaginationConfig,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `store` - Credential storage backend
    /// * `tokens` - Accepted bearer tokens
    /// * `pagination` - List page size limits
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: ApiTokens,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store,
                tokens,
                pagination,
            }),
        }
    }

    /// Get a reference to the credential store.
    #[must_use]
    pub fn store(&self) -> &dyn CredentialStore {
        self.inner.store.as_ref()
    }

    /// Get a reference to the accepted tokens.
    #[must_use]
    pub fn tokens(&self) -> &ApiTokens {
        &self.inner.tokens
    }

    /// Get the pagination limits.
    #[must_use]
    pub fn pagination(&self) -> PaginationConfig {
        self.inner.pagination
    }
}
