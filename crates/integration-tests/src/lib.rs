//! Integration tests for the credentials service.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process tests against the in-memory store
//! cargo test -p credentials-integration-tests
//!
//! # Include the PostgreSQL tests
//! CREDENTIALS_TEST_DATABASE_URL=postgres://localhost/credentials_test \
//!     cargo test -p credentials-integration-tests -- --include-ignored
//! ```
//!
//! # Helpers
//!
//! - [`TestApp`] - the real router over an in-memory store, driven with
//!   `tower::ServiceExt::oneshot`
//! - [`LogCapture`] - a tracing layer recording events so tests can assert on
//!   logger name, level and message

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

use credentials_api::config::{ApiTokens, PaginationConfig};
use credentials_api::db::{CredentialStore, InMemoryCredentialStore};
use credentials_api::{AppState, app};
use credentials_core::{CallerRole, CertificateType, CredentialDefinition, CredentialReference};

/// Token granting `admin`.
pub const ADMIN_TOKEN: &str = "adm-7Hq2Lx9Vb4Nc8Zr1Tw6Ym3Kp5Jd0Gs";
/// Token granting `issuer`.
pub const ISSUER_TOKEN: &str = "iss-4Fv8Qn2Wd6Rk9Xt1Bm5Hc7Lp3Zs0Jy";
/// Token granting `viewer`.
pub const VIEWER_TOKEN: &str = "vwr-9Ke3Uj6Pa1Mx4Dn8Ty2Gb5Rq7Wc0Hf";

/// Log target of the issuance engine.
pub const ISSUANCE_TARGET: &str = "credentials_api::services::issuance";
/// Log target of the credential registry.
pub const REGISTRY_TARGET: &str = "credentials_api::services::registry";

// =============================================================================
// Application
// =============================================================================

/// The service router over a fresh in-memory store.
pub struct TestApp {
    pub store: Arc<InMemoryCredentialStore>,
    router: Router,
}

/// A buffered response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Body parsed as JSON, or `Value::String` when it is not JSON.
    pub body: Value,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// App with default pagination.
    #[must_use]
    pub fn new() -> Self {
        Self::with_pagination(PaginationConfig::default())
    }

    /// App with custom page sizes.
    #[must_use]
    pub fn with_pagination(pagination: PaginationConfig) -> Self {
        let store = Arc::new(InMemoryCredentialStore::new());
        let tokens = ApiTokens::new(vec![
            (CallerRole::Admin, SecretString::from(ADMIN_TOKEN)),
            (CallerRole::Issuer, SecretString::from(ISSUER_TOKEN)),
            (CallerRole::Viewer, SecretString::from(VIEWER_TOKEN)),
        ]);
        let state = AppState::new(store.clone(), tokens, pagination);

        Self {
            store,
            router: app(state),
        }
    }

    /// Register a program certificate.
    ///
    /// # Panics
    ///
    /// Panics if the store refuses the definition.
    pub async fn add_program(&self, program_id: i64) -> CredentialDefinition {
        self.add(CredentialReference::Program { program_id }).await
    }

    /// Register a course certificate.
    ///
    /// # Panics
    ///
    /// Panics if the store refuses the definition.
    pub async fn add_course(
        &self,
        course_id: &str,
        certificate_type: CertificateType,
    ) -> CredentialDefinition {
        self.add(CredentialReference::Course {
            course_id: course_id.to_owned(),
            certificate_type,
        })
        .await
    }

    async fn add(&self, reference: CredentialReference) -> CredentialDefinition {
        match self.store.get_or_create_definition(&reference).await {
            Ok((definition, _)) => definition,
            Err(e) => panic!("failed to register {reference:?}: {e}"),
        }
    }

    /// Send a request through the router.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        };
        let request = request.unwrap_or_else(|e| panic!("invalid request: {e}"));

        let response = match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(infallible) => match infallible {},
        };
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .unwrap_or_else(|e| panic!("failed to read body: {e}"))
            .to_bytes();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// `GET` with a token.
    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(token), None).await
    }

    /// `POST` a JSON body with a token.
    pub async fn post(&self, uri: &str, token: &str, body: &Value) -> TestResponse {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    /// `PATCH` a JSON body with a token.
    pub async fn patch(&self, uri: &str, token: &str, body: &Value) -> TestResponse {
        self.request(Method::PATCH, uri, Some(token), Some(body)).await
    }
}

// =============================================================================
// Log capture
// =============================================================================

/// One captured event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Logger name (the event target).
    pub target: String,
    pub level: Level,
    pub message: String,
    /// Structured fields other than the message, rendered as text.
    pub fields: BTreeMap<String, String>,
}

/// Tracing layer that records every event it sees.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl LogCapture {
    /// New, empty capture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route this thread's events into the capture until the guard drops.
    ///
    /// Use with a current-thread runtime so request handling stays on the
    /// test's thread.
    #[must_use]
    pub fn install(&self) -> DefaultGuard {
        tracing::subscriber::set_default(Registry::default().with(self.clone()))
    }

    /// Everything captured so far.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records from `target` at `level`.
    #[must_use]
    pub fn matching(&self, target: &str, level: Level) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.target == target && r.level == level)
            .collect()
    }

    /// Records at `level` from any target.
    #[must_use]
    pub fn at_level(&self, level: Level) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level)
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogRecord {
                target: metadata.target().to_owned(),
                level: *metadata.level(),
                message: visitor.message,
                fields: visitor.fields,
            });
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            value.clone_into(&mut self.message);
        } else {
            self.fields.insert(field.name().to_owned(), value.to_owned());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields
                .insert(field.name().to_owned(), format!("{value:?}"));
        }
    }
}
