//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET   /health               - Liveness check
//! GET   /health/ready         - Readiness check (store round-trip)
//!
//! # Credentials (bearer token required)
//! GET   /credentials          - List a user's credentials    (can_view)
//! POST  /credentials          - Issue a credential            (can_create)
//! GET   /credentials/{id}     - Get one credential            (can_view)
//! PATCH /credentials/{id}     - Update a credential's status  (can_update)
//! ```

pub mod credentials;
pub mod health;

use axum::{Router, middleware, routing::get};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// All routes, without state or layers.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route(
            "/credentials",
            get(credentials::list).post(credentials::create),
        )
        .route(
            "/credentials/{id}",
            get(credentials::show).patch(credentials::update),
        )
}

/// The complete application: routes, request id, tracing and Sentry layers.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use secrecy::SecretString;
    use serde_json::Value;
    use tower::ServiceExt;

    use credentials_core::CallerRole;

    use super::*;
    use crate::config::{ApiTokens, PaginationConfig};
    use crate::db::InMemoryCredentialStore;
    use crate::middleware::REQUEST_ID_HEADER;

    const TOKEN: &str = "tok-3Rb7Nw1Kq9Xd5Lm2Hv8Cz4Pt6Jf0Gs";

    fn test_app() -> Router {
        let tokens = ApiTokens::new(vec![(CallerRole::Issuer, SecretString::from(TOKEN))]);
        app(AppState::new(
            Arc::new(InMemoryCredentialStore::new()),
            tokens,
            PaginationConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_upstream_request_id_is_echoed() {
        let request = Request::get("/health")
            .header(REQUEST_ID_HEADER, "req-123")
            .body(Body::empty())
            .unwrap();

        let response = test_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-123");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let request = Request::post("/credentials")
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"username\": "))
            .unwrap();

        let response = test_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["detail"].is_string());
    }
}
