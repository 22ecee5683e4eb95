//! Authentication, authorization and health endpoint tests.

#![allow(clippy::unwrap_used)]

use axum::http::Method;
use serde_json::json;

use credentials_integration_tests::{ADMIN_TOKEN, ISSUER_TOKEN, TestApp, VIEWER_TOKEN};

const DENIED: &str = "You do not have permission to perform this action.";

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_missing_token_is_forbidden() {
    let app = TestApp::new();
    let body = json!({"status": "revoked"});

    let requests = [
        (Method::GET, "/credentials?username=alice", None),
        (Method::POST, "/credentials", Some(&body)),
        (Method::GET, "/credentials/1", None),
        (Method::PATCH, "/credentials/1", Some(&body)),
    ];
    for (method, uri, body) in requests {
        let response = app.request(method.clone(), uri, None, body).await;
        assert_eq!(response.status, 403, "{method} {uri}");
        assert_eq!(
            response.body,
            json!({"detail": "Authentication credentials were not provided."})
        );
    }
}

#[tokio::test]
async fn test_unknown_token_is_forbidden() {
    let app = TestApp::new();

    let response = app
        .get("/credentials?username=alice", "not-a-configured-token")
        .await;

    assert_eq!(response.status, 403);
    assert_eq!(response.body, json!({"detail": "Invalid token."}));
}

// =============================================================================
// Authorization
// =============================================================================

#[tokio::test]
async fn test_viewer_cannot_issue() {
    let app = TestApp::new();
    app.add_program(10).await;

    let body = json!({"username": "alice", "credential": {"program_id": 10}, "attributes": []});
    let response = app.post("/credentials", VIEWER_TOKEN, &body).await;

    assert_eq!(response.status, 403);
    assert_eq!(response.body, json!({"detail": DENIED}));
    assert_eq!(app.store.credential_count(), 0);
}

#[tokio::test]
async fn test_issuer_cannot_update() {
    let app = TestApp::new();
    app.add_program(10).await;
    let body = json!({"username": "alice", "credential": {"program_id": 10}, "attributes": []});
    let issued = app.post("/credentials", ISSUER_TOKEN, &body).await;
    let uri = format!("/credentials/{}", issued.body["id"]);

    let response = app
        .patch(&uri, ISSUER_TOKEN, &json!({"status": "revoked"}))
        .await;

    assert_eq!(response.status, 403);
    assert_eq!(response.body, json!({"detail": DENIED}));

    let fetched = app.get(&uri, ISSUER_TOKEN).await;
    assert_eq!(fetched.body["status"], "awarded");
}

#[tokio::test]
async fn test_admin_can_do_everything() {
    let app = TestApp::new();
    app.add_program(10).await;
    let body = json!({"username": "alice", "credential": {"program_id": 10}, "attributes": []});

    let issued = app.post("/credentials", ADMIN_TOKEN, &body).await;
    assert_eq!(issued.status, 201);

    let uri = format!("/credentials/{}", issued.body["id"]);
    assert_eq!(app.get(&uri, ADMIN_TOKEN).await.status, 200);
    assert_eq!(
        app.patch(&uri, ADMIN_TOKEN, &json!({"status": "revoked"}))
            .await
            .status,
        200
    );
}

#[tokio::test]
async fn test_authorization_precedes_validation() {
    let app = TestApp::new();

    let response = app.post("/credentials", VIEWER_TOKEN, &json!({})).await;

    assert_eq!(response.status, 403);
}

// =============================================================================
// Health and request ids
// =============================================================================

#[tokio::test]
async fn test_health_needs_no_token() {
    let app = TestApp::new();

    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!("ok"));

    let ready = app.request(Method::GET, "/health/ready", None, None).await;
    assert_eq!(ready.status, 200);
}

#[tokio::test]
async fn test_readiness_reports_store_outage() {
    let app = TestApp::new();
    app.store.set_unavailable(true);

    let response = app.request(Method::GET, "/health/ready", None, None).await;

    assert_eq!(response.status, 503);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = TestApp::new();

    let response = app.request(Method::GET, "/health", None, None).await;

    let id = response.headers.get("x-request-id").unwrap();
    assert!(!id.is_empty());
}
