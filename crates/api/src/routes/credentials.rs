//! Credential route handlers.
//!
//! Handlers take the capability extractor first so authorization is decided
//! before the body is read.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::Value;
use tracing::instrument;

use credentials_core::UserCredentialId;

use crate::error::AppError;
use crate::middleware::{CanCreate, CanUpdate, CanView};
use crate::serializers::{
    PageResponse, UserCredentialResponse, decode_issue_request, decode_patch,
};
use crate::services::{CredentialService, IssuanceEngine, ListParams};
use crate::state::AppState;

/// Path ids that are not integers name nothing.
fn parse_id(raw: &str) -> Result<UserCredentialId, AppError> {
    raw.parse()
        .map_err(|_| AppError::NotFound("Not found.".to_string()))
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// `GET /credentials`
#[instrument(skip_all, fields(caller = %caller.label))]
pub async fn list(
    State(state): State<AppState>,
    CanView(caller): CanView,
    Query(params): Query<ListParams>,
) -> Result<Json<PageResponse>, AppError> {
    let page = CredentialService::new(state.store(), state.pagination())
        .list(&caller, params)
        .await?;
    Ok(Json(page.into()))
}

/// `POST /credentials`
///
/// Responds 201 for both new and already-held credentials.
#[instrument(skip_all, fields(caller = %caller.label))]
pub async fn create(
    State(state): State<AppState>,
    CanCreate(caller): CanCreate,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<UserCredentialResponse>), AppError> {
    let request = decode_issue_request(&json_body(body)?)?;
    let outcome = IssuanceEngine::new(state.store())
        .issue(&caller, request)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(outcome.into_credential().into()),
    ))
}

/// `GET /credentials/{id}`
#[instrument(skip_all, fields(caller = %caller.label, id = %id))]
pub async fn show(
    State(state): State<AppState>,
    CanView(caller): CanView,
    Path(id): Path<String>,
) -> Result<Json<UserCredentialResponse>, AppError> {
    let id = parse_id(&id)?;
    let credential = CredentialService::new(state.store(), state.pagination())
        .get(&caller, id)
        .await?;
    Ok(Json(credential.into()))
}

/// `PATCH /credentials/{id}`
#[instrument(skip_all, fields(caller = %caller.label, id = %id))]
pub async fn update(
    State(state): State<AppState>,
    CanUpdate(caller): CanUpdate,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<UserCredentialResponse>, AppError> {
    let id = parse_id(&id)?;
    let patch = decode_patch(&json_body(body)?)?;
    let credential = CredentialService::new(state.store(), state.pagination())
        .update(&caller, id, &patch)
        .await?;
    Ok(Json(credential.into()))
}
