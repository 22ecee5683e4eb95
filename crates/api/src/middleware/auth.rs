//! Bearer-token authorization extractors.
//!
//! Each route declares the capability it needs by taking one of
//! [`CanView`], [`CanCreate`] or [`CanUpdate`]. The extractor resolves the
//! token to a [`Caller`] and checks the role before the handler runs; every
//! failure is a 403.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn handler(CanView(caller): CanView) -> impl IntoResponse {
//!     format!("hello {}", caller.label)
//! }
//! ```

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use credentials_core::{Caller, Capability};

use crate::state::AppState;

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRejection {
    /// No usable `Authorization: Bearer` header.
    MissingCredentials,
    /// The token is not configured.
    InvalidToken,
    /// The caller's role lacks the capability.
    Forbidden(Capability),
}

impl AuthRejection {
    const fn detail(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "Authentication credentials were not provided.",
            Self::InvalidToken => "Invalid token.",
            Self::Forbidden(_) => "You do not have permission to perform this action.",
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (StatusCode::FORBIDDEN, Json(json!({ "detail": self.detail() }))).into_response()
    }
}

/// Resolve the request's bearer token and check it grants `capability`.
fn authorize(
    parts: &Parts,
    state: &AppState,
    capability: Capability,
) -> Result<Caller, AuthRejection> {
    let token = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .ok_or(AuthRejection::MissingCredentials)?;

    let caller = state
        .tokens()
        .authenticate(token)
        .ok_or(AuthRejection::InvalidToken)?;

    if !caller.can(capability) {
        tracing::info!(
            caller = %caller.label,
            role = %caller.role,
            capability = %capability,
            "Caller lacks capability"
        );
        return Err(AuthRejection::Forbidden(capability));
    }

    Ok(caller)
}

/// Token from an `Authorization` header value. The scheme is matched
/// case-insensitively.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

macro_rules! capability_extractor {
    ($(#[$meta:meta])* $name:ident, $capability:expr) => {
        $(#[$meta])*
        pub struct $name(pub Caller);

        impl FromRequestParts<AppState> for $name {
            type Rejection = AuthRejection;

            async fn from_request_parts(
                parts: &mut Parts,
                state: &AppState,
            ) -> Result<Self, Self::Rejection> {
                authorize(parts, state, $capability).map(Self)
            }
        }
    };
}

capability_extractor!(
    /// Extractor requiring `can_view`.
    CanView,
    Capability::View
);
capability_extractor!(
    /// Extractor requiring `can_create`.
    CanCreate,
    Capability::Create
);
capability_extractor!(
    /// Extractor requiring `can_update`.
    CanUpdate,
    Capability::Update
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer   abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }

    #[test]
    fn test_rejections_are_forbidden() {
        for rejection in [
            AuthRejection::MissingCredentials,
            AuthRejection::InvalidToken,
            AuthRejection::Forbidden(Capability::Update),
        ] {
            assert_eq!(rejection.into_response().status(), StatusCode::FORBIDDEN);
        }
    }
}
