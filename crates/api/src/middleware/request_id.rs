//! Request ID middleware.
//!
//! Every request gets an id, taken from an upstream `x-request-id` header when
//! it is well formed or generated as a UUID v4 otherwise. The id is recorded
//! on the request span, tagged into the Sentry scope, stored in the request
//! extensions and echoed on the response.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Request id of the current request, available as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Accept upstream ids made of visible ASCII without spaces, within a length
/// limit, so they can be logged verbatim.
fn usable(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN && id.bytes().all(|b| b.is_ascii_graphic())
}

/// Middleware that ensures every request has a request ID.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|id| usable(id))
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    Span::current().record("request_id", &request_id);

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_request_ids() {
        assert!(usable("5f0c2f0e-1c1b-4a57-9a53-1e1c3f8f2b7a"));
        assert!(usable("cf-ray:8a1b2c3d"));
        assert!(!usable(""));
        assert!(!usable("has space"));
        assert!(!usable(&"a".repeat(MAX_REQUEST_ID_LEN + 1)));
    }
}
