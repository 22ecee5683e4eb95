//! HTTP middleware and request extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, error capture)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded in the span, echoed on the response)
//!
//! Authorization is not a layer: handlers take a capability extractor from
//! [`auth`].

pub mod auth;
pub mod request_id;

pub use auth::{AuthRejection, CanCreate, CanUpdate, CanView};
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
