//! Business logic services.
//!
//! # Services
//!
//! - `registry` - Resolves credential references to catalog definitions
//! - `issuance` - Idempotent find-or-create of user credentials
//! - `credentials` - Retrieval, filtered listing and status updates

pub mod credentials;
pub mod issuance;
pub mod registry;

pub use credentials::{CredentialPage, CredentialService, ListParams, QueryError};
pub use issuance::{IssuanceEngine, IssuanceError, IssueRequest};
pub use registry::{CredentialRegistry, ResolutionError};
