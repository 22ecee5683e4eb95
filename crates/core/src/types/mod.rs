//! Core types for the credentials service.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod credential;
pub mod id;
pub mod reference;
pub mod status;
pub mod username;

pub use credential::{
    CourseCertificate, CredentialDefinition, CredentialFilter, CredentialPatch,
    ProgramCertificate, UserCredential, UserCredentialAttribute,
};
pub use id::*;
pub use reference::{CredentialReference, ReferenceError};
pub use status::*;
pub use username::{Username, UsernameError};
