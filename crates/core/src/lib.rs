//! Credentials Core - Shared types library.
//!
//! This crate provides the domain types used across the credentials service:
//! - `api` - Authenticated HTTP service issuing and querying user credentials
//! - `cli` - Command-line tools for migrations and catalog management
//!
//! # Architecture
//!
//! The core crate contains only types and pure validation - no I/O, no database
//! access, no HTTP. Anything that needs a lookup (resolving a credential
//! reference against the catalog, find-or-create) lives in the `api` crate.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, usernames, statuses, credential references and records
//! - [`validation`] - Field-keyed validation errors and the attribute validator

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;
pub mod validation;

pub use types::*;
pub use validation::{
    AttributeError, AttributeInput, FieldError, ValidatedAttributes, ValidationErrors,
    validate_attributes,
};
