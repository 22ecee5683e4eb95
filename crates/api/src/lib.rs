//! Credentials API library.
//!
//! Issues, stores, updates and queries credentials awarded to users, served
//! over an authenticated HTTP API. The binary in `main.rs` wires this library
//! to `PostgreSQL`; tests drive [`routes::app`] against the in-memory store.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod serializers;
pub mod services;
pub mod state;

pub use routes::app;
pub use state::AppState;
