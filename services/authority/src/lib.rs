//! Shellward identity authority library crate.
//!
//! # Purpose
//! Issues and validates credentials for devices, users, and API tokens, and
//! authorizes namespace-scoped operations. Exposes the services, the store
//! contract with its in-memory implementation, configuration, and
//! observability for use by the binary and tests.
pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod namespaces;
pub mod observability;
pub mod sshkeys;
pub mod store;
pub mod tokens;

pub use context::RequestContext;
pub use error::{AuthError, AuthResult, StartupError};
