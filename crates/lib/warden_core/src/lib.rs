//! # warden_core
//!
//! Identity and validation engine for Warden: credential authentication,
//! session tokens, permission evaluation and single-use validation codes.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod migrate;
pub mod models;
pub mod notify;
pub mod store;
pub mod transfer;
pub mod uuid;
pub mod validate;

pub use error::{EngineError, ErrorKind, Result};
pub use identity::{Services, UserService};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
