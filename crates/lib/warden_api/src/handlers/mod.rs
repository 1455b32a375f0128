//! Request handlers.
//!
//! Each handler maps one route onto one engine operation.

pub mod auth;
pub mod client;
pub mod employee;
pub mod validation;
