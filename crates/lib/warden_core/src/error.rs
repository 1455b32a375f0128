//! Engine error taxonomy.
//!
//! Every engine operation fails with an [`EngineError`]: a stable [`ErrorKind`]
//! the transport layer maps to a status code, a public message that is safe to
//! serialize, and an optional private cause that only ever reaches the log.

use std::fmt;

use thiserror::Error;
use tracing::{error, warn};

/// Convenience alias for engine results.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Stable failure categories exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or malformed required field.
    BadRequest,
    /// Credential, validation or profile absent.
    NotFound,
    /// Authentication or permission failure.
    Unauthorized,
    /// Password did not match the stored hash.
    InvalidCredential,
    /// Duplicate registration.
    AlreadyExists,
    /// Validation token past its expiry.
    Expired,
    /// Reuse of a consumed validation token.
    AlreadyValidated,
    /// Notification exhausted its retries.
    DeliveryFailed,
    /// Store, hashing or signing failure.
    Internal,
}

impl ErrorKind {
    /// Machine-readable code used in response bodies.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidCredential => "invalid_credential",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::Expired => "expired",
            ErrorKind::AlreadyValidated => "already_validated",
            ErrorKind::DeliveryFailed => "delivery_failed",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A typed engine failure.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct EngineError {
    kind: ErrorKind,
    message: String,
    cause: Option<String>,
    logged: bool,
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            logged: false,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn invalid_credential() -> Self {
        Self::new(ErrorKind::InvalidCredential, "invalid credential")
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    pub fn expired() -> Self {
        Self::new(ErrorKind::Expired, "validation has expired")
    }

    pub fn already_validated() -> Self {
        Self::new(ErrorKind::AlreadyValidated, "validation already validated")
    }

    pub fn delivery_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DeliveryFailed, message)
    }

    /// Internal failure. The cause is kept for the log only; the public
    /// message is always the generic one.
    pub fn internal(cause: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Internal, "internal server error").with_cause(cause)
    }

    /// Attach a private cause.
    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Public message, safe to send to callers.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Private cause, never serialized.
    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }

    pub fn is_logged(&self) -> bool {
        self.logged
    }

    /// Log the error once. Later calls on the same value are no-ops.
    pub fn log(mut self) -> Self {
        if !self.logged {
            match self.kind {
                ErrorKind::Internal | ErrorKind::DeliveryFailed => error!(
                    kind = %self.kind,
                    message = %self.message,
                    cause = self.cause.as_deref().unwrap_or("-"),
                    "engine error"
                ),
                _ => warn!(kind = %self.kind, message = %self.message, "engine error"),
            }
            self.logged = true;
        }
        self
    }
}
