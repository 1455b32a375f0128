//! Engine configuration.
//!
//! Built once at startup and shared read-only behind an `Arc`.

use std::time::Duration as StdDuration;

use chrono::Duration;

/// Default validation code lifetime: 15 minutes.
pub const DEFAULT_VALIDATION_TTL_SECS: i64 = 15 * 60;

/// Default number of digits in a validation code (check digit included).
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Bounded retry for notification delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub attempts: u32,
    /// Fixed pause between two attempts.
    pub backoff: StdDuration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: StdDuration::from_secs(1),
        }
    }
}

/// Configuration for the identity engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Application name injected into notification templates.
    pub app_name: String,
    /// Subject line of validation mails.
    pub mail_subject: String,
    /// Lifetime of a validation code.
    pub validation_ttl: Duration,
    /// Length of generated validation codes.
    pub code_length: usize,
    /// bcrypt cost used when hashing passwords.
    pub bcrypt_cost: u32,
    /// Retry policy for notification delivery.
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_name: "Warden".into(),
            mail_subject: "Warden".into(),
            validation_ttl: Duration::seconds(DEFAULT_VALIDATION_TTL_SECS),
            code_length: DEFAULT_CODE_LENGTH,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            retry: RetryPolicy::default(),
        }
    }
}
