//! Password hashing via bcrypt.

use tracing::warn;

use crate::config::DEFAULT_BCRYPT_COST;
use crate::error::EngineError;

/// Lowest cost bcrypt accepts.
pub const MIN_COST: u32 = 4;

/// Highest cost bcrypt accepts.
pub const MAX_COST: u32 = 31;

/// Salted, deliberately slow one-way hashing.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    /// `cost` is clamped to bcrypt's accepted range (4..=31).
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_COST, MAX_COST),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a secret. Failure is fatal to the calling operation.
    pub fn hash(&self, secret: &str) -> Result<String, EngineError> {
        bcrypt::hash(secret, self.cost).map_err(|e| EngineError::internal(format!("bcrypt hash: {e}")))
    }

    /// Compare a candidate against a stored digest.
    ///
    /// A malformed digest never matches.
    pub fn verify(&self, digest: &str, candidate: &str) -> bool {
        match bcrypt::verify(candidate, digest) {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %e, "bcrypt verify failed on stored digest");
                false
            }
        }
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}
