//! Session token issuance, verification and renewal.
//!
//! Tokens are HS256 JWTs. They are self-contained: nothing is persisted, so a
//! rotated refresh token stays cryptographically valid until its own expiry.
//! Clients are expected to discard it after a successful renew.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::EngineError;
use crate::models::{PrincipalKind, TokenClaims, TokenKind, TokenPair};
use crate::uuid::uuidv4;

/// Access token lifetime: 15 minutes.
pub const ACCESS_TOKEN_EXPIRY_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 30 days.
pub const REFRESH_TOKEN_EXPIRY_SECS: i64 = 30 * 24 * 60 * 60;

/// Session token failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("value token is required")]
    Missing,

    #[error("token has expired")]
    Expired,

    #[error("token is malformed")]
    Malformed,

    #[error("token kind mismatch: expected {expected:?}")]
    WrongKind { expected: TokenKind },

    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<TokenError> for EngineError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Missing => EngineError::bad_request(e.to_string()),
            TokenError::Expired | TokenError::Malformed | TokenError::WrongKind { .. } => {
                EngineError::unauthorized(e.to_string())
            }
            TokenError::Signing(_) => EngineError::internal(e),
        }
    }
}

/// Mints and verifies access/refresh token pairs.
#[derive(Clone)]
pub struct SessionIssuer {
    secret: Arc<[u8]>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl SessionIssuer {
    /// Issuer with the default lifetimes and the system clock.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            secret: Arc::from(secret),
            access_ttl: Duration::seconds(ACCESS_TOKEN_EXPIRY_SECS),
            refresh_ttl: Duration::seconds(REFRESH_TOKEN_EXPIRY_SECS),
            clock: Arc::new(SystemClock),
        }
    }

    /// Override both lifetimes. The refresh lifetime must exceed the access
    /// lifetime; otherwise it is raised to twice the access lifetime.
    pub fn with_ttls(mut self, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = if refresh_ttl > access_ttl {
            refresh_ttl
        } else {
            access_ttl * 2
        };
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign a single token of the given kind.
    pub fn issue(
        &self,
        subject: &str,
        principal: PrincipalKind,
        kind: TokenKind,
    ) -> Result<String, TokenError> {
        let now = self.clock.now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = TokenClaims {
            sub: subject.to_string(),
            kind: principal,
            typ: kind,
            iat: now.timestamp(),
            exp: now
                .checked_add_signed(ttl)
                .ok_or_else(|| TokenError::Signing("token expiry out of range".into()))?
                .timestamp(),
            jti: uuidv4().to_string(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| TokenError::Signing(format!("jwt encode: {e}")))
    }

    /// Sign a fresh access/refresh pair.
    pub fn issue_pair(
        &self,
        subject: &str,
        principal: PrincipalKind,
    ) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue(subject, principal, TokenKind::Access)?,
            refresh_token: self.issue(subject, principal, TokenKind::Refresh)?,
            expires_in: self.access_ttl.num_seconds(),
            token_type: "Bearer".to_string(),
        })
    }

    /// Check signature, structure, expiry and kind, in that order.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<TokenClaims, TokenError> {
        let key = DecodingKey::from_secret(&self.secret);
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock below.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<TokenClaims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                match e.kind() {
                    JwtErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Malformed,
                }
            })?;

        if self.clock.now().timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }
        if claims.typ != expected {
            return Err(TokenError::WrongKind { expected });
        }
        Ok(claims)
    }

    /// Exchange a refresh token for a brand-new pair.
    ///
    /// A missing or blank token is a bad request, not an authentication
    /// failure: the caller made no attempt at all.
    pub fn renew(&self, refresh_token: Option<&str>) -> Result<TokenPair, TokenError> {
        let token = refresh_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(TokenError::Missing)?;
        let claims = self.verify(token, TokenKind::Refresh)?;
        self.issue_pair(&claims.sub, claims.kind)
    }
}

/// Signing secret for the API: `JWT_SECRET`, else `AUTH_SECRET`, else the
/// one stored under the user data dir (created on first use).
pub fn resolve_jwt_secret() -> String {
    ["JWT_SECRET", "AUTH_SECRET"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|secret| !secret.is_empty())
        .unwrap_or_else(|| stored_secret(&jwt_secret_path()))
}

fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("warden")
        .join("jwt-secret")
}

/// Read the secret at `path`, or generate one and try to store it there.
///
/// A secret that cannot be stored is still returned; sessions signed with it
/// just won't survive a restart.
fn stored_secret(path: &Path) -> String {
    if let Ok(existing) = fs::read_to_string(path) {
        let existing = existing.trim();
        if !existing.is_empty() {
            return existing.to_string();
        }
    }

    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    let written = match path.parent() {
        Some(dir) => fs::create_dir_all(dir).and_then(|()| fs::write(path, &secret)),
        None => fs::write(path, &secret),
    };
    match written {
        Ok(()) => info!(path = %path.display(), "generated new JWT secret"),
        Err(e) => warn!(
            path = %path.display(),
            error = %e,
            "could not store JWT secret, sessions will not survive a restart"
        ),
    }
    secret
}
