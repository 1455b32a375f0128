//! Single-use, time-bound validation tokens.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::Principal;

/// What a validation token proves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationKind {
    /// Control of the credential's mailbox.
    Mail,
    /// A pending password reset.
    Password,
    /// Control of a phone number. Never mailed.
    Phone,
}

impl ValidationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationKind::Mail => "mail",
            ValidationKind::Password => "password",
            ValidationKind::Phone => "phone",
        }
    }

    /// Whether issuing this kind sends a mail.
    pub fn is_mailed(self) -> bool {
        !matches!(self, ValidationKind::Phone)
    }
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mail" => Ok(ValidationKind::Mail),
            "password" => Ok(ValidationKind::Password),
            "phone" => Ok(ValidationKind::Phone),
            other => Err(format!("unknown validation kind '{other}'")),
        }
    }
}

/// The principal a validation belongs to. Exactly one, by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Owner {
    Client(String),
    Employee(String),
}

impl Owner {
    pub fn as_columns(&self) -> (Option<&str>, Option<&str>) {
        match self {
            Owner::Client(id) => (Some(id), None),
            Owner::Employee(id) => (None, Some(id)),
        }
    }

    pub fn from_columns(client_id: Option<String>, employee_id: Option<String>) -> Option<Self> {
        match (client_id, employee_id) {
            (Some(id), None) => Some(Owner::Client(id)),
            (None, Some(id)) => Some(Owner::Employee(id)),
            _ => None,
        }
    }
}

impl From<&Principal> for Owner {
    fn from(principal: &Principal) -> Self {
        match principal {
            Principal::Client(c) => Owner::Client(c.id.clone()),
            Principal::Employee(e) => Owner::Employee(e.id.clone()),
        }
    }
}

/// Lifecycle state. `Expired` is derived from the clock, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationState {
    Pending,
    Validated,
    Expired,
}

/// A persisted validation token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationToken {
    pub id: String,
    #[serde(skip_serializing)]
    pub code: String,
    pub kind: ValidationKind,
    pub validated: bool,
    pub owner: Owner,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ValidationToken {
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Lifecycle state at `now`. Expiry wins over consumption, so an old
    /// code reports `Expired` whether or not it was used.
    pub fn state(&self, now: DateTime<Utc>) -> ValidationState {
        if self.has_expired(now) {
            ValidationState::Expired
        } else if self.validated {
            ValidationState::Validated
        } else {
            ValidationState::Pending
        }
    }
}

/// Fields needed to persist a new validation.
#[derive(Debug, Clone)]
pub struct NewValidation {
    pub code: String,
    pub kind: ValidationKind,
    pub owner: Owner,
    pub expires_at: DateTime<Utc>,
}
