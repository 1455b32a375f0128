//! Credentials and the principal profiles attached to them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which kind of profile a credential belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    Client,
    Employee,
}

impl PrincipalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PrincipalKind::Client => "client",
            PrincipalKind::Employee => "employee",
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrincipalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(PrincipalKind::Client),
            "employee" => Ok(PrincipalKind::Employee),
            other => Err(format!("unknown principal kind '{other}'")),
        }
    }
}

/// Link from a credential to its single profile.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PrincipalLink {
    /// Credential created, profile not attached yet.
    #[default]
    Unset,
    Client(String),
    Employee(String),
}

impl PrincipalLink {
    pub fn kind(&self) -> Option<PrincipalKind> {
        match self {
            PrincipalLink::Unset => None,
            PrincipalLink::Client(_) => Some(PrincipalKind::Client),
            PrincipalLink::Employee(_) => Some(PrincipalKind::Employee),
        }
    }

    /// Split into the `(client_id, employee_id)` column pair used by SQL stores.
    pub fn as_columns(&self) -> (Option<&str>, Option<&str>) {
        match self {
            PrincipalLink::Unset => (None, None),
            PrincipalLink::Client(id) => (Some(id), None),
            PrincipalLink::Employee(id) => (None, Some(id)),
        }
    }

    /// Rebuild from a column pair. Returns `None` if both columns are set.
    pub fn from_columns(client_id: Option<String>, employee_id: Option<String>) -> Option<Self> {
        match (client_id, employee_id) {
            (None, None) => Some(PrincipalLink::Unset),
            (Some(id), None) => Some(PrincipalLink::Client(id)),
            (None, Some(id)) => Some(PrincipalLink::Employee(id)),
            (Some(_), Some(_)) => None,
        }
    }
}

/// Email + password-hash identity record.
#[derive(Debug, Clone)]
pub struct Credential {
    pub id: String,
    /// Trimmed, lowercased email.
    pub email: String,
    pub password_hash: String,
    pub principal: PrincipalLink,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub credential_id: String,
    pub newsletter: bool,
    pub cgu: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Employee profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub credential_id: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The profile a credential resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum Principal {
    Client(Client),
    Employee(Employee),
}

impl Principal {
    pub fn kind(&self) -> PrincipalKind {
        match self {
            Principal::Client(_) => PrincipalKind::Client,
            Principal::Employee(_) => PrincipalKind::Employee,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Principal::Client(c) => &c.id,
            Principal::Employee(e) => &e.id,
        }
    }
}
