//! Plain request inputs.
//!
//! Every field is optional so that absence is reported by the engine as a
//! `BadRequest` naming the field, instead of failing during deserialization.

use serde::{Deserialize, Serialize};

/// Email + password pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDto {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl CredentialDto {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    /// Only an email, for flows that never see the password.
    pub fn email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            password: None,
        }
    }
}

/// A validation code submitted for consumption.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationDto {
    pub token: Option<String>,
}

impl ValidationDto {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }
}

/// Client profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDto {
    pub id: Option<String>,
    pub newsletter: Option<bool>,
    pub cgu: Option<bool>,
}

/// Employee profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeDto {
    pub id: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
}

impl ClientDto {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }
}

impl EmployeeDto {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }
}
