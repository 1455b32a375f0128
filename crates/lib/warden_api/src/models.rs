//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_core::models::{Client, Employee, TokenPair, ValidationKind, ValidationToken};
use warden_core::transfer::{ClientDto, CredentialDto, EmployeeDto, ValidationDto};

/// Error body shared by every failing response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterClientRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub newsletter: Option<bool>,
    pub cgu: Option<bool>,
}

impl RegisterClientRequest {
    pub fn split(self) -> (CredentialDto, ClientDto) {
        (
            CredentialDto {
                email: self.email,
                password: self.password,
            },
            ClientDto {
                id: None,
                newsletter: self.newsletter,
                cgu: self.cgu,
            },
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterEmployeeRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
}

impl RegisterEmployeeRequest {
    pub fn split(self) -> (CredentialDto, EmployeeDto) {
        (
            CredentialDto {
                email: self.email,
                password: self.password,
            },
            EmployeeDto {
                id: None,
                firstname: self.firstname,
                lastname: self.lastname,
            },
        )
    }
}

/// `PUT /user/password`. With a `token` the change is a reset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
}

/// `POST /user/validation/renew`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueValidationRequest {
    pub email: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<ValidationKind>,
}

/// `PUT /user/register/validation`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsumeValidationRequest {
    pub email: Option<String>,
    pub token: Option<String>,
}

impl ConsumeValidationRequest {
    pub fn split(self) -> (ValidationDto, CredentialDto) {
        (
            ValidationDto { token: self.token },
            CredentialDto {
                email: self.email,
                password: None,
            },
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
            token_type: pair.token_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientResponse {
    pub id: String,
    pub credential_id: String,
    pub newsletter: bool,
    pub cgu: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Client> for ClientResponse {
    fn from(c: Client) -> Self {
        Self {
            id: c.id,
            credential_id: c.credential_id,
            newsletter: c.newsletter,
            cgu: c.cgu,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeResponse {
    pub id: String,
    pub credential_id: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Employee> for EmployeeResponse {
    fn from(e: Employee) -> Self {
        Self {
            id: e.id,
            credential_id: e.credential_id,
            firstname: e.firstname,
            lastname: e.lastname,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

/// A consumed validation. The code itself is never echoed back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ValidationKind,
    pub validated: bool,
    pub expires_at: DateTime<Utc>,
}

impl From<ValidationToken> for ValidationResponse {
    fn from(v: ValidationToken) -> Self {
        Self {
            id: v.id,
            kind: v.kind,
            validated: v.validated,
            expires_at: v.expires_at,
        }
    }
}
