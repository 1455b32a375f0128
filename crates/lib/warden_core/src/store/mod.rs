//! Credential store adapter.
//!
//! The engine keeps no durable state of its own. Everything lives behind
//! [`CredentialStore`], which must surface not-found, conflict and internal
//! failures as distinct errors, must write a registration all at once or not
//! at all, and must make [`CredentialStore::update_validation`] conditional on
//! the record still being pending.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::EngineError;
use crate::models::{
    Client, Credential, Employee, NewValidation, Owner, Principal, ValidationKind, ValidationToken,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// Uniqueness or state precondition violated.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Db(sqlx::Error),

    #[error("store error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            other => StoreError::Db(other),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => EngineError::not_found("record not found"),
            StoreError::Conflict(_) | StoreError::Db(_) | StoreError::Internal(_) => {
                EngineError::internal(e)
            }
        }
    }
}

/// How to find a credential.
#[derive(Debug, Clone, Copy)]
pub enum CredentialQuery<'a> {
    /// Normalized (trimmed, lowercased) email.
    Email(&'a str),
    Id(&'a str),
}

/// Identifying fields of a pending validation.
#[derive(Debug, Clone, Copy)]
pub struct ValidationQuery<'a> {
    pub code: &'a str,
    pub kind: ValidationKind,
    pub owner: &'a Owner,
}

/// Profile created together with its credential.
#[derive(Debug, Clone)]
pub enum NewProfile {
    Client {
        newsletter: bool,
        cgu: bool,
    },
    Employee {
        firstname: Option<String>,
        lastname: Option<String>,
    },
}

/// Everything a sign-up writes: credential, linked profile and the pending
/// mail validation owned by that profile.
#[derive(Debug, Clone)]
pub struct NewRegistration {
    /// Normalized email.
    pub email: String,
    pub password_hash: String,
    pub profile: NewProfile,
    /// Code of the mail validation.
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Records written by [`CredentialStore::register`].
#[derive(Debug, Clone)]
pub struct Registration {
    pub credential: Credential,
    pub principal: Principal,
    pub validation: ValidationToken,
}

/// Persistence boundary consumed by the engine.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Write a whole registration atomically. Fails with `Conflict` when the
    /// email is taken; on any failure nothing is left behind.
    async fn register(&self, new: &NewRegistration) -> Result<Registration, StoreError>;

    async fn read_credential(&self, query: CredentialQuery<'_>) -> Result<Credential, StoreError>;

    /// Persist email, password hash and principal link.
    async fn update_credential(&self, credential: &Credential) -> Result<(), StoreError>;

    /// Fails with `Conflict` when a pending validation with the same code,
    /// kind and owner exists.
    async fn create_validation(&self, new: &NewValidation) -> Result<ValidationToken, StoreError>;

    /// Most recent validation matching the query.
    async fn read_validation(
        &self,
        query: &ValidationQuery<'_>,
    ) -> Result<ValidationToken, StoreError>;

    /// Persist the `validated` flag. Only applies while the stored record is
    /// still pending; otherwise fails with `Conflict`. Two concurrent callers
    /// can therefore never both succeed.
    async fn update_validation(
        &self,
        validation: &ValidationToken,
    ) -> Result<ValidationToken, StoreError>;

    /// Resolve the live (not deleted) profile attached to a credential.
    async fn read_user(&self, credential_id: &str) -> Result<Principal, StoreError>;

    async fn read_client(&self, id: &str) -> Result<Client, StoreError>;

    async fn update_client(&self, client: &Client) -> Result<Client, StoreError>;

    /// Soft delete.
    async fn delete_client(&self, id: &str) -> Result<(), StoreError>;

    async fn read_employee(&self, id: &str) -> Result<Employee, StoreError>;

    async fn update_employee(&self, employee: &Employee) -> Result<Employee, StoreError>;

    /// Soft delete.
    async fn delete_employee(&self, id: &str) -> Result<(), StoreError>;

    /// Number of employees ever registered, soft-deleted ones included.
    async fn count_employees(&self) -> Result<i64, StoreError>;
}
