//! In-process store.
//!
//! Complete adapter used by tests and by the server's `--in-memory` mode.
//! A single `RwLock` guards all maps, so every read-then-write (email
//! uniqueness, registration, conditional validation update) happens under one
//! write guard.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    CredentialQuery, CredentialStore, NewProfile, NewRegistration, Registration, StoreError,
    ValidationQuery,
};
use crate::clock::{Clock, SystemClock};
use crate::models::{
    Client, Credential, Employee, NewValidation, Owner, Principal, PrincipalLink,
    ValidationKind, ValidationToken,
};
use crate::uuid::uuidv7;

/// A profile plus its soft-delete marker.
#[derive(Debug, Clone)]
struct Row<T> {
    record: T,
    deleted_at: Option<DateTime<Utc>>,
}

impl<T> Row<T> {
    fn live(&self) -> Option<&T> {
        match self.deleted_at {
            None => Some(&self.record),
            Some(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    credentials: HashMap<String, Credential>,
    /// Normalized email → credential id.
    emails: HashMap<String, String>,
    clients: HashMap<String, Row<Client>>,
    employees: HashMap<String, Row<Employee>>,
    validations: HashMap<String, ValidationToken>,
}

/// In-memory [`CredentialStore`].
pub struct MemoryStore {
    state: RwLock<State>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store whose record timestamps come from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(State::default()),
            clock,
        }
    }

    /// Every validation ever created, oldest first.
    pub async fn validations(&self) -> Vec<ValidationToken> {
        let state = self.state.read().await;
        let mut all: Vec<_> = state.validations.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn register(&self, new: &NewRegistration) -> Result<Registration, StoreError> {
        let mut state = self.state.write().await;
        if state.emails.contains_key(&new.email) {
            return Err(StoreError::Conflict(format!(
                "email '{}' already registered",
                new.email
            )));
        }

        let now = self.clock.now();
        let credential_id = uuidv7().to_string();
        let profile_id = uuidv7().to_string();
        let (principal, link, owner) = match &new.profile {
            NewProfile::Client { newsletter, cgu } => (
                Principal::Client(Client {
                    id: profile_id.clone(),
                    credential_id: credential_id.clone(),
                    newsletter: *newsletter,
                    cgu: *cgu,
                    created_at: now,
                    updated_at: now,
                }),
                PrincipalLink::Client(profile_id.clone()),
                Owner::Client(profile_id),
            ),
            NewProfile::Employee {
                firstname,
                lastname,
            } => (
                Principal::Employee(Employee {
                    id: profile_id.clone(),
                    credential_id: credential_id.clone(),
                    firstname: firstname.clone(),
                    lastname: lastname.clone(),
                    created_at: now,
                    updated_at: now,
                }),
                PrincipalLink::Employee(profile_id.clone()),
                Owner::Employee(profile_id),
            ),
        };
        let credential = Credential {
            id: credential_id,
            email: new.email.clone(),
            password_hash: new.password_hash.clone(),
            principal: link,
            created_at: now,
            updated_at: now,
        };
        let validation = ValidationToken {
            id: uuidv7().to_string(),
            code: new.code.clone(),
            kind: ValidationKind::Mail,
            validated: false,
            owner,
            expires_at: new.expires_at,
            created_at: now,
            updated_at: now,
        };

        state
            .emails
            .insert(credential.email.clone(), credential.id.clone());
        state
            .credentials
            .insert(credential.id.clone(), credential.clone());
        match &principal {
            Principal::Client(client) => {
                state.clients.insert(
                    client.id.clone(),
                    Row {
                        record: client.clone(),
                        deleted_at: None,
                    },
                );
            }
            Principal::Employee(employee) => {
                state.employees.insert(
                    employee.id.clone(),
                    Row {
                        record: employee.clone(),
                        deleted_at: None,
                    },
                );
            }
        }
        state
            .validations
            .insert(validation.id.clone(), validation.clone());

        Ok(Registration {
            credential,
            principal,
            validation,
        })
    }

    async fn read_credential(&self, query: CredentialQuery<'_>) -> Result<Credential, StoreError> {
        let state = self.state.read().await;
        let id = match query {
            CredentialQuery::Email(email) => state.emails.get(email).ok_or(StoreError::NotFound)?,
            CredentialQuery::Id(id) => id,
        };
        state.credentials.get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn update_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let previous_email = state
            .credentials
            .get(&credential.id)
            .map(|c| c.email.clone())
            .ok_or(StoreError::NotFound)?;

        if previous_email != credential.email {
            if state.emails.contains_key(&credential.email) {
                return Err(StoreError::Conflict(format!(
                    "email '{}' already registered",
                    credential.email
                )));
            }
            state.emails.remove(&previous_email);
            state
                .emails
                .insert(credential.email.clone(), credential.id.clone());
        }

        let mut updated = credential.clone();
        updated.updated_at = self.clock.now();
        state.credentials.insert(updated.id.clone(), updated);
        Ok(())
    }

    async fn create_validation(&self, new: &NewValidation) -> Result<ValidationToken, StoreError> {
        let mut state = self.state.write().await;
        let collides = state.validations.values().any(|v| {
            !v.validated && v.code == new.code && v.kind == new.kind && v.owner == new.owner
        });
        if collides {
            return Err(StoreError::Conflict("pending validation code collision".into()));
        }
        let now = self.clock.now();
        let validation = ValidationToken {
            id: uuidv7().to_string(),
            code: new.code.clone(),
            kind: new.kind,
            validated: false,
            owner: new.owner.clone(),
            expires_at: new.expires_at,
            created_at: now,
            updated_at: now,
        };
        state
            .validations
            .insert(validation.id.clone(), validation.clone());
        Ok(validation)
    }

    async fn read_validation(
        &self,
        query: &ValidationQuery<'_>,
    ) -> Result<ValidationToken, StoreError> {
        let state = self.state.read().await;
        state
            .validations
            .values()
            .filter(|v| v.code == query.code && v.kind == query.kind && &v.owner == query.owner)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_validation(
        &self,
        validation: &ValidationToken,
    ) -> Result<ValidationToken, StoreError> {
        let mut state = self.state.write().await;
        let now = self.clock.now();
        let stored = state
            .validations
            .get_mut(&validation.id)
            .ok_or(StoreError::NotFound)?;
        if stored.validated {
            return Err(StoreError::Conflict("validation is no longer pending".into()));
        }
        stored.validated = validation.validated;
        stored.updated_at = now;
        Ok(stored.clone())
    }

    async fn read_user(&self, credential_id: &str) -> Result<Principal, StoreError> {
        let state = self.state.read().await;
        let client = state
            .clients
            .values()
            .filter_map(Row::live)
            .find(|c| c.credential_id == credential_id);
        if let Some(client) = client {
            return Ok(Principal::Client(client.clone()));
        }
        state
            .employees
            .values()
            .filter_map(Row::live)
            .find(|e| e.credential_id == credential_id)
            .map(|e| Principal::Employee(e.clone()))
            .ok_or(StoreError::NotFound)
    }

    async fn read_client(&self, id: &str) -> Result<Client, StoreError> {
        let state = self.state.read().await;
        state
            .clients
            .get(id)
            .and_then(Row::live)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_client(&self, client: &Client) -> Result<Client, StoreError> {
        let mut state = self.state.write().await;
        let now = self.clock.now();
        let row = state
            .clients
            .get_mut(&client.id)
            .filter(|row| row.deleted_at.is_none())
            .ok_or(StoreError::NotFound)?;
        row.record = Client {
            updated_at: now,
            ..client.clone()
        };
        Ok(row.record.clone())
    }

    async fn delete_client(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let now = self.clock.now();
        let row = state
            .clients
            .get_mut(id)
            .filter(|row| row.deleted_at.is_none())
            .ok_or(StoreError::NotFound)?;
        row.deleted_at = Some(now);
        Ok(())
    }

    async fn read_employee(&self, id: &str) -> Result<Employee, StoreError> {
        let state = self.state.read().await;
        state
            .employees
            .get(id)
            .and_then(Row::live)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_employee(&self, employee: &Employee) -> Result<Employee, StoreError> {
        let mut state = self.state.write().await;
        let now = self.clock.now();
        let row = state
            .employees
            .get_mut(&employee.id)
            .filter(|row| row.deleted_at.is_none())
            .ok_or(StoreError::NotFound)?;
        row.record = Employee {
            updated_at: now,
            ..employee.clone()
        };
        Ok(row.record.clone())
    }

    async fn delete_employee(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let now = self.clock.now();
        let row = state
            .employees
            .get_mut(id)
            .filter(|row| row.deleted_at.is_none())
            .ok_or(StoreError::NotFound)?;
        row.deleted_at = Some(now);
        Ok(())
    }

    async fn count_employees(&self) -> Result<i64, StoreError> {
        let state = self.state.read().await;
        Ok(state.employees.len() as i64)
    }
}
