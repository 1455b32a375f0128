//! Identity & validation engine.
//!
//! [`Services`] holds the long-lived collaborators and is built once at
//! startup. Each request gets a [`UserService`] bound to the acting identity;
//! every operation validates its input, checks permissions against that
//! identity and only then touches the store.

pub mod client;
pub mod credential;
pub mod employee;
pub mod validation;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::auth::{Anonymous, PasswordHasher, Permission};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::notify::NotificationQueue;
use crate::store::{CredentialStore, StoreError};

pub use credential::Authenticated;

/// Shared engine dependencies. Cheap to clone.
#[derive(Clone)]
pub struct Services {
    store: Arc<dyn CredentialStore>,
    notifications: NotificationQueue,
    config: Arc<EngineConfig>,
    clock: Arc<dyn Clock>,
    hasher: PasswordHasher,
}

impl Services {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        notifications: NotificationQueue,
        config: Arc<EngineConfig>,
    ) -> Self {
        let hasher = PasswordHasher::new(config.bcrypt_cost);
        Self {
            store,
            notifications,
            config,
            clock: Arc::new(SystemClock),
            hasher,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Engine bound to `access` for the duration of one request.
    pub fn user(&self, access: Arc<dyn Permission>) -> UserService {
        UserService {
            services: self.clone(),
            access,
        }
    }

    /// Engine bound to an unauthenticated caller.
    pub fn anonymous(&self) -> UserService {
        self.user(Arc::new(Anonymous))
    }
}

/// Request-scoped engine.
pub struct UserService {
    services: Services,
    access: Arc<dyn Permission>,
}

impl UserService {
    /// The acting identity.
    pub fn access(&self) -> &dyn Permission {
        self.access.as_ref()
    }

    fn store(&self) -> &dyn CredentialStore {
        self.services.store.as_ref()
    }

    fn now(&self) -> DateTime<Utc> {
        self.services.clock.now()
    }
}

/// Turn an evaluator refusal into `Unauthorized`.
fn ensure(granted: bool) -> Result<()> {
    if granted {
        Ok(())
    } else {
        Err(EngineError::unauthorized("unauthorized"))
    }
}

/// Translate a store failure, naming what was missing on `NotFound`.
fn or_not_found(message: &'static str) -> impl FnOnce(StoreError) -> EngineError {
    move |e| match e {
        StoreError::NotFound => EngineError::not_found(message),
        other => EngineError::from(other),
    }
}
