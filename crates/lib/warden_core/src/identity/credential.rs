//! Authentication, registration plumbing and password changes.

use std::sync::Arc;

use tracing::{debug, info};

use super::{UserService, ensure, or_not_found};
use crate::auth::{ValidationGrant, luhn};
use crate::error::{EngineError, Result};
use crate::models::{PrincipalKind, ValidationKind};
use crate::store::{CredentialQuery, NewProfile, NewRegistration, Registration, StoreError};
use crate::transfer::{CredentialDto, ValidationDto};
use crate::validate;

/// Outcome of a successful [`UserService::authenticate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    pub credential_id: String,
    /// Id of the client or employee profile.
    pub principal_id: String,
    /// Decides the role of every later request made with this session.
    pub kind: PrincipalKind,
}

impl UserService {
    /// Check an email/password pair and resolve the principal behind it.
    pub async fn authenticate(&self, dto: &CredentialDto) -> Result<Authenticated> {
        let email = validate::email(dto.email.as_deref())?;
        let password = dto
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| EngineError::bad_request("value password is required"))?;

        let credential = self
            .store()
            .read_credential(CredentialQuery::Email(&email))
            .await
            .map_err(or_not_found("credential not found"))?;

        if !self
            .services
            .hasher
            .verify(&credential.password_hash, password)
        {
            debug!(credential_id = %credential.id, "password mismatch");
            return Err(EngineError::invalid_credential());
        }

        let principal = self
            .store()
            .read_user(&credential.id)
            .await
            .map_err(or_not_found("user not found"))?;

        info!(credential_id = %credential.id, kind = %principal.kind(), "authenticated");
        Ok(Authenticated {
            credential_id: credential.id,
            principal_id: principal.id().to_string(),
            kind: principal.kind(),
        })
    }

    /// Rehash and store a new password for the credential behind `dto.email`.
    ///
    /// The acting identity must be allowed to update that credential.
    pub async fn update_password(&self, dto: &CredentialDto) -> Result<()> {
        let email = validate::email(dto.email.as_deref())?;
        let password = validate::password(dto.password.as_deref())?;

        let mut credential = self
            .store()
            .read_credential(CredentialQuery::Email(&email))
            .await
            .map_err(or_not_found("credential not found"))?;
        ensure(self.access.can_update(&credential, &[]).await)?;

        credential.password_hash = self.services.hasher.hash(password)?;
        self.store()
            .update_credential(&credential)
            .await
            .map_err(or_not_found("credential not found"))?;
        info!(credential_id = %credential.id, "password updated");
        Ok(())
    }

    /// Consume a password validation code, then update the password on the
    /// strength of that code alone.
    pub async fn reset_password(
        &self,
        validation: &ValidationDto,
        credential: &CredentialDto,
    ) -> Result<()> {
        // Reject a weak password before burning the code.
        validate::password(credential.password.as_deref())?;
        let (_, holder) = self
            .consume(ValidationKind::Password, validation, credential)
            .await?;

        let grant = self.services.user(Arc::new(ValidationGrant::new(holder.id)));
        grant.update_password(credential).await
    }

    // -----------------------------------------------------------------------
    // Registration plumbing shared by clients and employees
    // -----------------------------------------------------------------------

    /// Write credential, profile and mail validation in one store call, then
    /// queue the code. Taken emails are refused before hashing.
    pub(crate) async fn register_principal(
        &self,
        email: &str,
        password: &str,
        profile: NewProfile,
    ) -> Result<Registration> {
        match self
            .store()
            .read_credential(CredentialQuery::Email(email))
            .await
        {
            Ok(_) => return Err(EngineError::already_exists("credential already exists")),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let new = NewRegistration {
            email: email.to_string(),
            password_hash: self.services.hasher.hash(password)?,
            profile,
            code: luhn::generate(self.services.config.code_length),
            expires_at: self.validation_expiry()?,
        };
        let registration = self.store().register(&new).await.map_err(|e| match e {
            // A new owner has no pending codes, so the only conflict left is
            // a concurrent registration of the same email.
            StoreError::Conflict(_) => EngineError::already_exists("credential already exists"),
            other => other.into(),
        })?;
        self.notify(&registration.credential.email, &registration.validation);
        Ok(registration)
    }
}
