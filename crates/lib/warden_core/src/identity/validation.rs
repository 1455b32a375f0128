//! Validation token lifecycle: issue, notify, consume.
//!
//! A token is `Pending` until consumed (`Validated`). Once the clock passes
//! its expiry it is `Expired` either way; that state is never stored. The
//! pending → validated flip is a conditional store update, so two concurrent
//! consumptions cannot both succeed.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use super::{UserService, or_not_found};
use crate::auth::luhn;
use crate::error::{EngineError, Result};
use crate::models::{
    Credential, NewValidation, Owner, ValidationKind, ValidationState, ValidationToken,
};
use crate::notify::MailJob;
use crate::notify::templates::{KEY_APP_NAME, KEY_TOKEN, TOKEN_TEMPLATE};
use crate::store::{CredentialQuery, StoreError, ValidationQuery};
use crate::transfer::{CredentialDto, ValidationDto};
use crate::validate;

/// Fresh codes tried before a collision is treated as an internal failure.
const CODE_ATTEMPTS: usize = 3;

impl UserService {
    /// Issue a new validation of `kind` for the principal behind
    /// `credential.email` and mail its code unless it is a phone validation.
    ///
    /// Delivery runs in the background; its outcome never fails issuance.
    pub async fn issue_validation(
        &self,
        kind: ValidationKind,
        credential: &CredentialDto,
    ) -> Result<ValidationToken> {
        let email = validate::email(credential.email.as_deref())?;
        let credential = self.read_credential_by_email(&email).await?;
        let owner = self.owner_of(&credential).await?;

        let token = self.create_validation(kind, owner).await?;
        if kind.is_mailed() {
            self.notify(&credential.email, &token);
        }
        info!(validation_id = %token.id, kind = %kind, "validation issued");
        Ok(token)
    }

    /// Consume a validation of `kind`.
    pub async fn consume_validation(
        &self,
        kind: ValidationKind,
        validation: &ValidationDto,
        credential: &CredentialDto,
    ) -> Result<ValidationToken> {
        self.consume(kind, validation, credential)
            .await
            .map(|(token, _)| token)
    }

    /// Confirm control of the mailbox.
    pub async fn mail_validation(
        &self,
        validation: &ValidationDto,
        credential: &CredentialDto,
    ) -> Result<ValidationToken> {
        self.consume_validation(ValidationKind::Mail, validation, credential)
            .await
    }

    /// Consume a password reset code without changing the password.
    pub async fn password_validation(
        &self,
        validation: &ValidationDto,
        credential: &CredentialDto,
    ) -> Result<ValidationToken> {
        self.consume_validation(ValidationKind::Password, validation, credential)
            .await
    }

    /// Shared consumption path. Also returns the credential the token
    /// belongs to.
    pub(crate) async fn consume(
        &self,
        kind: ValidationKind,
        validation: &ValidationDto,
        credential: &CredentialDto,
    ) -> Result<(ValidationToken, Credential)> {
        let code = validate::code(validation.token.as_deref())?;
        let email = validate::email(credential.email.as_deref())?;

        let credential = self.read_credential_by_email(&email).await?;
        let owner = self.owner_of(&credential).await?;
        let query = ValidationQuery {
            code,
            kind,
            owner: &owner,
        };
        let mut token = self
            .store()
            .read_validation(&query)
            .await
            .map_err(or_not_found("validation not found"))?;

        match token.state(self.now()) {
            ValidationState::Expired => return Err(EngineError::expired()),
            ValidationState::Validated => return Err(EngineError::already_validated()),
            ValidationState::Pending => {}
        }

        token.validated = true;
        let token = self
            .store()
            .update_validation(&token)
            .await
            .map_err(|e| match e {
                // Someone else consumed it between our read and our write.
                StoreError::Conflict(_) => EngineError::already_validated(),
                other => or_not_found("validation not found")(other),
            })?;
        info!(validation_id = %token.id, kind = %kind, "validation consumed");
        Ok((token, credential))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn read_credential_by_email(&self, email: &str) -> Result<Credential> {
        self.store()
            .read_credential(CredentialQuery::Email(email))
            .await
            .map_err(or_not_found("credential not found"))
    }

    async fn owner_of(&self, credential: &Credential) -> Result<Owner> {
        let principal = self
            .store()
            .read_user(&credential.id)
            .await
            .map_err(or_not_found("user not found"))?;
        Ok(Owner::from(&principal))
    }

    /// Persist a pending validation, regenerating the code on collision.
    pub(crate) async fn create_validation(
        &self,
        kind: ValidationKind,
        owner: Owner,
    ) -> Result<ValidationToken> {
        let config = &self.services.config;
        for attempt in 1..=CODE_ATTEMPTS {
            let new = NewValidation {
                code: luhn::generate(config.code_length),
                kind,
                owner: owner.clone(),
                expires_at: self.validation_expiry()?,
            };
            match self.store().create_validation(&new).await {
                Ok(token) => return Ok(token),
                Err(StoreError::Conflict(reason)) => {
                    debug!(attempt, %reason, "validation code collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(EngineError::internal(format!(
            "no free validation code after {CODE_ATTEMPTS} attempts"
        )))
    }

    /// Expiry for a validation issued now.
    pub(crate) fn validation_expiry(&self) -> Result<DateTime<Utc>> {
        self.now()
            .checked_add_signed(self.services.config.validation_ttl)
            .ok_or_else(|| EngineError::internal("validation expiry out of range"))
    }

    /// Queue the code for delivery. Failure to queue is logged, not returned.
    pub(crate) fn notify(&self, to: &str, token: &ValidationToken) {
        let config = &self.services.config;
        let job = MailJob {
            to: to.to_string(),
            subject: config.mail_subject.clone(),
            template: TOKEN_TEMPLATE.to_string(),
            data: vec![
                (KEY_APP_NAME.to_string(), config.app_name.clone()),
                (KEY_TOKEN.to_string(), token.code.clone()),
            ],
        };
        if let Err(e) = self.services.notifications.enqueue(job) {
            error!(validation_id = %token.id, error = %e, "validation mail not queued");
        }
    }
}
