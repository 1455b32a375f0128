//! Client accounts.

use tracing::info;

use super::{UserService, ensure, or_not_found};
use crate::error::{EngineError, Result};
use crate::models::{Client, Principal};
use crate::store::NewProfile;
use crate::transfer::{ClientDto, CredentialDto};
use crate::validate;

impl UserService {
    /// Public sign-up: credential, client profile and a mailed validation.
    pub async fn register_client(
        &self,
        credential: &CredentialDto,
        client: &ClientDto,
    ) -> Result<Client> {
        let email = validate::email(credential.email.as_deref())?;
        let password = validate::password(credential.password.as_deref())?;
        validate::accepted("cgu", client.cgu)?;

        let registration = self
            .register_principal(
                &email,
                password,
                NewProfile::Client {
                    newsletter: client.newsletter.unwrap_or(false),
                    cgu: true,
                },
            )
            .await?;
        let Principal::Client(profile) = registration.principal else {
            return Err(EngineError::internal("client registration stored another profile"));
        };

        info!(client_id = %profile.id, "client registered");
        Ok(profile)
    }

    pub async fn update_client(&self, dto: &ClientDto) -> Result<Client> {
        let id = validate::required("id", dto.id.as_deref())?;
        let mut client = self.read_client(id).await?;
        ensure(self.access.can_update(&client, &[]).await)?;

        if let Some(newsletter) = dto.newsletter {
            client.newsletter = newsletter;
        }
        if let Some(cgu) = dto.cgu {
            client.cgu = cgu;
        }
        let client = self
            .store()
            .update_client(&client)
            .await
            .map_err(or_not_found("client not found"))?;
        info!(client_id = %client.id, "client updated");
        Ok(client)
    }

    /// Soft delete.
    pub async fn delete_client(&self, dto: &ClientDto) -> Result<()> {
        let id = validate::required("id", dto.id.as_deref())?;
        let client = self.read_client(id).await?;
        ensure(self.access.can_delete(&client, &[]).await)?;

        self.store()
            .delete_client(&client.id)
            .await
            .map_err(or_not_found("client not found"))?;
        info!(client_id = %client.id, "client deleted");
        Ok(())
    }

    pub async fn get_client(&self, dto: &ClientDto) -> Result<Client> {
        let id = validate::required("id", dto.id.as_deref())?;
        let client = self.read_client(id).await?;
        ensure(self.access.can_read(&client, &[]).await)?;
        Ok(client)
    }

    async fn read_client(&self, id: &str) -> Result<Client> {
        self.store()
            .read_client(id)
            .await
            .map_err(or_not_found("client not found"))
    }
}
