//! Integration settings repository
//!
//! One row per tenant. Secrets are encrypted before they reach the database and
//! only ever decrypted for the duration of a provider call or signature check.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set,
};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::{PersistenceError, PersistenceResult};
use crate::crypto::{CryptoKey, SecretField, decrypt_secret, encrypt_secret};
use crate::error::is_unique_violation;
use crate::models::integration_settings::{self, Entity as IntegrationSettings};

/// Flag changes requested by an operator; `None` leaves a flag untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsUpdate {
    pub auto_process_enabled: Option<bool>,
    pub auto_match_enabled: Option<bool>,
}

/// Repository for IntegrationSettings database operations
pub struct SettingsRepository<'a> {
    db: &'a DatabaseConnection,
    crypto_key: &'a CryptoKey,
}

impl<'a> SettingsRepository<'a> {
    pub fn new(db: &'a DatabaseConnection, crypto_key: &'a CryptoKey) -> Self {
        Self { db, crypto_key }
    }

    /// Settings row for the tenant, if the integration was ever configured.
    pub async fn find(&self, tenant_id: Uuid) -> PersistenceResult<Option<integration_settings::Model>> {
        Ok(IntegrationSettings::find()
            .filter(integration_settings::Column::TenantId.eq(tenant_id))
            .one(self.db)
            .await?)
    }

    /// Get the tenant's settings, creating a row with both flags enabled when missing.
    pub async fn get_or_create(&self, tenant_id: Uuid) -> PersistenceResult<integration_settings::Model> {
        if let Some(existing) = self.find(tenant_id).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let settings = integration_settings::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            api_key_ciphertext: Set(None),
            webhook_secret_ciphertext: Set(None),
            auto_process_enabled: Set(true),
            auto_match_enabled: Set(true),
            connected_at: Set(None),
            last_webhook_received_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        match settings.insert(self.db).await {
            Ok(model) => Ok(model),
            Err(err) if is_unique_violation(&err) => self
                .find(tenant_id)
                .await?
                .ok_or_else(|| PersistenceError::not_found("integration settings", tenant_id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Store the provider API key and mark the integration connected.
    pub async fn connect(
        &self,
        tenant_id: Uuid,
        api_key: &str,
    ) -> PersistenceResult<integration_settings::Model> {
        let ciphertext = encrypt_secret(self.crypto_key, tenant_id, SecretField::ApiKey, api_key)?;
        let mut active = self.get_or_create(tenant_id).await?.into_active_model();

        let now = Utc::now();
        active.api_key_ciphertext = Set(Some(ciphertext));
        active.connected_at = Set(Some(now.into()));
        active.updated_at = Set(now.into());

        tracing::info!(tenant_id = %tenant_id, "Transcription provider connected");
        Ok(active.update(self.db).await?)
    }

    /// Clear the API key. Flags, webhook secret and liveness stay as they were.
    pub async fn disconnect(&self, tenant_id: Uuid) -> PersistenceResult<integration_settings::Model> {
        let existing = self
            .find(tenant_id)
            .await?
            .ok_or_else(|| PersistenceError::not_found("integration settings", tenant_id))?;
        let mut active = existing.into_active_model();

        active.api_key_ciphertext = Set(None);
        active.connected_at = Set(None);
        active.updated_at = Set(Utc::now().into());

        tracing::info!(tenant_id = %tenant_id, "Transcription provider disconnected");
        Ok(active.update(self.db).await?)
    }

    /// Set or clear the webhook signing secret.
    pub async fn set_webhook_secret(
        &self,
        tenant_id: Uuid,
        secret: Option<&str>,
    ) -> PersistenceResult<integration_settings::Model> {
        let ciphertext = secret
            .map(|s| encrypt_secret(self.crypto_key, tenant_id, SecretField::WebhookSecret, s))
            .transpose()?;
        let mut active = self.get_or_create(tenant_id).await?.into_active_model();

        active.webhook_secret_ciphertext = Set(ciphertext);
        active.updated_at = Set(Utc::now().into());

        Ok(active.update(self.db).await?)
    }

    pub async fn update_flags(
        &self,
        tenant_id: Uuid,
        update: SettingsUpdate,
    ) -> PersistenceResult<integration_settings::Model> {
        let mut active = self.get_or_create(tenant_id).await?.into_active_model();

        if let Some(enabled) = update.auto_process_enabled {
            active.auto_process_enabled = Set(enabled);
        }
        if let Some(enabled) = update.auto_match_enabled {
            active.auto_match_enabled = Set(enabled);
        }
        active.updated_at = Set(Utc::now().into());

        Ok(active.update(self.db).await?)
    }

    /// Liveness marker for authenticated deliveries.
    pub async fn touch_last_webhook(&self, tenant_id: Uuid) -> PersistenceResult<()> {
        let now = Utc::now();
        IntegrationSettings::update_many()
            .col_expr(
                integration_settings::Column::LastWebhookReceivedAt,
                sea_orm::sea_query::Expr::value(Some(sea_orm::prelude::DateTimeWithTimeZone::from(now))),
            )
            .filter(integration_settings::Column::TenantId.eq(tenant_id))
            .exec(self.db)
            .await?;
        Ok(())
    }

    pub fn api_key(
        &self,
        settings: &integration_settings::Model,
    ) -> PersistenceResult<Option<Zeroizing<String>>> {
        self.decrypt(settings, SecretField::ApiKey, settings.api_key_ciphertext.as_deref())
    }

    pub fn webhook_secret(
        &self,
        settings: &integration_settings::Model,
    ) -> PersistenceResult<Option<Zeroizing<String>>> {
        self.decrypt(
            settings,
            SecretField::WebhookSecret,
            settings.webhook_secret_ciphertext.as_deref(),
        )
    }

    fn decrypt(
        &self,
        settings: &integration_settings::Model,
        field: SecretField,
        ciphertext: Option<&[u8]>,
    ) -> PersistenceResult<Option<Zeroizing<String>>> {
        ciphertext
            .map(|bytes| decrypt_secret(self.crypto_key, settings.tenant_id, field, bytes))
            .transpose()
            .map_err(|err| {
                tracing::error!(tenant_id = %settings.tenant_id, ?field, "Secret decryption failed");
                PersistenceError::Crypto(err)
            })
    }
}
