//! Church directory seeding
//!
//! Loads churches, leader/coach contacts and scheduled calls from a JSON fixture.
//! Seeding is idempotent: churches and contacts are upserted and a call is only
//! created when the church has no call of the same type at the same time.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use uuid::Uuid;

use crate::crypto::CryptoKey;
use crate::repositories::{DirectoryRepository, ScheduledCallRepository, SettingsRepository};

/// Fixture file layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryFixture {
    pub tenant_id: Uuid,
    #[serde(default)]
    pub churches: Vec<FixtureChurch>,
    #[serde(default)]
    pub contacts: Vec<FixtureContact>,
    #[serde(default)]
    pub calls: Vec<FixtureCall>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureChurch {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureContact {
    pub church_id: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureCall {
    pub church_id: String,
    pub call_type: String,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub calendar_event_id: Option<String>,
}

fn default_role() -> String {
    "leader".to_string()
}

/// Read a fixture file and seed it.
pub async fn seed_directory_from_path(
    db: &DatabaseConnection,
    crypto_key: &CryptoKey,
    path: &Path,
) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read directory fixture {}", path.display()))?;
    let fixture: DirectoryFixture = serde_json::from_str(&raw)
        .with_context(|| format!("invalid directory fixture {}", path.display()))?;
    seed_directory(db, crypto_key, &fixture).await
}

/// Seed the directory and make sure the tenant has an integration settings row.
pub async fn seed_directory(
    db: &DatabaseConnection,
    crypto_key: &CryptoKey,
    fixture: &DirectoryFixture,
) -> Result<()> {
    let tenant_id = fixture.tenant_id;
    let directory = DirectoryRepository::new(db);
    let calls = ScheduledCallRepository::new(db);

    SettingsRepository::new(db, crypto_key)
        .get_or_create(tenant_id)
        .await
        .context("failed to create integration settings")?;

    for church in &fixture.churches {
        directory
            .upsert_church(tenant_id, &church.id, &church.name)
            .await
            .with_context(|| format!("failed to seed church {}", church.id))?;
    }
    log::info!("Seeded {} churches for tenant {}", fixture.churches.len(), tenant_id);

    for contact in &fixture.contacts {
        directory
            .upsert_contact(tenant_id, &contact.church_id, &contact.email, &contact.role)
            .await
            .with_context(|| format!("failed to seed contact for {}", contact.church_id))?;
    }

    let mut created = 0usize;
    for call in &fixture.calls {
        let existing = calls
            .candidates_for_church(tenant_id, &call.church_id)
            .await
            .with_context(|| format!("failed to read calls for {}", call.church_id))?;
        if existing
            .iter()
            .any(|c| c.call_type == call.call_type && c.scheduled_at == call.scheduled_at)
        {
            log::info!(
                "Call '{}' for church '{}' already exists, skipping",
                call.call_type,
                call.church_id
            );
            continue;
        }

        calls
            .create_scheduled(
                tenant_id,
                &call.church_id,
                &call.call_type,
                call.scheduled_at,
                call.calendar_event_id.clone(),
            )
            .await
            .with_context(|| format!("failed to seed call for {}", call.church_id))?;
        created += 1;
    }
    log::info!("Seeded {} scheduled calls for tenant {}", created, tenant_id);

    Ok(())
}
