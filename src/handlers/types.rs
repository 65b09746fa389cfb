//! # API views
//!
//! Response shapes shared by the operator and webhook handlers. Entity models never
//! leave the crate directly; secrets in particular are reduced to presence flags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{integration_settings, unmatched_meeting, webhook_event};
use crate::pipeline::DeliveryReport;

/// Integration settings as seen by an operator.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub tenant_id: Uuid,
    pub has_api_key: bool,
    pub has_webhook_secret: bool,
    pub auto_process_enabled: bool,
    pub auto_match_enabled: bool,
    pub connected_at: Option<DateTime<Utc>>,
    pub last_webhook_received_at: Option<DateTime<Utc>>,
    /// Path to register with the provider
    pub webhook_path: String,
}

impl From<&integration_settings::Model> for SettingsView {
    fn from(model: &integration_settings::Model) -> Self {
        Self {
            tenant_id: model.tenant_id,
            has_api_key: model.api_key_ciphertext.is_some(),
            has_webhook_secret: model.webhook_secret_ciphertext.is_some(),
            auto_process_enabled: model.auto_process_enabled,
            auto_match_enabled: model.auto_match_enabled,
            connected_at: model.connected_at.map(|t| t.with_timezone(&Utc)),
            last_webhook_received_at: model
                .last_webhook_received_at
                .map(|t| t.with_timezone(&Utc)),
            webhook_path: format!("/webhooks/transcripts/{}", model.tenant_id),
        }
    }
}

/// Body of `PATCH /settings/transcripts`
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub auto_process_enabled: Option<bool>,
    pub auto_match_enabled: Option<bool>,
}

/// Body of `PUT /settings/transcripts/api-key`
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRequest {
    pub api_key: String,
}

/// Body of `PUT /settings/transcripts/webhook-secret`
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSecretRequest {
    pub webhook_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestResponse {
    pub success: bool,
    pub account: crate::provider::ProviderAccount,
}

/// Response to a processed webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub success: bool,
    /// ignored, processing_disabled, matched, queued or duplicate
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_id: Option<Uuid>,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub church_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
}

impl From<DeliveryReport> for WebhookResponse {
    fn from(report: DeliveryReport) -> Self {
        Self {
            success: true,
            outcome: report.outcome.as_str().to_string(),
            matched: report.matched(),
            transcript_id: report.transcript_id,
            church_id: report.church_id,
            call_id: report.call_id,
            duplicate: (report.outcome == crate::pipeline::DeliveryOutcome::Duplicate)
                .then_some(true),
        }
    }
}

/// Body returned with a 500 so the provider retries the delivery.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookFailure {
    pub error: String,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookHealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    pub signature_header: String,
}

/// Review queue entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedMeetingView {
    pub id: Uuid,
    pub external_meeting_id: String,
    pub transcript_id: Option<Uuid>,
    pub title: String,
    #[schema(value_type = Vec<String>)]
    pub participants: serde_json::Value,
    pub meeting_date: Option<DateTime<Utc>>,
    pub transcript_url: Option<String>,
    pub reason: String,
    pub matched_church_id: Option<String>,
    pub matched_call_id: Option<Uuid>,
    pub matched_at: Option<DateTime<Utc>>,
    pub matched_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<unmatched_meeting::Model> for UnmatchedMeetingView {
    fn from(model: unmatched_meeting::Model) -> Self {
        Self {
            id: model.id,
            external_meeting_id: model.external_meeting_id,
            transcript_id: model.transcript_id,
            title: model.title,
            participants: model.participants,
            meeting_date: model.meeting_date.map(|t| t.with_timezone(&Utc)),
            transcript_url: model.transcript_url,
            reason: model.reason,
            matched_church_id: model.matched_church_id,
            matched_call_id: model.matched_call_id,
            matched_at: model.matched_at.map(|t| t.with_timezone(&Utc)),
            matched_by: model.matched_by,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

/// Event log entry. The raw payload is included for operator debugging.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEventView {
    pub id: Uuid,
    pub external_meeting_id: String,
    pub event_type: String,
    pub client_reference_id: Option<String>,
    #[schema(value_type = Object)]
    pub payload: Option<serde_json::Value>,
    pub processed: bool,
    pub outcome: Option<String>,
    pub error: Option<String>,
    pub church_id: Option<String>,
    pub scheduled_call_id: Option<Uuid>,
    pub transcript_id: Option<Uuid>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<webhook_event::Model> for WebhookEventView {
    fn from(model: webhook_event::Model) -> Self {
        Self {
            id: model.id,
            external_meeting_id: model.external_meeting_id,
            event_type: model.event_type,
            client_reference_id: model.client_reference_id,
            payload: model.payload,
            processed: model.processed,
            outcome: model.outcome,
            error: model.error,
            church_id: model.church_id,
            scheduled_call_id: model.scheduled_call_id,
            transcript_id: model.transcript_id,
            received_at: model.received_at.with_timezone(&Utc),
            processed_at: model.processed_at.map(|t| t.with_timezone(&Utc)),
        }
    }
}

/// `GET /unmatched-meetings` response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnmatchedMeetingList {
    pub data: Vec<UnmatchedMeetingView>,
}

/// `GET /webhook-events` response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookEventList {
    pub data: Vec<WebhookEventView>,
}
