//! # Webhook processing pipeline
//!
//! Drives an authenticated delivery through
//! `Logged → Fetched → Matched|Unmatched → Persisted → Linked|Queued → Completed`.
//! The event row is written before any work and closed exactly once. Failures after
//! logging leave `processed = false` with the error recorded so the provider's
//! redelivery can start a fresh attempt.

use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::RedeliveryPolicy;
use crate::crypto::CryptoKey;
use crate::matching::{
    ChurchResolution, MatchInput, MatchResult, Matcher, TierOutcome, UnmatchedReason,
};
use crate::models::{Transcript, integration_settings, webhook_event};
use crate::notifications::{NotificationKind, Notifier, TranscriptNotification};
use crate::provider::{FetchError, TranscriptProvider};
use crate::repositories::{
    CallLink, DirectoryRepository, EventCompletion, NewWebhookEvent, PersistenceError,
    ScheduledCallRepository, SettingsRepository, TranscriptLink, TranscriptRepository,
    UnmatchedMeetingRepository, WebhookEventRepository,
};
use crate::server::AppState;

/// The only event type that triggers processing, in normalized form.
pub const TRANSCRIPTION_COMPLETED: &str = "transcription_completed";

/// Inbound notification body. Provider-specific extra fields are kept in the raw log.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub meeting_id: String,
    pub event_type: String,
    #[serde(default)]
    pub client_reference_id: Option<String>,
}

/// `"Transcription completed"`, `transcription-completed` and `TRANSCRIPTION_COMPLETED`
/// all normalize to `transcription_completed`.
pub fn normalize_event_type(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Final state recorded on the event row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Event type other than transcription completed
    Ignored,
    /// `auto_process_enabled` is off
    ProcessingDisabled,
    Matched,
    Queued,
    /// Meeting already completed earlier; nothing fetched
    Duplicate,
    Failed,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Ignored => "ignored",
            DeliveryOutcome::ProcessingDisabled => "processing_disabled",
            DeliveryOutcome::Matched => "matched",
            DeliveryOutcome::Queued => "queued",
            DeliveryOutcome::Duplicate => "duplicate",
            DeliveryOutcome::Failed => "failed",
        }
    }
}

/// What the handler reports back for a completed delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReport {
    pub event_id: Uuid,
    pub outcome: DeliveryOutcome,
    pub transcript_id: Option<Uuid>,
    pub church_id: Option<String>,
    pub call_id: Option<Uuid>,
    pub unmatched_meeting_id: Option<Uuid>,
}

impl DeliveryReport {
    fn closed(event_id: Uuid, outcome: DeliveryOutcome) -> Self {
        Self {
            event_id,
            outcome,
            transcript_id: None,
            church_id: None,
            call_id: None,
            unmatched_meeting_id: None,
        }
    }

    /// A delivery counts as matched once a church is resolved.
    pub fn matched(&self) -> bool {
        self.church_id.is_some()
    }
}

/// Processing failure after authentication.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transcript fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}

impl PipelineError {
    /// Short label for the `error` field of a 500 response.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineError::Fetch(_) => "Transcript fetch failed",
            PipelineError::Persistence(_) => "Persistence failure",
        }
    }
}

/// Borrowed view of everything a delivery needs.
pub struct WebhookPipeline<'a> {
    db: &'a DatabaseConnection,
    crypto_key: &'a CryptoKey,
    provider: &'a dyn TranscriptProvider,
    notifier: &'a Notifier,
    matcher: Matcher,
    redelivery: RedeliveryPolicy,
}

impl<'a> WebhookPipeline<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            db: &state.db,
            crypto_key: &state.crypto_key,
            provider: state.provider.as_ref(),
            notifier: &state.notifier,
            matcher: Matcher::new(state.config.matching.window()),
            redelivery: state.config.webhook.redelivery_policy,
        }
    }

    /// Process one authenticated, parsed delivery.
    ///
    /// `raw_payload` is the full delivery body as JSON, stored verbatim on the log row.
    pub async fn process(
        &self,
        settings: &integration_settings::Model,
        payload: &WebhookPayload,
        raw_payload: serde_json::Value,
    ) -> Result<DeliveryReport, PipelineError> {
        let tenant_id = settings.tenant_id;
        let events = WebhookEventRepository::new(self.db);
        let event_type = normalize_event_type(&payload.event_type);

        let event = events
            .record_received(NewWebhookEvent {
                tenant_id,
                external_meeting_id: payload.meeting_id.clone(),
                event_type: event_type.clone(),
                client_reference_id: payload.client_reference_id.clone(),
                payload: raw_payload,
            })
            .await?;

        if event_type != TRANSCRIPTION_COMPLETED {
            info!(
                tenant_id = %tenant_id,
                meeting_id = %payload.meeting_id,
                event_type = %event_type,
                "Ignoring unsupported webhook event type"
            );
            let report = DeliveryReport::closed(event.id, DeliveryOutcome::Ignored);
            return self
                .close(&events, event.id, DeliveryOutcome::Ignored, report)
                .await;
        }

        if !settings.auto_process_enabled {
            info!(
                tenant_id = %tenant_id,
                meeting_id = %payload.meeting_id,
                "Auto-processing disabled; delivery logged only"
            );
            let report = DeliveryReport::closed(event.id, DeliveryOutcome::ProcessingDisabled);
            return self
                .close(&events, event.id, DeliveryOutcome::ProcessingDisabled, report)
                .await;
        }

        if self.redelivery == RedeliveryPolicy::Skip
            && let Some(prior) = events
                .find_completed_for_meeting(tenant_id, &payload.meeting_id)
                .await?
        {
            let report = self.duplicate_report(tenant_id, &event, &prior).await?;
            info!(
                tenant_id = %tenant_id,
                meeting_id = %payload.meeting_id,
                prior_event_id = %prior.id,
                "Meeting already processed; skipping redelivery"
            );
            return self
                .close(&events, event.id, DeliveryOutcome::Duplicate, report)
                .await;
        }

        match self.run(settings, &payload.meeting_id, event.id).await {
            Ok(report) => {
                let outcome = report.outcome;
                self.close(&events, event.id, outcome, report).await
            }
            Err(err) => {
                warn!(
                    tenant_id = %tenant_id,
                    meeting_id = %payload.meeting_id,
                    event_id = %event.id,
                    error = %err,
                    retryable = matches!(&err, PipelineError::Fetch(fetch) if fetch.is_retryable()),
                    "Webhook processing failed"
                );
                if let Err(log_err) = events.mark_failed(event.id, &err.to_string()).await {
                    tracing::error!(
                        event_id = %event.id,
                        error = %log_err,
                        "Could not record processing failure on webhook event"
                    );
                }
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        settings: &integration_settings::Model,
        meeting_id: &str,
        event_id: Uuid,
    ) -> Result<DeliveryReport, PipelineError> {
        let tenant_id = settings.tenant_id;
        let api_key = SettingsRepository::new(self.db, self.crypto_key)
            .api_key(settings)?
            .ok_or(FetchError::MissingApiKey)?;

        let transcript = self.provider.fetch(&api_key, meeting_id).await?;

        let result = if settings.auto_match_enabled {
            self.match_transcript(tenant_id, &transcript).await?
        } else {
            MatchResult::unmatched(UnmatchedReason::AutoMatchDisabled)
        };
        metrics::counter!("transcript_match_total", "tier" => result.tier_label()).increment(1);

        let stored = TranscriptRepository::new(self.db)
            .save_transcript(
                tenant_id,
                &transcript,
                TranscriptLink {
                    church_id: result.church_id.clone(),
                    scheduled_call_id: result.call_id,
                },
            )
            .await?;

        if let Some(call_id) = result.call_id {
            TranscriptRepository::new(self.db)
                .link_transcript_to_call(tenant_id, call_id, CallLink::from_transcript(&transcript))
                .await?;
        }

        // An earlier resolution already stored on the transcript still counts,
        // unless matching is switched off entirely.
        let effective_church = match result.reason {
            Some(UnmatchedReason::AutoMatchDisabled) => None,
            _ => stored.church_id.clone(),
        };

        let mut report = DeliveryReport {
            event_id,
            outcome: DeliveryOutcome::Matched,
            transcript_id: Some(stored.id),
            church_id: effective_church.clone(),
            call_id: effective_church.as_ref().and(stored.scheduled_call_id),
            unmatched_meeting_id: None,
        };

        if effective_church.is_none() {
            let reason = result.reason.unwrap_or(UnmatchedReason::NoCandidate);
            let queued = UnmatchedMeetingRepository::new(self.db)
                .save_unmatched_meeting(tenant_id, &transcript, Some(stored.id), reason)
                .await?;
            report.outcome = DeliveryOutcome::Queued;
            report.unmatched_meeting_id = Some(queued.id);
        }

        info!(
            tenant_id = %tenant_id,
            meeting_id,
            transcript_id = %stored.id,
            outcome = report.outcome.as_str(),
            tier = result.tier_label(),
            church_id = ?report.church_id,
            call_id = ?report.call_id,
            "Transcript processed"
        );

        self.notify(tenant_id, &transcript, &report, result.reason);
        Ok(report)
    }

    async fn match_transcript(
        &self,
        tenant_id: Uuid,
        transcript: &Transcript,
    ) -> Result<MatchResult, PersistenceError> {
        let directory = DirectoryRepository::new(self.db).load(tenant_id).await?;
        let emails = transcript.participant_emails();
        let input = MatchInput {
            title: &transcript.title,
            participant_emails: &emails,
            meeting_date: transcript.meeting_date,
        };

        let church = self.matcher.resolve_church(&directory, &input);
        let call = match &church {
            ChurchResolution::Resolved { church_id, .. } => {
                let calls = ScheduledCallRepository::new(self.db)
                    .candidates_for_meeting(tenant_id, church_id, &transcript.external_meeting_id)
                    .await?;
                self.matcher.refine_call(&calls, input.meeting_date)
            }
            ChurchResolution::Unresolved(_) => TierOutcome::NoMatch,
        };

        Ok(self.matcher.decide(church, call))
    }

    async fn duplicate_report(
        &self,
        tenant_id: Uuid,
        event: &webhook_event::Model,
        prior: &webhook_event::Model,
    ) -> Result<DeliveryReport, PersistenceError> {
        let stored = TranscriptRepository::new(self.db)
            .find_by_meeting(tenant_id, &event.external_meeting_id)
            .await?;

        let (transcript_id, church_id, call_id) = match stored {
            Some(stored) => (Some(stored.id), stored.church_id, stored.scheduled_call_id),
            None => (
                prior.transcript_id,
                prior.church_id.clone(),
                prior.scheduled_call_id,
            ),
        };

        Ok(DeliveryReport {
            event_id: event.id,
            outcome: DeliveryOutcome::Duplicate,
            transcript_id,
            call_id: church_id.as_ref().and(call_id),
            church_id,
            unmatched_meeting_id: None,
        })
    }

    async fn close(
        &self,
        events: &WebhookEventRepository<'_>,
        event_id: Uuid,
        outcome: DeliveryOutcome,
        report: DeliveryReport,
    ) -> Result<DeliveryReport, PipelineError> {
        events
            .mark_processed(
                event_id,
                outcome,
                EventCompletion {
                    church_id: report.church_id.clone(),
                    scheduled_call_id: report.call_id,
                    transcript_id: report.transcript_id,
                },
            )
            .await?;
        Ok(report)
    }

    fn notify(
        &self,
        tenant_id: Uuid,
        transcript: &Transcript,
        report: &DeliveryReport,
        reason: Option<UnmatchedReason>,
    ) {
        let kind = if report.matched() {
            NotificationKind::Matched
        } else {
            NotificationKind::Queued
        };

        self.notifier.dispatch(TranscriptNotification {
            event: kind,
            tenant_id,
            external_meeting_id: transcript.external_meeting_id.clone(),
            transcript_id: report.transcript_id,
            church_id: report.church_id.clone(),
            call_id: report.call_id,
            unmatched_meeting_id: report.unmatched_meeting_id,
            reason: reason
                .filter(|_| !report.matched())
                .map(|r| r.as_str().to_string()),
            source: "webhook",
            occurred_at: Utc::now(),
        });
    }
}
