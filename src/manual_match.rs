//! # Manual match
//!
//! Operator resolution of a queued meeting. The transcript is fetched fresh from the
//! provider and written through the same persistence operations as the webhook path,
//! so a manually resolved transcript is stored exactly like an automatic match.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::crypto::CryptoKey;
use crate::error::ApiError;
use crate::notifications::{NotificationKind, Notifier, TranscriptNotification};
use crate::provider::{FetchError, TranscriptProvider};
use crate::repositories::{
    CallLink, DirectoryRepository, PersistenceError, ScheduledCallRepository, SettingsRepository,
    TranscriptLink, TranscriptRepository, UnmatchedMeetingRepository,
};
use crate::server::AppState;

const DEFAULT_MATCHED_BY: &str = "operator";

/// Request body for `POST /transcripts/manual-match`
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManualMatchRequest {
    pub unmatched_meeting_id: Uuid,
    pub church_id: String,
    /// Existing call of the church to link
    #[serde(default)]
    pub call_id: Option<Uuid>,
    /// Create a completed call instead of linking an existing one
    #[serde(default)]
    pub create_call: Option<CreateCallRequest>,
    /// Recorded on the resolution; defaults to `operator`
    #[serde(default)]
    pub matched_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCallRequest {
    pub call_type: String,
    pub scheduled_at: DateTime<Utc>,
}

/// Response body for a successful manual match
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManualMatchResponse {
    pub success: bool,
    pub transcript_id: Uuid,
    pub call_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ManualMatchError {
    #[error("callId and createCall are mutually exclusive")]
    ConflictingCallTarget,

    #[error("createCall.callType must not be empty")]
    EmptyCallType,

    #[error("unmatched meeting {0} not found")]
    UnmatchedMeetingNotFound(Uuid),

    #[error("church {0} not found")]
    ChurchNotFound(String),

    #[error("call {call_id} not found for church {church_id}")]
    CallNotFound { church_id: String, call_id: Uuid },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<ManualMatchError> for ApiError {
    fn from(err: ManualMatchError) -> Self {
        match err {
            ManualMatchError::ConflictingCallTarget | ManualMatchError::EmptyCallType => {
                ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", err.to_string())
            }
            ManualMatchError::UnmatchedMeetingNotFound(_)
            | ManualMatchError::ChurchNotFound(_)
            | ManualMatchError::CallNotFound { .. } => {
                ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
            }
            ManualMatchError::Fetch(fetch) => fetch.into(),
            ManualMatchError::Persistence(persistence) => persistence.into(),
        }
    }
}

/// Manual resolution service over shared application state.
pub struct ManualMatcher<'a> {
    db: &'a DatabaseConnection,
    crypto_key: &'a CryptoKey,
    provider: &'a dyn TranscriptProvider,
    notifier: &'a Notifier,
}

impl<'a> ManualMatcher<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            db: &state.db,
            crypto_key: &state.crypto_key,
            provider: state.provider.as_ref(),
            notifier: &state.notifier,
        }
    }

    /// Validate, fetch, then resolve, persist and link in one transaction.
    ///
    /// Every check and the provider fetch run before the first write, and an
    /// `AlreadyResolved` from the conditional resolve rolls back the requested call,
    /// so a rejected or failed request leaves nothing behind.
    pub async fn resolve(
        &self,
        tenant_id: Uuid,
        request: ManualMatchRequest,
    ) -> Result<ManualMatchResponse, ManualMatchError> {
        if request.call_id.is_some() && request.create_call.is_some() {
            return Err(ManualMatchError::ConflictingCallTarget);
        }
        if let Some(create) = &request.create_call
            && create.call_type.trim().is_empty()
        {
            return Err(ManualMatchError::EmptyCallType);
        }

        let unmatched_repo = UnmatchedMeetingRepository::new(self.db);
        let unmatched = unmatched_repo
            .find(tenant_id, request.unmatched_meeting_id)
            .await?
            .ok_or(ManualMatchError::UnmatchedMeetingNotFound(
                request.unmatched_meeting_id,
            ))?;
        if unmatched.is_resolved() {
            return Err(PersistenceError::AlreadyResolved { id: unmatched.id }.into());
        }

        DirectoryRepository::new(self.db)
            .find_church(tenant_id, &request.church_id)
            .await?
            .ok_or_else(|| ManualMatchError::ChurchNotFound(request.church_id.clone()))?;

        let calls = ScheduledCallRepository::new(self.db);
        if let Some(call_id) = request.call_id {
            calls
                .find_for_church(tenant_id, &request.church_id, call_id)
                .await?
                .ok_or_else(|| ManualMatchError::CallNotFound {
                    church_id: request.church_id.clone(),
                    call_id,
                })?;
        }

        let settings_repo = SettingsRepository::new(self.db, self.crypto_key);
        let settings = settings_repo
            .find(tenant_id)
            .await?
            .ok_or(FetchError::MissingApiKey)?;
        let api_key = settings_repo
            .api_key(&settings)?
            .ok_or(FetchError::MissingApiKey)?;

        let transcript = self
            .provider
            .fetch(&api_key, &unmatched.external_meeting_id)
            .await?;

        let matched_by = request
            .matched_by
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_MATCHED_BY);

        // The resolution is claimed inside the same transaction as the writes, so a
        // request that loses a race to another operator rolls back everything it did.
        let txn = self.db.begin().await.map_err(PersistenceError::from)?;

        let call_id = match (&request.create_call, request.call_id) {
            (Some(create), _) => Some(
                ScheduledCallRepository::new(&txn)
                    .create_completed(
                        tenant_id,
                        &request.church_id,
                        create.call_type.trim(),
                        create.scheduled_at,
                    )
                    .await?
                    .id,
            ),
            (None, call_id) => call_id,
        };

        UnmatchedMeetingRepository::new(&txn)
            .resolve_unmatched_meeting(
                tenant_id,
                unmatched.id,
                &request.church_id,
                call_id,
                matched_by,
            )
            .await?;

        let transcripts = TranscriptRepository::new(&txn);
        let stored = transcripts
            .save_transcript(
                tenant_id,
                &transcript,
                TranscriptLink {
                    church_id: Some(request.church_id.clone()),
                    scheduled_call_id: call_id,
                },
            )
            .await?;

        if let Some(call_id) = call_id {
            transcripts
                .link_transcript_to_call(tenant_id, call_id, CallLink::from_transcript(&transcript))
                .await?;
        }

        txn.commit().await.map_err(PersistenceError::from)?;

        info!(
            tenant_id = %tenant_id,
            unmatched_meeting_id = %unmatched.id,
            meeting_id = %unmatched.external_meeting_id,
            church_id = %request.church_id,
            call_id = ?call_id,
            matched_by,
            "Unmatched meeting resolved manually"
        );

        self.notifier.dispatch(TranscriptNotification {
            event: NotificationKind::Matched,
            tenant_id,
            external_meeting_id: unmatched.external_meeting_id.clone(),
            transcript_id: Some(stored.id),
            church_id: Some(request.church_id.clone()),
            call_id,
            unmatched_meeting_id: Some(unmatched.id),
            reason: None,
            source: "manual",
            occurred_at: Utc::now(),
        });

        let message = match call_id {
            Some(_) => format!("Transcript linked to church {} and call", request.church_id),
            None => format!("Transcript linked to church {}", request.church_id),
        };

        Ok(ManualMatchResponse {
            success: true,
            transcript_id: stored.id,
            call_id,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_deserializes_create_call() {
        let request: ManualMatchRequest = serde_json::from_value(serde_json::json!({
            "unmatchedMeetingId": "7a0b7a9e-2f4e-4b58-8d4a-3f2b9f0c1d11",
            "churchId": "grace",
            "createCall": {"callType": "discovery", "scheduledAt": "2026-01-01T10:00:00Z"}
        }))
        .unwrap();

        assert_eq!(request.church_id, "grace");
        assert!(request.call_id.is_none());
        assert_eq!(request.create_call.unwrap().call_type, "discovery");
    }

    #[test]
    fn errors_map_to_statuses() {
        let cases: Vec<(ManualMatchError, StatusCode, &str)> = vec![
            (
                ManualMatchError::ConflictingCallTarget,
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED",
            ),
            (
                ManualMatchError::ChurchNotFound("nope".into()),
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
            ),
            (
                PersistenceError::AlreadyResolved { id: Uuid::nil() }.into(),
                StatusCode::CONFLICT,
                "ALREADY_RESOLVED",
            ),
            (
                FetchError::MissingApiKey.into(),
                StatusCode::CONFLICT,
                "NOT_CONNECTED",
            ),
        ];

        for (err, status, code) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status, status);
            assert_eq!(&*api.code, code);
        }
    }
}
