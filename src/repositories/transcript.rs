//! Stored transcript repository
//!
//! `save_transcript` and `link_transcript_to_call` are the two writes shared by the
//! automatic pipeline and the manual match path, so a manually resolved transcript is
//! stored exactly like an automatically matched one.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, Set,
};
use uuid::Uuid;

use super::{PersistenceError, PersistenceResult, json_list};
use crate::error::is_unique_violation;
use crate::models::Transcript;
use crate::models::scheduled_call::{self, Entity as ScheduledCall};
use crate::models::stored_transcript::{self, Entity as StoredTranscript};

/// Church/call association to record with a saved transcript.
///
/// A `None` church keeps the stored association. A new church always brings its own
/// call (possibly none); within the same church a `None` call keeps the stored one.
#[derive(Debug, Clone, Default)]
pub struct TranscriptLink {
    pub church_id: Option<String>,
    pub scheduled_call_id: Option<Uuid>,
}

/// Transcript-derived fields written onto a scheduled call.
#[derive(Debug, Clone)]
pub struct CallLink<'t> {
    pub external_meeting_id: &'t str,
    pub transcript_url: Option<&'t str>,
    pub summary: Option<&'t str>,
    pub action_items: &'t [String],
    pub keywords: &'t [String],
}

impl<'t> CallLink<'t> {
    pub fn from_transcript(transcript: &'t Transcript) -> Self {
        Self {
            external_meeting_id: &transcript.external_meeting_id,
            transcript_url: transcript.transcript_url.as_deref(),
            summary: transcript.summary.as_deref(),
            action_items: &transcript.action_items,
            keywords: &transcript.keywords,
        }
    }
}

/// Repository for StoredTranscript database operations
pub struct TranscriptRepository<'a, C = DatabaseConnection> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> TranscriptRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn find_by_meeting(
        &self,
        tenant_id: Uuid,
        external_meeting_id: &str,
    ) -> PersistenceResult<Option<stored_transcript::Model>> {
        Ok(StoredTranscript::find()
            .filter(stored_transcript::Column::TenantId.eq(tenant_id))
            .filter(stored_transcript::Column::ExternalMeetingId.eq(external_meeting_id))
            .one(self.db)
            .await?)
    }

    /// Upsert a fetched transcript keyed by its external meeting id.
    ///
    /// An existing row has its content replaced by the new fetch; it is never merged.
    pub async fn save_transcript(
        &self,
        tenant_id: Uuid,
        transcript: &Transcript,
        link: TranscriptLink,
    ) -> PersistenceResult<stored_transcript::Model> {
        if let Some(existing) = self
            .find_by_meeting(tenant_id, &transcript.external_meeting_id)
            .await?
        {
            return self.replace_content(existing, transcript, link).await;
        }

        let now = Utc::now();
        let row = stored_transcript::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            external_meeting_id: Set(transcript.external_meeting_id.clone()),
            title: Set(transcript.title.clone()),
            participants: Set(json_list(&transcript.participants)),
            meeting_date: Set(transcript.meeting_date.map(Into::into)),
            duration_seconds: Set(transcript.duration_seconds),
            transcript_url: Set(transcript.transcript_url.clone()),
            sentences: Set(serde_json::to_value(&transcript.sentences)
                .unwrap_or(serde_json::Value::Array(Vec::new()))),
            summary: Set(transcript.summary.clone()),
            action_items: Set(json_list(&transcript.action_items)),
            keywords: Set(json_list(&transcript.keywords)),
            church_id: Set(link.church_id.clone()),
            scheduled_call_id: Set(link.scheduled_call_id),
            visible_to_church: Set(false),
            approved: Set(false),
            fetched_at: Set(now.into()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        match row.insert(self.db).await {
            Ok(model) => Ok(model),
            Err(err) if is_unique_violation(&err) => {
                // A concurrent delivery inserted first; converge onto its row.
                let existing = self
                    .find_by_meeting(tenant_id, &transcript.external_meeting_id)
                    .await?
                    .ok_or_else(|| {
                        PersistenceError::not_found("transcript", &transcript.external_meeting_id)
                    })?;
                self.replace_content(existing, transcript, link).await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn replace_content(
        &self,
        existing: stored_transcript::Model,
        transcript: &Transcript,
        link: TranscriptLink,
    ) -> PersistenceResult<stored_transcript::Model> {
        let tenant_id = existing.tenant_id;
        let previous_call = existing.scheduled_call_id;
        let church_changed = link
            .church_id
            .as_ref()
            .is_some_and(|church_id| existing.church_id.as_ref() != Some(church_id));

        let mut active = existing.into_active_model();
        let now = Utc::now();

        active.title = Set(transcript.title.clone());
        active.participants = Set(json_list(&transcript.participants));
        active.meeting_date = Set(transcript.meeting_date.map(Into::into));
        active.duration_seconds = Set(transcript.duration_seconds);
        active.transcript_url = Set(transcript.transcript_url.clone());
        active.sentences = Set(serde_json::to_value(&transcript.sentences)
            .unwrap_or(serde_json::Value::Array(Vec::new())));
        active.summary = Set(transcript.summary.clone());
        active.action_items = Set(json_list(&transcript.action_items));
        active.keywords = Set(json_list(&transcript.keywords));
        if church_changed {
            active.church_id = Set(link.church_id);
            active.scheduled_call_id = Set(link.scheduled_call_id);
        } else if let Some(call_id) = link.scheduled_call_id {
            active.scheduled_call_id = Set(Some(call_id));
        }
        active.fetched_at = Set(now.into());
        active.updated_at = Set(now.into());

        let updated = active.update(self.db).await?;

        if let Some(previous) = previous_call.filter(|id| updated.scheduled_call_id != Some(*id)) {
            self.release_call(tenant_id, previous, &updated.external_meeting_id)
                .await?;
        }
        Ok(updated)
    }

    /// Clear transcript fields from a call this meeting no longer belongs to.
    async fn release_call(
        &self,
        tenant_id: Uuid,
        call_id: Uuid,
        external_meeting_id: &str,
    ) -> PersistenceResult<()> {
        let result = ScheduledCall::update_many()
            .col_expr(scheduled_call::Column::ExternalMeetingId, Expr::value(None::<String>))
            .col_expr(scheduled_call::Column::TranscriptUrl, Expr::value(None::<String>))
            .col_expr(scheduled_call::Column::AiSummary, Expr::value(None::<String>))
            .col_expr(
                scheduled_call::Column::ActionItems,
                Expr::value(None::<serde_json::Value>),
            )
            .col_expr(
                scheduled_call::Column::Keywords,
                Expr::value(None::<serde_json::Value>),
            )
            .col_expr(
                scheduled_call::Column::TranscriptLinkedAt,
                Expr::value(None::<sea_orm::prelude::DateTimeWithTimeZone>),
            )
            .col_expr(
                scheduled_call::Column::UpdatedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(scheduled_call::Column::Id.eq(call_id))
            .filter(scheduled_call::Column::TenantId.eq(tenant_id))
            .filter(scheduled_call::Column::ExternalMeetingId.eq(external_meeting_id))
            .exec(self.db)
            .await?;

        if result.rows_affected > 0 {
            tracing::info!(
                tenant_id = %tenant_id,
                call_id = %call_id,
                meeting_id = external_meeting_id,
                "Released scheduled call from re-matched transcript"
            );
        }
        Ok(())
    }

    /// Write transcript-derived fields onto a scheduled call and mark it completed.
    ///
    /// Re-linking the same meeting leaves the row unchanged apart from content. Taking
    /// over a call from another meeting detaches that meeting's stored transcript, so a
    /// call is never referenced by two transcripts.
    pub async fn link_transcript_to_call(
        &self,
        tenant_id: Uuid,
        call_id: Uuid,
        link: CallLink<'_>,
    ) -> PersistenceResult<scheduled_call::Model> {
        let call = ScheduledCall::find_by_id(call_id)
            .filter(scheduled_call::Column::TenantId.eq(tenant_id))
            .one(self.db)
            .await?
            .ok_or_else(|| PersistenceError::not_found("scheduled call", call_id))?;

        let relinking_same_meeting =
            call.external_meeting_id.as_deref() == Some(link.external_meeting_id);
        if let Some(previous) = call
            .external_meeting_id
            .as_deref()
            .filter(|_| !relinking_same_meeting)
        {
            tracing::warn!(
                tenant_id = %tenant_id,
                call_id = %call_id,
                previous_meeting_id = previous,
                meeting_id = link.external_meeting_id,
                "Scheduled call already carried another transcript; replacing link"
            );
            StoredTranscript::update_many()
                .col_expr(
                    stored_transcript::Column::ScheduledCallId,
                    Expr::value(None::<Uuid>),
                )
                .filter(stored_transcript::Column::TenantId.eq(tenant_id))
                .filter(stored_transcript::Column::ExternalMeetingId.eq(previous))
                .filter(stored_transcript::Column::ScheduledCallId.eq(call_id))
                .exec(self.db)
                .await?;
        }

        let now = Utc::now();
        let completed_at = call.completed_at.unwrap_or_else(|| now.into());
        let linked_at = match call.transcript_linked_at {
            Some(at) if relinking_same_meeting => at,
            _ => now.into(),
        };
        let mut active = call.into_active_model();

        active.external_meeting_id = Set(Some(link.external_meeting_id.to_string()));
        active.transcript_url = Set(link.transcript_url.map(str::to_string));
        active.ai_summary = Set(link.summary.map(str::to_string));
        active.action_items = Set(Some(json_list(link.action_items)));
        active.keywords = Set(Some(json_list(link.keywords)));
        active.completed = Set(true);
        active.completed_at = Set(Some(completed_at));
        active.transcript_linked_at = Set(Some(linked_at));
        active.updated_at = Set(now.into());

        Ok(active.update(self.db).await?)
    }
}
