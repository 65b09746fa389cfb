//! Review queue repository
//!
//! Entries are created when matching produces no church and resolved at most once.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{PersistenceError, PersistenceResult, json_list};
use crate::error::is_unique_violation;
use crate::matching::UnmatchedReason;
use crate::models::Transcript;
use crate::models::unmatched_meeting::{self, Entity as UnmatchedMeeting};

/// Review queue filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Unresolved,
    Resolved,
    All,
}

/// Repository for UnmatchedMeeting database operations
pub struct UnmatchedMeetingRepository<'a, C = DatabaseConnection> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> UnmatchedMeetingRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn find(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> PersistenceResult<Option<unmatched_meeting::Model>> {
        Ok(UnmatchedMeeting::find_by_id(id)
            .filter(unmatched_meeting::Column::TenantId.eq(tenant_id))
            .one(self.db)
            .await?)
    }

    pub async fn find_by_meeting(
        &self,
        tenant_id: Uuid,
        external_meeting_id: &str,
    ) -> PersistenceResult<Option<unmatched_meeting::Model>> {
        Ok(UnmatchedMeeting::find()
            .filter(unmatched_meeting::Column::TenantId.eq(tenant_id))
            .filter(unmatched_meeting::Column::ExternalMeetingId.eq(external_meeting_id))
            .one(self.db)
            .await?)
    }

    /// Upsert a queue entry keyed by external meeting id.
    ///
    /// A resolved entry is returned untouched; resolution is never reopened.
    pub async fn save_unmatched_meeting(
        &self,
        tenant_id: Uuid,
        transcript: &Transcript,
        transcript_id: Option<Uuid>,
        reason: UnmatchedReason,
    ) -> PersistenceResult<unmatched_meeting::Model> {
        if let Some(existing) = self
            .find_by_meeting(tenant_id, &transcript.external_meeting_id)
            .await?
        {
            return self.refresh(existing, transcript, transcript_id, reason).await;
        }

        let now = Utc::now();
        let row = unmatched_meeting::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            external_meeting_id: Set(transcript.external_meeting_id.clone()),
            transcript_id: Set(transcript_id),
            title: Set(transcript.title.clone()),
            participants: Set(json_list(&transcript.participants)),
            meeting_date: Set(transcript.meeting_date.map(Into::into)),
            transcript_url: Set(transcript.transcript_url.clone()),
            reason: Set(reason.as_str().to_string()),
            matched_church_id: Set(None),
            matched_call_id: Set(None),
            matched_at: Set(None),
            matched_by: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        match row.insert(self.db).await {
            Ok(model) => Ok(model),
            Err(err) if is_unique_violation(&err) => {
                let existing = self
                    .find_by_meeting(tenant_id, &transcript.external_meeting_id)
                    .await?
                    .ok_or_else(|| {
                        PersistenceError::not_found(
                            "unmatched meeting",
                            &transcript.external_meeting_id,
                        )
                    })?;
                self.refresh(existing, transcript, transcript_id, reason).await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn refresh(
        &self,
        existing: unmatched_meeting::Model,
        transcript: &Transcript,
        transcript_id: Option<Uuid>,
        reason: UnmatchedReason,
    ) -> PersistenceResult<unmatched_meeting::Model> {
        if existing.is_resolved() {
            tracing::debug!(
                unmatched_meeting_id = %existing.id,
                "Queue entry already resolved; leaving it untouched"
            );
            return Ok(existing);
        }

        let mut active = existing.into_active_model();
        active.title = Set(transcript.title.clone());
        active.participants = Set(json_list(&transcript.participants));
        active.meeting_date = Set(transcript.meeting_date.map(Into::into));
        active.transcript_url = Set(transcript.transcript_url.clone());
        active.reason = Set(reason.as_str().to_string());
        if transcript_id.is_some() {
            active.transcript_id = Set(transcript_id);
        }
        active.updated_at = Set(Utc::now().into());

        Ok(active.update(self.db).await?)
    }

    /// Record the operator's resolution. Fails with `AlreadyResolved` on a second call.
    ///
    /// The update is conditional on `matched_at IS NULL`, so two concurrent
    /// resolutions cannot both succeed.
    pub async fn resolve_unmatched_meeting(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        church_id: &str,
        call_id: Option<Uuid>,
        resolved_by: &str,
    ) -> PersistenceResult<unmatched_meeting::Model> {
        let now = sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now());
        let result = UnmatchedMeeting::update_many()
            .col_expr(
                unmatched_meeting::Column::MatchedChurchId,
                Expr::value(Some(church_id.to_string())),
            )
            .col_expr(unmatched_meeting::Column::MatchedCallId, Expr::value(call_id))
            .col_expr(unmatched_meeting::Column::MatchedAt, Expr::value(Some(now)))
            .col_expr(
                unmatched_meeting::Column::MatchedBy,
                Expr::value(Some(resolved_by.to_string())),
            )
            .col_expr(unmatched_meeting::Column::UpdatedAt, Expr::value(now))
            .filter(unmatched_meeting::Column::Id.eq(id))
            .filter(unmatched_meeting::Column::TenantId.eq(tenant_id))
            .filter(unmatched_meeting::Column::MatchedAt.is_null())
            .exec(self.db)
            .await?;

        let current = self
            .find(tenant_id, id)
            .await?
            .ok_or_else(|| PersistenceError::not_found("unmatched meeting", id))?;

        if result.rows_affected == 0 {
            return Err(PersistenceError::AlreadyResolved { id });
        }

        tracing::info!(
            tenant_id = %tenant_id,
            unmatched_meeting_id = %id,
            church_id,
            resolved_by,
            "Unmatched meeting resolved"
        );
        Ok(current)
    }

    pub async fn list(
        &self,
        tenant_id: Uuid,
        status: ReviewStatus,
    ) -> PersistenceResult<Vec<unmatched_meeting::Model>> {
        let mut query =
            UnmatchedMeeting::find().filter(unmatched_meeting::Column::TenantId.eq(tenant_id));
        query = match status {
            ReviewStatus::Unresolved => query.filter(unmatched_meeting::Column::MatchedAt.is_null()),
            ReviewStatus::Resolved => {
                query.filter(unmatched_meeting::Column::MatchedAt.is_not_null())
            }
            ReviewStatus::All => query,
        };

        Ok(query
            .order_by_desc(unmatched_meeting::Column::CreatedAt)
            .order_by_asc(unmatched_meeting::Column::Id)
            .all(self.db)
            .await?)
    }
}
