//! Scheduled call repository

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::PersistenceResult;
use crate::matching::CandidateCall;
use crate::models::scheduled_call::{self, Entity as ScheduledCall};

/// Repository for ScheduledCall database operations
///
/// Generic over the connection so the manual match path can run it inside a transaction.
pub struct ScheduledCallRepository<'a, C = DatabaseConnection> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> ScheduledCallRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// A call owned by the given church, if it exists.
    pub async fn find_for_church(
        &self,
        tenant_id: Uuid,
        church_id: &str,
        call_id: Uuid,
    ) -> PersistenceResult<Option<scheduled_call::Model>> {
        Ok(ScheduledCall::find_by_id(call_id)
            .filter(scheduled_call::Column::TenantId.eq(tenant_id))
            .filter(scheduled_call::Column::ChurchId.eq(church_id))
            .one(self.db)
            .await?)
    }

    /// All of a church's calls, oldest first.
    pub async fn candidates_for_church(
        &self,
        tenant_id: Uuid,
        church_id: &str,
    ) -> PersistenceResult<Vec<CandidateCall>> {
        self.candidates(tenant_id, church_id, Condition::all()).await
    }

    /// The church's calls the temporal tier may pick for `external_meeting_id`.
    ///
    /// A call already carrying another meeting's transcript is not a candidate.
    pub async fn candidates_for_meeting(
        &self,
        tenant_id: Uuid,
        church_id: &str,
        external_meeting_id: &str,
    ) -> PersistenceResult<Vec<CandidateCall>> {
        let unclaimed = Condition::any()
            .add(scheduled_call::Column::ExternalMeetingId.is_null())
            .add(scheduled_call::Column::ExternalMeetingId.eq(external_meeting_id));
        self.candidates(tenant_id, church_id, unclaimed).await
    }

    async fn candidates(
        &self,
        tenant_id: Uuid,
        church_id: &str,
        condition: Condition,
    ) -> PersistenceResult<Vec<CandidateCall>> {
        let calls = ScheduledCall::find()
            .filter(scheduled_call::Column::TenantId.eq(tenant_id))
            .filter(scheduled_call::Column::ChurchId.eq(church_id))
            .filter(condition)
            .order_by_asc(scheduled_call::Column::ScheduledAt)
            .all(self.db)
            .await?;

        Ok(calls
            .into_iter()
            .map(|call| CandidateCall {
                id: call.id,
                call_type: call.call_type,
                scheduled_at: call.scheduled_at.with_timezone(&Utc),
                completed: call.completed,
            })
            .collect())
    }

    /// Create a call that already took place (manual match path).
    pub async fn create_completed(
        &self,
        tenant_id: Uuid,
        church_id: &str,
        call_type: &str,
        scheduled_at: DateTime<Utc>,
    ) -> PersistenceResult<scheduled_call::Model> {
        let now = Utc::now();
        let call = scheduled_call::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            church_id: Set(church_id.to_string()),
            call_type: Set(call_type.to_string()),
            scheduled_at: Set(scheduled_at.into()),
            completed: Set(true),
            completed_at: Set(Some(now.into())),
            calendar_event_id: Set(None),
            external_meeting_id: Set(None),
            transcript_url: Set(None),
            ai_summary: Set(None),
            action_items: Set(None),
            keywords: Set(None),
            transcript_linked_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        Ok(call.insert(self.db).await?)
    }

    /// Create an upcoming call (directory seeding).
    pub async fn create_scheduled(
        &self,
        tenant_id: Uuid,
        church_id: &str,
        call_type: &str,
        scheduled_at: DateTime<Utc>,
        calendar_event_id: Option<String>,
    ) -> PersistenceResult<scheduled_call::Model> {
        let now = Utc::now();
        let call = scheduled_call::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            church_id: Set(church_id.to_string()),
            call_type: Set(call_type.to_string()),
            scheduled_at: Set(scheduled_at.into()),
            completed: Set(false),
            completed_at: Set(None),
            calendar_event_id: Set(calendar_event_id),
            external_meeting_id: Set(None),
            transcript_url: Set(None),
            ai_summary: Set(None),
            action_items: Set(None),
            keywords: Set(None),
            transcript_linked_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        Ok(call.insert(self.db).await?)
    }
}
