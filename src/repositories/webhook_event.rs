//! Webhook event log repository
//!
//! Rows are inserted before any processing and closed exactly once afterwards.
//! Nothing here deletes.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use super::{PersistenceError, PersistenceResult};
use crate::models::webhook_event::{self, Entity as WebhookEvent};
use crate::pipeline::{DeliveryOutcome, TRANSCRIPTION_COMPLETED};

/// Fields captured when a delivery is first logged.
#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub tenant_id: Uuid,
    pub external_meeting_id: String,
    pub event_type: String,
    pub client_reference_id: Option<String>,
    pub payload: serde_json::Value,
}

/// Linkage recorded when a delivery completes.
#[derive(Debug, Clone, Default)]
pub struct EventCompletion {
    pub church_id: Option<String>,
    pub scheduled_call_id: Option<Uuid>,
    pub transcript_id: Option<Uuid>,
}

/// Repository for WebhookEvent database operations
pub struct WebhookEventRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> WebhookEventRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn record_received(&self, event: NewWebhookEvent) -> PersistenceResult<webhook_event::Model> {
        let row = webhook_event::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(event.tenant_id),
            external_meeting_id: Set(event.external_meeting_id),
            event_type: Set(event.event_type),
            client_reference_id: Set(event.client_reference_id),
            payload: Set(Some(event.payload)),
            processed: Set(false),
            outcome: Set(None),
            error: Set(None),
            church_id: Set(None),
            scheduled_call_id: Set(None),
            transcript_id: Set(None),
            received_at: Set(Utc::now().into()),
            processed_at: Set(None),
        };

        Ok(row.insert(self.db).await?)
    }

    /// Close the event as processed with its final outcome and linkage.
    pub async fn mark_processed(
        &self,
        id: Uuid,
        outcome: DeliveryOutcome,
        completion: EventCompletion,
    ) -> PersistenceResult<webhook_event::Model> {
        let mut active = self.get(id).await?.into_active_model();

        active.processed = Set(true);
        active.outcome = Set(Some(outcome.as_str().to_string()));
        active.error = Set(None);
        active.church_id = Set(completion.church_id);
        active.scheduled_call_id = Set(completion.scheduled_call_id);
        active.transcript_id = Set(completion.transcript_id);
        active.processed_at = Set(Some(Utc::now().into()));

        Ok(active.update(self.db).await?)
    }

    /// Close the event as failed; `processed` stays false so the delivery is visibly incomplete.
    pub async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
    ) -> PersistenceResult<webhook_event::Model> {
        let mut active = self.get(id).await?.into_active_model();

        active.processed = Set(false);
        active.outcome = Set(Some(DeliveryOutcome::Failed.as_str().to_string()));
        active.error = Set(Some(error.to_string()));
        active.processed_at = Set(Some(Utc::now().into()));

        Ok(active.update(self.db).await?)
    }

    /// Most recent completed transcription event for a meeting, if any.
    pub async fn find_completed_for_meeting(
        &self,
        tenant_id: Uuid,
        external_meeting_id: &str,
    ) -> PersistenceResult<Option<webhook_event::Model>> {
        Ok(WebhookEvent::find()
            .filter(webhook_event::Column::TenantId.eq(tenant_id))
            .filter(webhook_event::Column::ExternalMeetingId.eq(external_meeting_id))
            .filter(webhook_event::Column::EventType.eq(TRANSCRIPTION_COMPLETED))
            .filter(webhook_event::Column::Processed.eq(true))
            .filter(webhook_event::Column::Outcome.is_in([
                DeliveryOutcome::Matched.as_str(),
                DeliveryOutcome::Queued.as_str(),
            ]))
            .order_by_desc(webhook_event::Column::ReceivedAt)
            .one(self.db)
            .await?)
    }

    /// Newest-first event log, optionally narrowed to one meeting.
    pub async fn list(
        &self,
        tenant_id: Uuid,
        external_meeting_id: Option<&str>,
        limit: u64,
    ) -> PersistenceResult<Vec<webhook_event::Model>> {
        let mut query = WebhookEvent::find().filter(webhook_event::Column::TenantId.eq(tenant_id));
        if let Some(meeting_id) = external_meeting_id {
            query = query.filter(webhook_event::Column::ExternalMeetingId.eq(meeting_id));
        }

        Ok(query
            .order_by_desc(webhook_event::Column::ReceivedAt)
            .order_by_desc(webhook_event::Column::Id)
            .limit(limit)
            .all(self.db)
            .await?)
    }

    async fn get(&self, id: Uuid) -> PersistenceResult<webhook_event::Model> {
        WebhookEvent::find_by_id(id)
            .one(self.db)
            .await?
            .ok_or_else(|| PersistenceError::not_found("webhook event", id))
    }
}
