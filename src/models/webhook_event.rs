//! WebhookEvent entity model
//!
//! Append-only audit and idempotency ledger for inbound provider deliveries.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "webhook_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    pub external_meeting_id: String,

    /// Event type as declared by the provider (normalized)
    pub event_type: String,

    pub client_reference_id: Option<String>,

    /// Raw delivery payload
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub payload: Option<JsonValue>,

    pub processed: bool,

    /// Final pipeline outcome, see [`crate::pipeline::DeliveryOutcome`]
    pub outcome: Option<String>,

    pub error: Option<String>,

    pub church_id: Option<String>,

    pub scheduled_call_id: Option<Uuid>,

    pub transcript_id: Option<Uuid>,

    pub received_at: DateTimeWithTimeZone,

    pub processed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
