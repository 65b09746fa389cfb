//! StoredTranscript entity model
//!
//! Persisted form of a fetched [`super::transcript::Transcript`]. Only the linkage
//! and visibility/approval columns change after a fetch is written.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transcripts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    /// Provider meeting id (unique per tenant)
    pub external_meeting_id: String,

    pub title: String,

    /// Participant identifiers as supplied by the provider
    #[sea_orm(column_type = "JsonBinary")]
    pub participants: JsonValue,

    pub meeting_date: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "Double", nullable)]
    pub duration_seconds: Option<f64>,

    pub transcript_url: Option<String>,

    #[sea_orm(column_type = "JsonBinary")]
    pub sentences: JsonValue,

    pub summary: Option<String>,

    #[sea_orm(column_type = "JsonBinary")]
    pub action_items: JsonValue,

    #[sea_orm(column_type = "JsonBinary")]
    pub keywords: JsonValue,

    pub church_id: Option<String>,

    pub scheduled_call_id: Option<Uuid>,

    pub visible_to_church: bool,

    pub approved: bool,

    pub fetched_at: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::scheduled_call::Entity",
        from = "Column::ScheduledCallId",
        to = "super::scheduled_call::Column::Id"
    )]
    ScheduledCall,
}

impl Related<super::scheduled_call::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScheduledCall.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
