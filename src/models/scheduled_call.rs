//! ScheduledCall entity model
//!
//! A planned or completed coaching call for one church. The transcript columns
//! are written by the intake pipeline when a transcript is linked.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "scheduled_calls")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    pub church_id: String,

    /// Call type label, e.g. "discovery" or "coaching"
    pub call_type: String,

    pub scheduled_at: DateTimeWithTimeZone,

    pub completed: bool,

    pub completed_at: Option<DateTimeWithTimeZone>,

    /// Optional external calendar event reference
    pub calendar_event_id: Option<String>,

    /// Provider meeting id of the linked transcript
    pub external_meeting_id: Option<String>,

    pub transcript_url: Option<String>,

    pub ai_summary: Option<String>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub action_items: Option<JsonValue>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub keywords: Option<JsonValue>,

    pub transcript_linked_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::church::Entity",
        from = "Column::ChurchId",
        to = "super::church::Column::Id"
    )]
    Church,
}

impl Related<super::church::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Church.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
