//! UnmatchedMeeting entity model
//!
//! Review-queue entry for a transcript with no confident church match. The
//! `matched_*` columns stay null until an operator resolves the entry, which can
//! happen only once.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "unmatched_meetings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    pub external_meeting_id: String,

    /// Stored transcript saved alongside the queue entry, if any
    pub transcript_id: Option<Uuid>,

    pub title: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub participants: JsonValue,

    pub meeting_date: Option<DateTimeWithTimeZone>,

    pub transcript_url: Option<String>,

    /// Why the entry was queued, see [`crate::matching::UnmatchedReason`]
    pub reason: String,

    pub matched_church_id: Option<String>,

    pub matched_call_id: Option<Uuid>,

    pub matched_at: Option<DateTimeWithTimeZone>,

    pub matched_by: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn is_resolved(&self) -> bool {
        self.matched_at.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
