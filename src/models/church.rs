//! Church entity model
//!
//! Churches are maintained by the onboarding workflow; the intake pipeline reads
//! them for title matching and validates manual-match targets against them.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "churches")]
pub struct Model {
    /// Stable church identifier (slug-like, e.g. "grace")
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub tenant_id: Uuid,

    /// Display name, matched case-insensitively against meeting titles
    pub name: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::church_contact::Entity")]
    Contacts,
    #[sea_orm(has_many = "super::scheduled_call::Entity")]
    ScheduledCalls,
}

impl Related<super::church_contact::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contacts.def()
    }
}

impl Related<super::scheduled_call::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScheduledCalls.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
