//! Church contact entity model (leader and coach email directory)

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "church_contacts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    pub church_id: String,

    /// Lower-cased email address
    pub email: String,

    /// Contact role, e.g. "leader" or "coach"
    pub role: String,

    pub created_at: DateTimeWithTimeZone,
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
