//! IntegrationSettings entity model
//!
//! One row per tenant holding the transcription provider credentials (encrypted)
//! and the two independent pipeline switches.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "integration_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning tenant (unique)
    pub tenant_id: Uuid,

    /// AES-GCM encrypted provider API key
    pub api_key_ciphertext: Option<Vec<u8>>,

    /// AES-GCM encrypted webhook signing secret
    pub webhook_secret_ciphertext: Option<Vec<u8>>,

    /// When false, deliveries are logged but nothing is fetched
    pub auto_process_enabled: bool,

    /// When false, fetched transcripts always go to the review queue
    pub auto_match_enabled: bool,

    pub connected_at: Option<DateTimeWithTimeZone>,

    /// Liveness marker, bumped on every authenticated delivery
    pub last_webhook_received_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
