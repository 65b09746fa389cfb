//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations for the intake
//! tables. Every method is tenant-scoped, and the write paths the pipeline relies on
//! are upserts keyed by `(tenant_id, external_meeting_id)`, so a re-delivered
//! webhook converges instead of duplicating rows.

use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

use crate::crypto::CryptoError;

pub mod directory;
pub mod scheduled_call;
pub mod settings;
pub mod transcript;
pub mod unmatched_meeting;
pub mod webhook_event;

pub use directory::DirectoryRepository;
pub use scheduled_call::ScheduledCallRepository;
pub use settings::{SettingsRepository, SettingsUpdate};
pub use transcript::{CallLink, TranscriptLink, TranscriptRepository};
pub use unmatched_meeting::{ReviewStatus, UnmatchedMeetingRepository};
pub use webhook_event::{EventCompletion, NewWebhookEvent, WebhookEventRepository};

/// Failures of the persistence layer.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("unmatched meeting {id} is already resolved")]
    AlreadyResolved { id: Uuid },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("secret encryption failed: {0}")]
    Crypto(#[from] CryptoError),
}

impl PersistenceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        PersistenceError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

fn json_list(items: &[String]) -> serde_json::Value {
    serde_json::Value::Array(
        items
            .iter()
            .cloned()
            .map(serde_json::Value::String)
            .collect(),
    )
}
