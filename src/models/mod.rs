//! # Data Models
//!
//! SeaORM entities for the intake tables plus the normalized transcript shape.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod church;
pub mod church_contact;
pub mod integration_settings;
pub mod scheduled_call;
pub mod stored_transcript;
pub mod transcript;
pub mod unmatched_meeting;
pub mod webhook_event;

pub use church::Entity as Church;
pub use church_contact::Entity as ChurchContact;
pub use integration_settings::Entity as IntegrationSettings;
pub use scheduled_call::Entity as ScheduledCall;
pub use stored_transcript::Entity as StoredTranscript;
pub use transcript::{Sentence, Transcript};
pub use unmatched_meeting::Entity as UnmatchedMeeting;
pub use webhook_event::Entity as WebhookEvent;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "transcript-intake".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
