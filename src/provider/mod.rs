//! Transcription provider integration
//!
//! The fetcher fetches one transcript by meeting id and classifies every failure so
//! the orchestrator can tell terminal outcomes (not found, not ready) apart from
//! transient ones. There is no retry loop here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::Transcript;

mod graphql;
mod normalize;

pub use graphql::GraphqlTranscriptClient;
pub use normalize::{RawTranscript, normalize_transcript};

/// Identifier recorded in logs, metrics and provider error details.
pub const PROVIDER_NAME: &str = "fireflies";

/// Failure modes of a single provider fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transcription provider API key is not configured")]
    MissingApiKey,

    #[error("meeting {meeting_id} was not found at the provider")]
    NotFound { meeting_id: String },

    #[error("transcript for meeting {meeting_id} is not ready yet")]
    NotReady { meeting_id: String },

    #[error("provider rejected the API key (status {status})")]
    Unauthorized { status: u16 },

    #[error("provider rate limited the request")]
    RateLimited { retry_after: Option<u64> },

    #[error("provider returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("provider request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("network error talking to provider: {0}")]
    Network(#[source] reqwest::Error),

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Stable label used as metric tag and in error details.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::MissingApiKey => "missing_api_key",
            FetchError::NotFound { .. } => "not_found",
            FetchError::NotReady { .. } => "not_ready",
            FetchError::Unauthorized { .. } => "unauthorized",
            FetchError::RateLimited { .. } => "rate_limited",
            FetchError::Upstream { .. } => "upstream",
            FetchError::Timeout { .. } => "timeout",
            FetchError::Network(_) => "network",
            FetchError::Malformed(_) => "malformed",
        }
    }

    /// Whether a caller may retry the same fetch later and expect a different result.
    ///
    /// Not-found and not-ready are terminal for the current attempt, as are
    /// credential problems that need an operator.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited { .. }
                | FetchError::Upstream { .. }
                | FetchError::Timeout { .. }
                | FetchError::Network(_)
        )
    }

    /// HTTP status returned by the provider, when the failure carried one.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            FetchError::Unauthorized { status } | FetchError::Upstream { status, .. } => {
                Some(*status)
            }
            FetchError::RateLimited { .. } => Some(429),
            FetchError::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}

/// Account behind an API key, as reported by the provider's connection test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAccount {
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Seam between the pipeline and the transcription vendor.
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    /// Fetches and normalizes the transcript for `meeting_id`.
    async fn fetch(&self, api_key: &str, meeting_id: &str) -> Result<Transcript, FetchError>;

    /// Validates an API key without fetching any transcript.
    async fn test_connection(&self, api_key: &str) -> Result<ProviderAccount, FetchError>;
}
