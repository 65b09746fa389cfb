//! Normalized transcript shape shared by the fetcher, matcher and persistence layer.
//!
//! Provider-native field names never leave [`crate::provider`]; everything past the
//! fetcher works with these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A completed call as returned by the transcription provider.
///
/// A fetched transcript is immutable. Fetching again yields a new instance that
/// replaces the stored one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub external_meeting_id: String,
    pub title: String,
    /// Participant identifiers as supplied by the provider (names or emails)
    pub participants: Vec<String>,
    pub meeting_date: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub transcript_url: Option<String>,
    pub sentences: Vec<Sentence>,
    pub summary: Option<String>,
    pub action_items: Vec<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Sentence {
    pub index: i64,
    pub speaker: String,
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
}

impl Transcript {
    /// Participant identifiers that look like email addresses, lower-cased.
    ///
    /// `"Jane Doe <jane@grace.org>"` yields `jane@grace.org`; bare display names
    /// are dropped.
    pub fn participant_emails(&self) -> Vec<String> {
        let mut emails: Vec<String> = Vec::new();
        for participant in &self.participants {
            if let Some(email) = extract_email(participant)
                && !emails.contains(&email)
            {
                emails.push(email);
            }
        }
        emails
    }
}

fn extract_email(identifier: &str) -> Option<String> {
    let candidate = match (identifier.find('<'), identifier.rfind('>')) {
        (Some(open), Some(close)) if open < close => &identifier[open + 1..close],
        _ => identifier,
    };
    let candidate = candidate.trim().trim_start_matches("mailto:");

    let (local, domain) = candidate.split_once('@')?;
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return None;
    }
    if candidate.chars().any(char::is_whitespace) {
        return None;
    }
    Some(candidate.to_lowercase())
}
