//! Provider payload → [`Transcript`] normalization.
//!
//! This is the only place provider-native field names are interpreted.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::FetchError;
use crate::models::{Sentence, Transcript};

/// Transcript object as returned by the provider's GraphQL API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTranscript {
    pub id: Option<String>,
    pub title: Option<String>,
    /// Epoch milliseconds, sent as a number or a numeric string
    pub date: Option<serde_json::Value>,
    /// Minutes
    pub duration: Option<f64>,
    pub transcript_url: Option<String>,
    pub organizer_email: Option<String>,
    pub participants: Option<Vec<String>>,
    pub meeting_attendees: Option<Vec<RawAttendee>>,
    pub sentences: Option<Vec<RawSentence>>,
    pub summary: Option<RawSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAttendee {
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSentence {
    pub index: Option<i64>,
    pub speaker_name: Option<String>,
    pub text: Option<String>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSummary {
    pub overview: Option<String>,
    pub shorthand_bullet: Option<String>,
    /// Free-text block, one item per line with optional `**Owner**` headers
    pub action_items: Option<String>,
    pub keywords: Option<Vec<String>>,
}

/// Converts a provider transcript into the internal shape.
///
/// A transcript with neither sentences nor a summary is still being processed by
/// the provider and is reported as [`FetchError::NotReady`].
pub fn normalize_transcript(raw: RawTranscript, meeting_id: &str) -> Result<Transcript, FetchError> {
    let sentences: Vec<Sentence> = raw
        .sentences
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(position, s)| Sentence {
            index: s.index.unwrap_or(position as i64),
            speaker: s
                .speaker_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            text: s.text.unwrap_or_default(),
            start_time: s.start_time.unwrap_or(0.0),
            end_time: s.end_time.unwrap_or(0.0),
        })
        .collect();

    let summary_block = raw.summary.unwrap_or_default();
    let summary_parts: Vec<String> = [summary_block.overview, summary_block.shorthand_bullet]
        .into_iter()
        .flatten()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect();
    let summary = (!summary_parts.is_empty()).then(|| summary_parts.join("\n\n"));

    if sentences.is_empty() && summary.is_none() {
        return Err(FetchError::NotReady {
            meeting_id: meeting_id.to_string(),
        });
    }

    let mut participants = Vec::new();
    let attendee_emails = raw
        .meeting_attendees
        .unwrap_or_default()
        .into_iter()
        .filter_map(|attendee| attendee.email.or(attendee.display_name));
    for identifier in raw
        .participants
        .unwrap_or_default()
        .into_iter()
        .flat_map(|p| split_participant_field(&p))
        .chain(attendee_emails)
        .chain(raw.organizer_email)
    {
        let normalized = normalize_identifier(&identifier);
        if !normalized.is_empty() && !participants.contains(&normalized) {
            participants.push(normalized);
        }
    }

    Ok(Transcript {
        external_meeting_id: raw.id.unwrap_or_else(|| meeting_id.to_string()),
        title: raw
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string()),
        participants,
        meeting_date: raw.date.as_ref().and_then(epoch_ms_to_datetime),
        duration_seconds: raw.duration.map(|minutes| minutes * 60.0),
        transcript_url: raw.transcript_url.filter(|url| !url.is_empty()),
        sentences,
        summary,
        action_items: summary_block
            .action_items
            .as_deref()
            .map(parse_action_items)
            .unwrap_or_default(),
        keywords: summary_block
            .keywords
            .unwrap_or_default()
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
    })
}

fn epoch_ms_to_datetime(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    let ms = value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))?;
    DateTime::from_timestamp_millis(ms)
}

// The provider sometimes packs several addresses into one comma-separated entry.
fn split_participant_field(field: &str) -> Vec<String> {
    let parts: Vec<&str> = field.split(',').map(str::trim).collect();
    if parts.len() > 1 && parts.iter().all(|p| p.contains('@')) {
        parts.into_iter().map(str::to_string).collect()
    } else {
        vec![field.trim().to_string()]
    }
}

/// Emails (including `Name <email>` and `mailto:` forms) become the bare lower-cased
/// address; display names are only trimmed.
fn normalize_identifier(identifier: &str) -> String {
    let trimmed = identifier.trim();
    let candidate = match (trimmed.find('<'), trimmed.rfind('>')) {
        (Some(open), Some(close)) if open < close => &trimmed[open + 1..close],
        _ => trimmed,
    };
    let candidate = candidate.trim().trim_start_matches("mailto:");
    if candidate.contains('@') && !candidate.chars().any(char::is_whitespace) {
        candidate.to_lowercase()
    } else {
        trimmed.to_string()
    }
}

fn parse_action_items(block: &str) -> Vec<String> {
    block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !(line.starts_with("**") && line.ends_with("**")))
        .map(|line| {
            line.trim_start_matches(['-', '•', '*'])
                .trim()
                .to_string()
        })
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn raw_from(value: serde_json::Value) -> RawTranscript {
        serde_json::from_value(value).expect("valid raw transcript")
    }

    #[test]
    fn normalizes_provider_fields() {
        let raw = raw_from(json!({
            "id": "m-1",
            "title": "  Grace Church — Discovery Call ",
            "date": 1767261600000i64,
            "duration": 45.5,
            "transcript_url": "https://app.fireflies.ai/view/m-1",
            "organizer_email": "Coach@Network.org",
            "participants": ["Pastor@Grace.org, elder@grace.org", "Jane Doe <jane@grace.org>"],
            "meeting_attendees": [{"email": "pastor@grace.org", "displayName": "Pastor"}],
            "sentences": [
                {"index": 0, "speaker_name": "Pastor", "text": "Welcome", "start_time": 0.0, "end_time": 1.5},
                {"speaker_name": null, "text": "Thanks", "start_time": 1.5, "end_time": 2.0}
            ],
            "summary": {
                "overview": "Discussed launch plans.",
                "shorthand_bullet": "",
                "action_items": "**Pastor**\n- Send roster\n\n• Book venue\n",
                "keywords": ["launch", " "]
            }
        }));

        let transcript = normalize_transcript(raw, "m-1").expect("normalizes");

        assert_eq!(transcript.external_meeting_id, "m-1");
        assert_eq!(transcript.title, "Grace Church — Discovery Call");
        assert_eq!(
            transcript.meeting_date,
            Some(Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(transcript.duration_seconds, Some(2730.0));
        assert_eq!(
            transcript.participants,
            vec![
                "pastor@grace.org",
                "elder@grace.org",
                "jane@grace.org",
                "coach@network.org"
            ]
        );
        assert_eq!(transcript.sentences.len(), 2);
        assert_eq!(transcript.sentences[1].index, 1);
        assert_eq!(transcript.sentences[1].speaker, "Unknown");
        assert_eq!(transcript.summary.as_deref(), Some("Discussed launch plans."));
        assert_eq!(transcript.action_items, vec!["Send roster", "Book venue"]);
        assert_eq!(transcript.keywords, vec!["launch"]);
    }

    #[test]
    fn string_dates_and_missing_fields_are_tolerated() {
        let raw = raw_from(json!({
            "date": "1767261600000",
            "summary": {"overview": "Short call"}
        }));

        let transcript = normalize_transcript(raw, "m-2").expect("normalizes");
        assert_eq!(transcript.external_meeting_id, "m-2");
        assert_eq!(transcript.title, "Untitled");
        assert!(transcript.meeting_date.is_some());
        assert!(transcript.participants.is_empty());
    }

    #[test]
    fn empty_content_is_not_ready() {
        let raw = raw_from(json!({"id": "m-3", "title": "Pending", "sentences": []}));
        assert!(matches!(
            normalize_transcript(raw, "m-3"),
            Err(FetchError::NotReady { meeting_id }) if meeting_id == "m-3"
        ));
    }

    #[test]
    fn display_names_survive_untouched() {
        assert_eq!(normalize_identifier(" Grace Church "), "Grace Church");
        assert_eq!(normalize_identifier("mailto:A@B.org"), "a@b.org");
    }
}
