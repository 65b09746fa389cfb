//! # Post-commit notifications
//!
//! After a transcript is linked or queued, downstream systems (email, dashboards)
//! are told about it through an outbound webhook. Dispatch happens on a spawned
//! task once the pipeline's writes are durable; delivery failures are logged and
//! never affect the pipeline's response.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

const MAX_ATTEMPTS: u32 = 3;

/// Kind of state transition being announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationKind {
    #[serde(rename = "transcript.matched")]
    Matched,
    #[serde(rename = "transcript.queued")]
    Queued,
}

/// Body posted to the notification endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptNotification {
    pub event: NotificationKind,
    pub tenant_id: Uuid,
    pub external_meeting_id: String,
    pub transcript_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub church_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmatched_meeting_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// `webhook` or `manual`
    pub source: &'static str,
    pub occurred_at: DateTime<Utc>,
}

/// Outbound notifier; a no-op when no target is configured.
#[derive(Debug, Clone)]
pub struct Notifier {
    client: Client,
    target: Option<String>,
    retry_delay: Duration,
}

impl Notifier {
    pub fn new(target: Option<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            target,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Notifier that never sends anything.
    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            target: None,
            retry_delay: Duration::from_secs(1),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Fire-and-forget delivery on a background task.
    pub fn dispatch(&self, notification: TranscriptNotification) {
        if !self.is_enabled() {
            return;
        }
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(err) = notifier.send(&notification).await {
                error!(
                    tenant_id = %notification.tenant_id,
                    meeting_id = %notification.external_meeting_id,
                    error = %err,
                    "Transcript notification could not be delivered"
                );
            }
        });
    }

    /// Deliver with exponential backoff between attempts.
    pub async fn send(&self, notification: &TranscriptNotification) -> Result<(), String> {
        let Some(target) = self.target.as_deref() else {
            return Ok(());
        };

        let mut delay = self.retry_delay;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.client.post(target).json(notification).send().await {
                Ok(response) if response.status().is_success() => {
                    info!(
                        target = %redacted_target(target),
                        meeting_id = %notification.external_meeting_id,
                        attempt,
                        "Transcript notification delivered"
                    );
                    return Ok(());
                }
                Ok(response) => {
                    warn!(
                        target = %redacted_target(target),
                        status = %response.status(),
                        attempt,
                        "Notification endpoint returned non-success status"
                    );
                    if attempt == MAX_ATTEMPTS {
                        return Err(format!(
                            "notification failed after {} attempts with status {}",
                            MAX_ATTEMPTS,
                            response.status()
                        ));
                    }
                }
                Err(err) => {
                    warn!(
                        target = %redacted_target(target),
                        attempt,
                        error = %err,
                        "Notification request failed"
                    );
                    if attempt == MAX_ATTEMPTS {
                        return Err(format!(
                            "notification failed after {} attempts: {}",
                            MAX_ATTEMPTS, err
                        ));
                    }
                }
            }

            tokio::time::sleep(delay).await;
            delay *= 2;
        }

        Ok(())
    }
}

fn redacted_target(target: &str) -> String {
    Url::parse(target)
        .ok()
        .map(|parsed| {
            format!(
                "{}://{}",
                parsed.scheme(),
                parsed.host_str().unwrap_or("unknown")
            )
        })
        .unwrap_or_else(|| "[invalid-url]".to_string())
}
