//! GraphQL client for the transcription provider.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{FetchError, PROVIDER_NAME, ProviderAccount, RawTranscript, TranscriptProvider};
use crate::config::ProviderConfig;
use crate::models::Transcript;

const TRANSCRIPT_QUERY: &str = r#"query Transcript($transcriptId: String!) {
  transcript(id: $transcriptId) {
    id
    title
    date
    duration
    transcript_url
    organizer_email
    participants
    meeting_attendees { email displayName }
    sentences { index speaker_name text start_time end_time }
    summary { overview shorthand_bullet action_items keywords }
  }
}"#;

const USER_QUERY: &str = "query { user { email name } }";

const NOT_FOUND_CODE: &str = "object_not_found";
const NOT_READY_CODE: &str = "transcript_not_ready";
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    extensions: Option<GraphqlErrorExtensions>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorExtensions {
    code: Option<String>,
}

impl GraphqlError {
    fn code(&self) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.code.as_deref())
            .or(self.code.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptData {
    transcript: Option<RawTranscript>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    user: Option<ProviderAccount>,
}

/// Transcript fetcher backed by the provider's GraphQL endpoint.
#[derive(Clone)]
pub struct GraphqlTranscriptClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl GraphqlTranscriptClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, reqwest::Error> {
        Self::new_with_api_base(&config.api_base, config.timeout())
    }

    /// Build a client against an explicit API base (used by tests pointing at a mock server).
    pub fn new_with_api_base(api_base: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("transcript-intake/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/graphql", api_base.trim_end_matches('/')),
            timeout,
        })
    }

    async fn post_query<T>(
        &self,
        api_key: &str,
        body: serde_json::Value,
    ) -> Result<GraphqlEnvelope<T>, FetchError>
    where
        T: for<'de> Deserialize<'de>,
    {
        if api_key.trim().is_empty() {
            return Err(FetchError::MissingApiKey);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| self.classify_transport_error(err))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok());
            warn!(provider = PROVIDER_NAME, ?retry_after, "Provider rate limited request");
            return Err(FetchError::RateLimited { retry_after });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized {
                status: status.as_u16(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|err| self.classify_transport_error(err))?;

        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                meeting_id: String::new(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Upstream {
                status: status.as_u16(),
                message: truncate(&text, MAX_ERROR_BODY),
            });
        }

        serde_json::from_str(&text).map_err(|err| FetchError::Malformed(err.to_string()))
    }

    fn classify_transport_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else {
            FetchError::Network(err)
        }
    }
}

#[async_trait]
impl TranscriptProvider for GraphqlTranscriptClient {
    async fn fetch(&self, api_key: &str, meeting_id: &str) -> Result<Transcript, FetchError> {
        let started = Instant::now();
        let body = json!({
            "query": TRANSCRIPT_QUERY,
            "variables": { "transcriptId": meeting_id },
        });

        let result = self
            .post_query::<TranscriptData>(api_key, body)
            .await
            .map_err(|err| match err {
                FetchError::NotFound { .. } => FetchError::NotFound {
                    meeting_id: meeting_id.to_string(),
                },
                other => other,
            })
            .and_then(|envelope| transcript_from_envelope(envelope, meeting_id));

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.kind(),
        };
        metrics::counter!("transcript_fetch_total", "outcome" => outcome).increment(1);
        metrics::histogram!("transcript_fetch_seconds").record(started.elapsed().as_secs_f64());
        debug!(
            provider = PROVIDER_NAME,
            meeting_id,
            outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Transcript fetch finished"
        );

        result
    }

    async fn test_connection(&self, api_key: &str) -> Result<ProviderAccount, FetchError> {
        let envelope = self
            .post_query::<UserData>(api_key, json!({ "query": USER_QUERY }))
            .await?;

        if let Some(error) = envelope.errors.first() {
            if matches!(error.code(), Some("invalid_api_key" | "forbidden" | "unauthenticated")) {
                return Err(FetchError::Unauthorized { status: 200 });
            }
            return Err(FetchError::Malformed(error.message.clone()));
        }

        envelope
            .data
            .and_then(|data| data.user)
            .ok_or_else(|| FetchError::Malformed("response carried no user".to_string()))
    }
}

fn transcript_from_envelope(
    envelope: GraphqlEnvelope<TranscriptData>,
    meeting_id: &str,
) -> Result<Transcript, FetchError> {
    for error in &envelope.errors {
        match error.code() {
            Some(NOT_FOUND_CODE) => {
                return Err(FetchError::NotFound {
                    meeting_id: meeting_id.to_string(),
                });
            }
            Some(NOT_READY_CODE) => {
                return Err(FetchError::NotReady {
                    meeting_id: meeting_id.to_string(),
                });
            }
            _ => {}
        }
    }

    match envelope.data.and_then(|data| data.transcript) {
        Some(raw) => super::normalize_transcript(raw, meeting_id),
        None if envelope.errors.is_empty() => Err(FetchError::NotFound {
            meeting_id: meeting_id.to_string(),
        }),
        None => Err(FetchError::Malformed(
            envelope
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; "),
        )),
    }
}

fn truncate(body: &str, max: usize) -> String {
    if body.chars().count() > max {
        let truncated: String = body.chars().take(max).collect();
        format!("{}...", truncated)
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> GraphqlTranscriptClient {
        GraphqlTranscriptClient::new_with_api_base(&server.uri(), Duration::from_millis(500))
            .expect("client builds")
    }

    #[tokio::test]
    async fn fetch_sends_bearer_key_and_variables() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("authorization", "Bearer ff-key"))
            .and(body_partial_json(json!({"variables": {"transcriptId": "m-1"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"transcript": {
                    "id": "m-1",
                    "title": "Weekly",
                    "date": 1767261600000i64,
                    "participants": ["pastor@grace.org"],
                    "sentences": [{"index": 0, "speaker_name": "A", "text": "hi", "start_time": 0.0, "end_time": 1.0}],
                    "summary": {"overview": "ok"}
                }}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let transcript = client_for(&server).await.fetch("ff-key", "m-1").await.unwrap();
        assert_eq!(transcript.external_meeting_id, "m-1");
        assert_eq!(transcript.participants, vec!["pastor@grace.org"]);
    }

    #[tokio::test]
    async fn null_transcript_and_not_found_code_are_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"variables": {"transcriptId": "gone"}})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"transcript": null}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"variables": {"transcriptId": "coded"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [{"message": "Transcript not found", "extensions": {"code": "object_not_found"}}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert!(matches!(
            client.fetch("k", "gone").await,
            Err(FetchError::NotFound { meeting_id }) if meeting_id == "gone"
        ));
        assert!(matches!(
            client.fetch("k", "coded").await,
            Err(FetchError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn http_statuses_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer bad"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer limited"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "12"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer down"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer garbled"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert!(matches!(
            client.fetch("bad", "m").await,
            Err(FetchError::Unauthorized { status: 401 })
        ));
        assert!(matches!(
            client.fetch("limited", "m").await,
            Err(FetchError::RateLimited {
                retry_after: Some(12)
            })
        ));
        match client.fetch("down", "m").await {
            Err(FetchError::Upstream { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
        assert!(matches!(
            client.fetch("garbled", "m").await,
            Err(FetchError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let result = client_for(&server).await.fetch("k", "m").await;
        assert!(matches!(result, Err(FetchError::Timeout { timeout_ms: 500 })));
    }

    #[tokio::test]
    async fn empty_key_is_rejected_before_any_request() {
        let server = MockServer::start().await;
        let result = client_for(&server).await.fetch("  ", "m").await;
        assert!(matches!(result, Err(FetchError::MissingApiKey)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connection_returns_account() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"query": USER_QUERY})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"user": {"email": "ops@church.org", "name": "Ops"}}
            })))
            .mount(&server)
            .await;

        let account = client_for(&server).await.test_connection("k").await.unwrap();
        assert_eq!(account.email.as_deref(), Some("ops@church.org"));
    }
}
