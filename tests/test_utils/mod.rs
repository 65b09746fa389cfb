//! Shared fixtures for integration tests.
//!
//! Every test gets a fresh in-memory SQLite database with migrations applied, a
//! seeded church directory, connected integration settings and a wiremock server
//! standing in for the transcription provider.

#![allow(dead_code)]

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use chrono::{DateTime, TimeZone, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, PaginatorTrait, Statement};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use transcript_intake::config::AppConfig;
use transcript_intake::crypto::CryptoKey;
use transcript_intake::repositories::{
    DirectoryRepository, ScheduledCallRepository, SettingsRepository,
};
use transcript_intake::server::{AppState, create_app};
use transcript_intake::webhook_verification::sign;

pub const TENANT_ID: Uuid = Uuid::from_u128(0x5b0c_6a4e_9a57_4f6f_a5c3_0d6a_2a1e_7f10);
pub const OPERATOR_TOKEN: &str = "op-test-token";
pub const API_KEY: &str = "ff-test-key";
pub const WEBHOOK_SECRET: &str = "whsec-test";
pub const CRYPTO_KEY_BYTES: [u8; 32] = [7u8; 32];

pub fn test_crypto_key() -> CryptoKey {
    CryptoKey::new(CRYPTO_KEY_BYTES.to_vec()).expect("32-byte key")
}

/// 2026-01-01 10:00 UTC, the time of Grace Church's seeded discovery call.
pub fn grace_call_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap()
}

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;

    // Directory rows are inserted independently of each other in some tests.
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "PRAGMA foreign_keys = OFF".to_string(),
    ))
    .await?;

    Ok(db)
}

/// Seeds Grace Church and Hope Fellowship with one leader each plus one Grace call.
pub async fn seed_directory(db: &DatabaseConnection, tenant_id: Uuid) -> Result<Uuid> {
    let directory = DirectoryRepository::new(db);
    directory.upsert_church(tenant_id, "grace", "Grace Church").await?;
    directory.upsert_church(tenant_id, "hope", "Hope Fellowship").await?;
    directory
        .upsert_contact(tenant_id, "grace", "pastor@grace.org", "leader")
        .await?;
    directory
        .upsert_contact(tenant_id, "hope", "lead@hope.org", "leader")
        .await?;

    let call = ScheduledCallRepository::new(db)
        .create_scheduled(tenant_id, "grace", "discovery", grace_call_time(), None)
        .await?;
    Ok(call.id)
}

pub async fn count<E: EntityTrait>(db: &DatabaseConnection) -> u64
where
    E::Model: Send + Sync,
{
    E::find().count(db).await.expect("count query")
}

/// Provider transcript body in the provider's GraphQL shape.
pub fn provider_transcript(
    meeting_id: &str,
    title: &str,
    participants: &[&str],
    date: DateTime<Utc>,
) -> Value {
    json!({
        "id": meeting_id,
        "title": title,
        "date": date.timestamp_millis(),
        "duration": 45.0,
        "transcript_url": format!("https://app.fireflies.ai/view/{}", meeting_id),
        "participants": participants,
        "sentences": [
            {"index": 0, "speaker_name": "Pastor", "text": "Thanks for joining.", "start_time": 0.0, "end_time": 2.5}
        ],
        "summary": {
            "overview": "Discussed next steps for the launch.",
            "shorthand_bullet": "- launch timeline",
            "action_items": "**Pastor**\n- Send the assessment\n- Book the strategy call",
            "keywords": ["launch", "assessment"]
        }
    })
}

pub struct TestApp {
    pub db: DatabaseConnection,
    pub state: AppState,
    pub provider: MockServer,
    pub tenant_id: Uuid,
    pub grace_call_id: Uuid,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let provider = MockServer::start().await;
        let db = setup_test_db().await.expect("test database");

        let mut config = AppConfig {
            profile: "test".to_string(),
            operator_tokens: vec![OPERATOR_TOKEN.to_string()],
            crypto_key: Some(CRYPTO_KEY_BYTES.to_vec()),
            ..AppConfig::default()
        };
        config.provider.api_base = provider.uri();
        config.provider.timeout_ms = 2_000;
        adjust(&mut config);

        let tenant_id = TENANT_ID;
        let grace_call_id = seed_directory(&db, tenant_id).await.expect("directory seed");

        let key = test_crypto_key();
        let settings = SettingsRepository::new(&db, &key);
        settings.connect(tenant_id, API_KEY).await.expect("connect");
        settings
            .set_webhook_secret(tenant_id, Some(WEBHOOK_SECRET))
            .await
            .expect("webhook secret");

        let state = AppState::from_config(config, db.clone()).expect("app state");

        Self {
            db,
            state,
            provider,
            tenant_id,
            grace_call_id,
        }
    }

    pub fn router(&self) -> Router {
        create_app(self.state.clone())
    }

    /// Register a transcript the mock provider will return for `meeting_id`.
    pub async fn mount_transcript(&self, meeting_id: &str, transcript: Value) {
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_partial_json(json!({"variables": {"transcriptId": meeting_id}})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"transcript": transcript}})),
            )
            .mount(&self.provider)
            .await;
    }

    /// Number of transcript fetches the mock provider has served.
    pub async fn fetch_count(&self) -> usize {
        self.provider
            .received_requests()
            .await
            .map(|requests| {
                requests
                    .iter()
                    .filter(|r| String::from_utf8_lossy(&r.body).contains("transcriptId"))
                    .count()
            })
            .unwrap_or(0)
    }

    /// POST a webhook body signed with the tenant's secret.
    pub async fn post_webhook(&self, body: &Value) -> (StatusCode, Value) {
        let raw = serde_json::to_vec(body).expect("json body");
        let signature = format!("sha256={}", sign(&raw, WEBHOOK_SECRET).expect("signature"));
        self.post_webhook_raw(self.tenant_id, raw, Some(signature)).await
    }

    pub async fn post_webhook_raw(
        &self,
        tenant_id: Uuid,
        raw: Vec<u8>,
        signature: Option<String>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri(format!("/webhooks/transcripts/{}", tenant_id))
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            request = request.header("x-hub-signature", signature);
        }
        self.send(request.body(Body::from(raw)).expect("request")).await
    }

    /// Call an operator endpoint with the test token and tenant header.
    pub async fn operator(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", OPERATOR_TOKEN))
            .header("x-tenant-id", self.tenant_id.to_string());
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).expect("json body"))),
            None => request.body(Body::empty()),
        };
        self.send(request.expect("request")).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.expect("router response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }
}

pub fn completed_event(meeting_id: &str) -> Value {
    json!({
        "meetingId": meeting_id,
        "eventType": "Transcription completed",
        "clientReferenceId": "ref-1"
    })
}
