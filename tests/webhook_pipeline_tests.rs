//! Webhook delivery tests: authentication, filtering, matching, queueing and
//! redelivery behaviour through the full router.

mod test_utils;

use axum::http::{Method, StatusCode};
use chrono::Duration;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use test_utils::{
    TestApp, WEBHOOK_SECRET, completed_event, count, grace_call_time, provider_transcript,
};
use transcript_intake::config::RedeliveryPolicy;
use transcript_intake::crypto::CryptoKey;
use transcript_intake::models::{
    IntegrationSettings, ScheduledCall, StoredTranscript, UnmatchedMeeting, WebhookEvent,
    stored_transcript, unmatched_meeting, webhook_event,
};
use transcript_intake::repositories::{SettingsRepository, SettingsUpdate};
use transcript_intake::webhook_verification::sign;

fn key() -> CryptoKey {
    test_utils::test_crypto_key()
}

async fn events_for(app: &TestApp, meeting_id: &str) -> Vec<webhook_event::Model> {
    WebhookEvent::find()
        .filter(webhook_event::Column::ExternalMeetingId.eq(meeting_id))
        .all(&app.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn participant_match_links_the_scheduled_call() {
    let app = TestApp::new().await;
    app.mount_transcript(
        "m-1",
        provider_transcript(
            "m-1",
            "Grace Church — Discovery Call",
            &["pastor@grace.org"],
            grace_call_time() + Duration::minutes(12),
        ),
    )
    .await;

    let (status, body) = app.post_webhook(&completed_event("m-1")).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["matched"], true);
    assert_eq!(body["churchId"], "grace");
    assert_eq!(body["callId"], app.grace_call_id.to_string());
    assert!(body.get("duplicate").is_none());

    let call = ScheduledCall::find_by_id(app.grace_call_id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        call.transcript_url.as_deref(),
        Some("https://app.fireflies.ai/view/m-1")
    );
    assert!(call.ai_summary.unwrap().contains("next steps"));
    assert_eq!(call.external_meeting_id.as_deref(), Some("m-1"));
    assert!(call.completed);
    assert_eq!(
        call.action_items,
        Some(json!(["Send the assessment", "Book the strategy call"]))
    );

    assert_eq!(count::<UnmatchedMeeting>(&app.db).await, 0);
    let stored = StoredTranscript::find().all(&app.db).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].church_id.as_deref(), Some("grace"));
    assert_eq!(stored[0].scheduled_call_id, Some(app.grace_call_id));
    assert_eq!(body["transcriptId"], stored[0].id.to_string());

    let events = events_for(&app, "m-1").await;
    assert_eq!(events.len(), 1);
    assert!(events[0].processed);
    assert_eq!(events[0].outcome.as_deref(), Some("matched"));
    assert_eq!(events[0].event_type, "transcription_completed");
    assert_eq!(events[0].transcript_id, Some(stored[0].id));
}

#[tokio::test]
async fn title_match_without_nearby_call_links_church_only() {
    let app = TestApp::new().await;
    app.mount_transcript(
        "m-hope",
        provider_transcript(
            "m-hope",
            "Hope Fellowship strategy session",
            &["visitor@example.com"],
            grace_call_time(),
        ),
    )
    .await;

    let (status, body) = app.post_webhook(&completed_event("m-hope")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], true);
    assert_eq!(body["churchId"], "hope");
    assert!(body.get("callId").is_none());
    assert_eq!(count::<UnmatchedMeeting>(&app.db).await, 0);
}

#[tokio::test]
async fn wrong_signature_is_rejected_without_logging() {
    let app = TestApp::new().await;
    let raw = serde_json::to_vec(&completed_event("m-1")).unwrap();
    let forged = format!("sha256={}", sign(&raw, "not-the-secret").unwrap());

    let (status, _) = app.post_webhook_raw(app.tenant_id, raw.clone(), Some(forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post_webhook_raw(app.tenant_id, raw.clone(), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post_webhook_raw(app.tenant_id, raw, Some("sha256=zz-not-hex".to_string()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(count::<WebhookEvent>(&app.db).await, 0);
    assert_eq!(app.fetch_count().await, 0);

    let settings = IntegrationSettings::find().one(&app.db).await.unwrap().unwrap();
    assert!(settings.last_webhook_received_at.is_none());
}

#[tokio::test]
async fn bare_hex_signature_and_alias_header_are_accepted() {
    let app = TestApp::new().await;
    let raw = serde_json::to_vec(&json!({"meetingId": "m-x", "eventType": "meeting.started"})).unwrap();
    let signature = sign(&raw, WEBHOOK_SECRET).unwrap();

    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri(format!("/webhooks/transcripts/{}", app.tenant_id))
        .header("x-signature", signature)
        .body(axum::body::Body::from(raw))
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["outcome"], "ignored");
}

#[tokio::test]
async fn unsigned_delivery_is_trusted_when_no_secret_is_configured() {
    let app = TestApp::new().await;
    SettingsRepository::new(&app.db, &key())
        .set_webhook_secret(app.tenant_id, None)
        .await
        .unwrap();

    let raw = serde_json::to_vec(&json!({"meetingId": "m-2", "eventType": "meeting.started"})).unwrap();
    let (status, body) = app.post_webhook_raw(app.tenant_id, raw, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], false);
}

#[tokio::test]
async fn other_event_types_are_logged_as_processed_without_fetch() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post_webhook(&json!({"meetingId": "m-3", "eventType": "meeting.started"}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["outcome"], "ignored");
    assert_eq!(app.fetch_count().await, 0);

    let events = events_for(&app, "m-3").await;
    assert_eq!(events.len(), 1);
    assert!(events[0].processed);
    assert_eq!(events[0].outcome.as_deref(), Some("ignored"));
    assert_eq!(events[0].payload.as_ref().unwrap()["eventType"], "meeting.started");

    let settings = IntegrationSettings::find().one(&app.db).await.unwrap().unwrap();
    assert!(settings.last_webhook_received_at.is_some());
}

#[tokio::test]
async fn auto_process_off_logs_without_fetching() {
    let app = TestApp::new().await;
    SettingsRepository::new(&app.db, &key())
        .update_flags(
            app.tenant_id,
            SettingsUpdate {
                auto_process_enabled: Some(false),
                auto_match_enabled: None,
            },
        )
        .await
        .unwrap();

    let (status, body) = app.post_webhook(&completed_event("m-4")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "processing_disabled");
    assert_eq!(app.fetch_count().await, 0);
    assert_eq!(count::<StoredTranscript>(&app.db).await, 0);

    let events = events_for(&app, "m-4").await;
    assert!(events[0].processed);
    assert_eq!(events[0].outcome.as_deref(), Some("processing_disabled"));
}

#[tokio::test]
async fn ambiguous_participants_go_to_review_queue() {
    let app = TestApp::new().await;
    app.mount_transcript(
        "m-5",
        provider_transcript(
            "m-5",
            "Grace Church — Discovery Call",
            &["pastor@grace.org", "lead@hope.org"],
            grace_call_time(),
        ),
    )
    .await;

    let (status, body) = app.post_webhook(&completed_event("m-5")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], false);
    assert!(body.get("churchId").is_none());

    let queued = UnmatchedMeeting::find().all(&app.db).await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].external_meeting_id, "m-5");
    assert_eq!(queued[0].reason, "ambiguous_participants");
    assert!(queued[0].matched_church_id.is_none());
    assert!(queued[0].matched_at.is_none());

    let call = ScheduledCall::find_by_id(app.grace_call_id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(call.transcript_url.is_none());
    assert!(!call.completed);
}

#[tokio::test]
async fn auto_match_off_always_queues() {
    let app = TestApp::new().await;
    SettingsRepository::new(&app.db, &key())
        .update_flags(
            app.tenant_id,
            SettingsUpdate {
                auto_process_enabled: None,
                auto_match_enabled: Some(false),
            },
        )
        .await
        .unwrap();
    app.mount_transcript(
        "m-6",
        provider_transcript(
            "m-6",
            "Grace Church — Discovery Call",
            &["pastor@grace.org"],
            grace_call_time(),
        ),
    )
    .await;

    let (status, body) = app.post_webhook(&completed_event("m-6")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], false);
    assert_eq!(body["outcome"], "queued");
    assert_eq!(app.fetch_count().await, 1);

    let stored = StoredTranscript::find().one(&app.db).await.unwrap().unwrap();
    assert!(stored.church_id.is_none());
    let queued = UnmatchedMeeting::find().one(&app.db).await.unwrap().unwrap();
    assert_eq!(queued.reason, "auto_match_disabled");
    assert_eq!(queued.transcript_id, Some(stored.id));
}

#[tokio::test]
async fn redelivery_is_skipped_and_reports_existing_linkage() {
    let app = TestApp::new().await;
    app.mount_transcript(
        "m-7",
        provider_transcript(
            "m-7",
            "Discovery",
            &["pastor@grace.org"],
            grace_call_time() - Duration::minutes(5),
        ),
    )
    .await;

    let (_, first) = app.post_webhook(&completed_event("m-7")).await;
    let (status, second) = app.post_webhook(&completed_event("m-7")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["duplicate"], true);
    assert_eq!(second["matched"], true);
    assert_eq!(second["churchId"], first["churchId"]);
    assert_eq!(second["callId"], first["callId"]);
    assert_eq!(second["transcriptId"], first["transcriptId"]);

    assert_eq!(app.fetch_count().await, 1);
    assert_eq!(count::<StoredTranscript>(&app.db).await, 1);

    let events = events_for(&app, "m-7").await;
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.processed));
    assert!(events.iter().any(|e| e.outcome.as_deref() == Some("duplicate")));
}

#[tokio::test]
async fn refresh_policy_refetches_without_duplicating_rows() {
    let app = TestApp::with_config(|config| {
        config.webhook.redelivery_policy = RedeliveryPolicy::Refresh;
    })
    .await;
    app.mount_transcript(
        "m-8",
        provider_transcript("m-8", "Weekly sync", &["unknown@nowhere.com"], grace_call_time()),
    )
    .await;

    let (_, first) = app.post_webhook(&completed_event("m-8")).await;
    let (status, second) = app.post_webhook(&completed_event("m-8")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["matched"], false);
    assert_eq!(second["matched"], false);
    assert_eq!(first["transcriptId"], second["transcriptId"]);
    assert_eq!(app.fetch_count().await, 2);
    assert_eq!(count::<StoredTranscript>(&app.db).await, 1);
    assert_eq!(count::<UnmatchedMeeting>(&app.db).await, 1);
}

#[tokio::test]
async fn fetch_failure_is_recorded_and_redelivery_starts_fresh() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&app.provider)
        .await;
    app.mount_transcript(
        "m-9",
        provider_transcript("m-9", "Grace Church check-in", &[], grace_call_time()),
    )
    .await;

    let (status, body) = app.post_webhook(&completed_event("m-9")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Transcript fetch failed");
    assert!(body["details"].as_str().unwrap().contains("503"));

    let events = events_for(&app, "m-9").await;
    assert_eq!(events.len(), 1);
    assert!(!events[0].processed);
    assert_eq!(events[0].outcome.as_deref(), Some("failed"));
    assert!(events[0].error.is_some());
    assert_eq!(count::<StoredTranscript>(&app.db).await, 0);

    let (status, body) = app.post_webhook(&completed_event("m-9")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["churchId"], "grace");
    assert!(body.get("duplicate").is_none());
}

#[tokio::test]
async fn transcript_not_ready_fails_the_delivery() {
    let app = TestApp::new().await;
    app.mount_transcript(
        "m-10",
        json!({"id": "m-10", "title": "Processing", "sentences": [], "summary": null}),
    )
    .await;

    let (status, body) = app.post_webhook(&completed_event("m-10")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["details"].as_str().unwrap().contains("not ready"));
    let events = events_for(&app, "m-10").await;
    assert!(!events[0].processed);
}

#[tokio::test]
async fn unknown_tenant_is_not_found_and_not_logged() {
    let app = TestApp::new().await;
    let raw = serde_json::to_vec(&completed_event("m-11")).unwrap();
    let signature = format!("sha256={}", sign(&raw, WEBHOOK_SECRET).unwrap());

    let (status, _) = app
        .post_webhook_raw(Uuid::new_v4(), raw, Some(signature))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(count::<WebhookEvent>(&app.db).await, 0);
}

#[tokio::test]
async fn malformed_payload_is_rejected_after_authentication() {
    let app = TestApp::new().await;
    let raw = br#"{"eventType":"transcription_completed"}"#.to_vec();
    let signature = format!("sha256={}", sign(&raw, WEBHOOK_SECRET).unwrap());

    let (status, body) = app.post_webhook_raw(app.tenant_id, raw, Some(signature)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert_eq!(count::<WebhookEvent>(&app.db).await, 0);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let app = TestApp::with_config(|config| config.webhook.max_body_kb = 1).await;
    let padding = "x".repeat(2048);
    let body = json!({"meetingId": "m-12", "eventType": "transcription_completed", "padding": padding});

    let (status, _) = app.post_webhook(&body).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(count::<WebhookEvent>(&app.db).await, 0);
}

#[tokio::test]
async fn health_checks_respond_ok() {
    let app = TestApp::new().await;

    for uri in [
        "/webhooks/transcripts".to_string(),
        format!("/webhooks/transcripts/{}", app.tenant_id),
    ] {
        let request = axum::http::Request::builder()
            .uri(uri)
            .body(axum::body::Body::empty())
            .unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}

#[tokio::test]
async fn queued_meeting_keeps_one_row_per_meeting() {
    let app = TestApp::with_config(|config| {
        config.webhook.redelivery_policy = RedeliveryPolicy::Refresh;
    })
    .await;
    app.mount_transcript(
        "m-13",
        provider_transcript("m-13", "Catch-up", &["someone@else.org"], grace_call_time()),
    )
    .await;

    for _ in 0..3 {
        let (status, _) = app.post_webhook(&completed_event("m-13")).await;
        assert_eq!(status, StatusCode::OK);
    }

    let rows = UnmatchedMeeting::find()
        .filter(unmatched_meeting::Column::ExternalMeetingId.eq("m-13"))
        .all(&app.db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    let stored = StoredTranscript::find()
        .filter(stored_transcript::Column::ExternalMeetingId.eq("m-13"))
        .all(&app.db)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn refreshed_transcript_for_another_church_drops_the_old_call() {
    let app = TestApp::with_config(|config| {
        config.webhook.redelivery_policy = RedeliveryPolicy::Refresh;
    })
    .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({"variables": {"transcriptId": "m-30"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"transcript": provider_transcript(
                "m-30",
                "Discovery call",
                &["pastor@grace.org"],
                grace_call_time(),
            )}
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&app.provider)
        .await;
    app.mount_transcript(
        "m-30",
        provider_transcript(
            "m-30",
            "Hope Fellowship call",
            &["unknown@nowhere.com"],
            grace_call_time() + Duration::days(30),
        ),
    )
    .await;

    let (status, first) = app.post_webhook(&completed_event("m-30")).await;
    assert_eq!(status, StatusCode::OK, "{first}");
    assert_eq!(first["churchId"], "grace");
    assert_eq!(first["callId"], app.grace_call_id.to_string());

    let (status, second) = app.post_webhook(&completed_event("m-30")).await;
    assert_eq!(status, StatusCode::OK, "{second}");
    assert_eq!(second["churchId"], "hope");
    assert!(second["callId"].is_null());

    let stored = StoredTranscript::find()
        .filter(stored_transcript::Column::ExternalMeetingId.eq("m-30"))
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.church_id.as_deref(), Some("hope"));
    assert!(stored.scheduled_call_id.is_none());

    let grace_call = ScheduledCall::find_by_id(app.grace_call_id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(grace_call.external_meeting_id.is_none());
    assert!(grace_call.ai_summary.is_none());
    assert!(grace_call.transcript_url.is_none());
}

#[tokio::test]
async fn call_linked_to_one_meeting_is_not_taken_by_the_next() {
    let app = TestApp::new().await;
    app.mount_transcript(
        "m-31",
        provider_transcript("m-31", "Discovery call", &["pastor@grace.org"], grace_call_time()),
    )
    .await;
    app.mount_transcript(
        "m-32",
        provider_transcript(
            "m-32",
            "Follow-up",
            &["pastor@grace.org"],
            grace_call_time() + Duration::minutes(90),
        ),
    )
    .await;

    let (_, first) = app.post_webhook(&completed_event("m-31")).await;
    assert_eq!(first["callId"], app.grace_call_id.to_string());

    let (status, second) = app.post_webhook(&completed_event("m-32")).await;
    assert_eq!(status, StatusCode::OK, "{second}");
    assert_eq!(second["matched"], true);
    assert_eq!(second["churchId"], "grace");
    assert!(second["callId"].is_null());

    let call = ScheduledCall::find_by_id(app.grace_call_id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(call.external_meeting_id.as_deref(), Some("m-31"));

    let linked = StoredTranscript::find()
        .filter(stored_transcript::Column::ScheduledCallId.eq(app.grace_call_id))
        .all(&app.db)
        .await
        .unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].external_meeting_id, "m-31");
}

#[tokio::test]
async fn concurrent_deliveries_for_one_meeting_converge() {
    let app = TestApp::new().await;
    app.mount_transcript(
        "m-33",
        provider_transcript("m-33", "Discovery call", &["pastor@grace.org"], grace_call_time()),
    )
    .await;
    let event = completed_event("m-33");

    let ((status_a, a), (status_b, b)) =
        tokio::join!(app.post_webhook(&event), app.post_webhook(&event));

    assert_eq!(status_a, StatusCode::OK, "{a}");
    assert_eq!(status_b, StatusCode::OK, "{b}");
    assert_eq!(a["transcriptId"], b["transcriptId"]);
    assert_eq!(a["churchId"], "grace");
    assert_eq!(b["churchId"], "grace");
    assert_eq!(a["callId"], app.grace_call_id.to_string());
    assert_eq!(b["callId"], app.grace_call_id.to_string());
    assert_eq!(count::<StoredTranscript>(&app.db).await, 1);
    assert_eq!(count::<UnmatchedMeeting>(&app.db).await, 0);
}

#[tokio::test]
async fn concurrent_unmatched_deliveries_queue_one_row() {
    let app = TestApp::with_config(|config| {
        config.webhook.redelivery_policy = RedeliveryPolicy::Refresh;
    })
    .await;
    app.mount_transcript(
        "m-34",
        provider_transcript("m-34", "Weekly sync", &["unknown@nowhere.com"], grace_call_time()),
    )
    .await;
    let event = completed_event("m-34");

    let ((status_a, a), (status_b, b)) =
        tokio::join!(app.post_webhook(&event), app.post_webhook(&event));

    assert_eq!(status_a, StatusCode::OK, "{a}");
    assert_eq!(status_b, StatusCode::OK, "{b}");
    assert_eq!(a["matched"], false);
    assert_eq!(b["matched"], false);
    assert_eq!(a["transcriptId"], b["transcriptId"]);
    assert_eq!(count::<StoredTranscript>(&app.db).await, 1);
    assert_eq!(count::<UnmatchedMeeting>(&app.db).await, 1);
}
