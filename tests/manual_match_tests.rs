//! Operator resolution of queued meetings through `POST /transcripts/manual-match`.

mod test_utils;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use sea_orm::EntityTrait;
use serde_json::{Value, json};
use uuid::Uuid;

use test_utils::{TestApp, completed_event, count, grace_call_time, provider_transcript};
use transcript_intake::models::{ScheduledCall, StoredTranscript, UnmatchedMeeting};
use transcript_intake::repositories::ScheduledCallRepository;

/// Delivers a meeting nobody can place and returns the queued row id.
async fn queue_unknown_meeting(app: &TestApp, meeting_id: &str) -> Uuid {
    app.mount_transcript(
        meeting_id,
        provider_transcript(
            meeting_id,
            "Weekly sync",
            &["unknown@nowhere.com"],
            grace_call_time() + Duration::minutes(3),
        ),
    )
    .await;

    let (status, body) = app.post_webhook(&completed_event(meeting_id)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["matched"], false);

    UnmatchedMeeting::find()
        .one(&app.db)
        .await
        .unwrap()
        .expect("queued meeting")
        .id
}

async fn manual_match(app: &TestApp, body: Value) -> (StatusCode, Value) {
    app.operator(Method::POST, "/transcripts/manual-match", Some(body))
        .await
}

#[tokio::test]
async fn unmatched_meeting_is_resolved_to_church_and_call() {
    let app = TestApp::new().await;
    let queued_id = queue_unknown_meeting(&app, "m-20").await;

    let (status, body) = manual_match(
        &app,
        json!({
            "unmatchedMeetingId": queued_id,
            "churchId": "grace",
            "callId": app.grace_call_id,
            "matchedBy": "ops@network.org"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["callId"], app.grace_call_id.to_string());
    assert!(body["message"].as_str().unwrap().contains("grace"));

    let queued = UnmatchedMeeting::find_by_id(queued_id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(queued.matched_church_id.as_deref(), Some("grace"));
    assert_eq!(queued.matched_call_id, Some(app.grace_call_id));
    assert_eq!(queued.matched_by.as_deref(), Some("ops@network.org"));
    assert!(queued.matched_at.is_some());

    let stored = StoredTranscript::find().all(&app.db).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(body["transcriptId"], stored[0].id.to_string());
    assert_eq!(stored[0].church_id.as_deref(), Some("grace"));
    assert_eq!(stored[0].scheduled_call_id, Some(app.grace_call_id));

    let call = ScheduledCall::find_by_id(app.grace_call_id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(call.completed);
    assert_eq!(call.external_meeting_id.as_deref(), Some("m-20"));
    assert!(call.transcript_url.is_some());
}

#[tokio::test]
async fn church_only_resolution_defaults_matched_by() {
    let app = TestApp::new().await;
    let queued_id = queue_unknown_meeting(&app, "m-21").await;

    let (status, body) = manual_match(
        &app,
        json!({"unmatchedMeetingId": queued_id, "churchId": "hope"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["callId"].is_null());

    let queued = UnmatchedMeeting::find_by_id(queued_id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(queued.matched_church_id.as_deref(), Some("hope"));
    assert_eq!(queued.matched_by.as_deref(), Some("operator"));
    assert!(queued.matched_call_id.is_none());
}

#[tokio::test]
async fn second_resolution_conflicts_and_keeps_the_first() {
    let app = TestApp::new().await;
    let queued_id = queue_unknown_meeting(&app, "m-22").await;

    let (status, _) = manual_match(
        &app,
        json!({"unmatchedMeetingId": queued_id, "churchId": "grace"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let first = UnmatchedMeeting::find_by_id(queued_id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();

    let (status, body) = manual_match(
        &app,
        json!({"unmatchedMeetingId": queued_id, "churchId": "hope"}),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_RESOLVED");

    let after = UnmatchedMeeting::find_by_id(queued_id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.matched_church_id.as_deref(), Some("grace"));
    assert_eq!(after.matched_at, first.matched_at);
}

#[tokio::test]
async fn create_call_adds_a_completed_call() {
    let app = TestApp::new().await;
    let queued_id = queue_unknown_meeting(&app, "m-23").await;
    let scheduled_at = Utc::now() - Duration::days(2);

    let (status, body) = manual_match(
        &app,
        json!({
            "unmatchedMeetingId": queued_id,
            "churchId": "hope",
            "createCall": {"callType": "strategy", "scheduledAt": scheduled_at}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let call_id: Uuid = body["callId"].as_str().unwrap().parse().unwrap();

    let call = ScheduledCall::find_by_id(call_id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(call.church_id, "hope");
    assert_eq!(call.call_type, "strategy");
    assert!(call.completed);
    assert_eq!(call.external_meeting_id.as_deref(), Some("m-23"));
    assert_eq!(count::<ScheduledCall>(&app.db).await, 2);
}

#[tokio::test]
async fn call_of_another_church_is_not_found() {
    let app = TestApp::new().await;
    let queued_id = queue_unknown_meeting(&app, "m-24").await;

    let (status, body) = manual_match(
        &app,
        json!({
            "unmatchedMeetingId": queued_id,
            "churchId": "hope",
            "callId": app.grace_call_id
        }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    let queued = UnmatchedMeeting::find_by_id(queued_id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(queued.matched_at.is_none());
}

#[tokio::test]
async fn call_id_and_create_call_are_exclusive() {
    let app = TestApp::new().await;
    let queued_id = queue_unknown_meeting(&app, "m-25").await;

    let (status, body) = manual_match(
        &app,
        json!({
            "unmatchedMeetingId": queued_id,
            "churchId": "grace",
            "callId": app.grace_call_id,
            "createCall": {"callType": "strategy", "scheduledAt": grace_call_time()}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert_eq!(app.fetch_count().await, 1);
}

#[tokio::test]
async fn unknown_meeting_and_church_are_not_found() {
    let app = TestApp::new().await;
    let queued_id = queue_unknown_meeting(&app, "m-26").await;

    let (status, _) = manual_match(
        &app,
        json!({"unmatchedMeetingId": Uuid::new_v4(), "churchId": "grace"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = manual_match(
        &app,
        json!({"unmatchedMeetingId": queued_id, "churchId": "nowhere"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn disconnected_provider_conflicts() {
    let app = TestApp::new().await;
    let queued_id = queue_unknown_meeting(&app, "m-27").await;
    let (status, _) = app
        .operator(Method::DELETE, "/settings/transcripts/api-key", None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = manual_match(
        &app,
        json!({"unmatchedMeetingId": queued_id, "churchId": "grace"}),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "NOT_CONNECTED");
}

#[tokio::test]
async fn manual_match_requires_operator_token() {
    let app = TestApp::new().await;
    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/transcripts/manual-match")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(
            json!({"unmatchedMeetingId": Uuid::new_v4(), "churchId": "grace"}).to_string(),
        ))
        .unwrap();

    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn resolved_call_is_not_picked_again_for_later_meetings() {
    let app = TestApp::new().await;
    let queued_id = queue_unknown_meeting(&app, "m-28").await;
    manual_match(
        &app,
        json!({"unmatchedMeetingId": queued_id, "churchId": "grace", "callId": app.grace_call_id}),
    )
    .await;

    let second = ScheduledCallRepository::new(&app.db)
        .create_scheduled(
            app.tenant_id,
            "grace",
            "strategy",
            grace_call_time() + Duration::minutes(90),
            None,
        )
        .await
        .unwrap();
    app.mount_transcript(
        "m-29",
        provider_transcript(
            "m-29",
            "Follow-up",
            &["pastor@grace.org"],
            grace_call_time() + Duration::minutes(30),
        ),
    )
    .await;

    let (status, body) = app.post_webhook(&completed_event("m-29")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["callId"], second.id.to_string());
}

#[tokio::test]
async fn concurrent_resolutions_leave_one_consistent_outcome() {
    let app = TestApp::new().await;
    let queued_id = queue_unknown_meeting(&app, "m-30").await;
    let to_grace = json!({"unmatchedMeetingId": queued_id, "churchId": "grace"});
    let to_hope = json!({
        "unmatchedMeetingId": queued_id,
        "churchId": "hope",
        "createCall": {"callType": "strategy", "scheduledAt": grace_call_time()}
    });

    let ((status_a, a), (status_b, b)) =
        tokio::join!(manual_match(&app, to_grace), manual_match(&app, to_hope));

    let statuses = [status_a, status_b];
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::OK).count(),
        1,
        "{a} {b}"
    );
    assert!(statuses.contains(&StatusCode::CONFLICT), "{a} {b}");
    let loser = if status_a == StatusCode::CONFLICT { &a } else { &b };
    assert_eq!(loser["code"], "ALREADY_RESOLVED");

    let queued = UnmatchedMeeting::find_by_id(queued_id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    let stored = StoredTranscript::find().all(&app.db).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].church_id, queued.matched_church_id);
    assert_eq!(stored[0].scheduled_call_id, queued.matched_call_id);

    // The losing request's call is rolled back with the rest of its writes.
    let expected_calls = if queued.matched_church_id.as_deref() == Some("hope") { 2 } else { 1 };
    assert_eq!(count::<ScheduledCall>(&app.db).await, expected_calls);
}
