//! # Transcript webhook handlers
//!
//! Public endpoint the transcription provider calls when a meeting has been
//! transcribed. Deliveries are authenticated by HMAC signature, not operator tokens.
//! Authentication and validation failures are rejected before anything is logged;
//! every accepted delivery leaves a row in the webhook event log.

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode, header::CONTENT_LENGTH},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use tracing::{debug, error, warn};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::error::{ApiError, not_found};
use crate::handlers::types::{WebhookFailure, WebhookHealthResponse, WebhookResponse};
use crate::pipeline::{WebhookPayload, WebhookPipeline};
use crate::repositories::SettingsRepository;
use crate::server::AppState;
use crate::webhook_verification::{SIGNATURE_HEADER, signature_from_headers, verify_signature};

/// Path parameter for the tenant-scoped webhook URL
#[derive(Debug, Deserialize, IntoParams)]
pub struct TenantPath {
    /// Tenant UUID embedded in the webhook URL registered with the provider
    #[param(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub tenant_id: String,
}

fn parse_tenant(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse::<Uuid>().map_err(|_| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "Invalid tenant ID format - must be a valid UUID",
        )
    })
}

fn payload_too_large(limit: usize) -> ApiError {
    ApiError::new(
        StatusCode::PAYLOAD_TOO_LARGE,
        "PAYLOAD_TOO_LARGE",
        format!("Webhook body exceeds {} bytes", limit),
    )
}

async fn read_body(headers: &HeaderMap, body: Body, limit: usize) -> Result<Vec<u8>, ApiError> {
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if declared.is_some_and(|length| length > limit) {
        return Err(payload_too_large(limit));
    }

    match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => Ok(bytes.to_vec()),
        Err(err) if err.to_string().contains("length limit") => Err(payload_too_large(limit)),
        Err(err) => {
            warn!(error = %err, "Failed to read webhook body");
            Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_BODY",
                "Failed to read request body",
            ))
        }
    }
}

fn parse_payload(body: &[u8]) -> Result<(WebhookPayload, serde_json::Value), ApiError> {
    let invalid = |message: &str| {
        ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message.to_string())
    };

    let raw: serde_json::Value =
        serde_json::from_slice(body).map_err(|_| invalid("Webhook body must be valid JSON"))?;
    let payload: WebhookPayload = serde_json::from_value(raw.clone())
        .map_err(|err| invalid(&format!("Invalid webhook payload: {}", err)))?;

    if payload.meeting_id.trim().is_empty() {
        return Err(invalid("meetingId must not be empty"));
    }
    if payload.event_type.trim().is_empty() {
        return Err(invalid("eventType must not be empty"));
    }

    Ok((payload, raw))
}

/// Receive a transcript notification
#[utoipa::path(
    post,
    path = "/webhooks/transcripts/{tenant_id}",
    params(TenantPath),
    request_body(content = WebhookPayload, description = "Provider notification; signed with HMAC-SHA256 in X-Hub-Signature"),
    responses(
        (status = 200, description = "Delivery processed", body = WebhookResponse),
        (status = 400, description = "Malformed payload", body = ApiError),
        (status = 401, description = "Signature verification failed", body = ApiError),
        (status = 404, description = "Tenant has no transcript integration", body = ApiError),
        (status = 413, description = "Body too large", body = ApiError),
        (status = 500, description = "Processing failed; the provider should redeliver", body = WebhookFailure)
    ),
    tag = "webhooks"
)]
pub async fn receive_transcript_webhook(
    State(state): State<AppState>,
    Path(path): Path<TenantPath>,
    request: Request,
) -> Result<Response, ApiError> {
    let tenant_id = parse_tenant(&path.tenant_id)?;
    let (parts, body) = request.into_parts();
    let body = read_body(&parts.headers, body, state.config.webhook.max_body_bytes()).await?;

    let settings_repo = SettingsRepository::new(&state.db, &state.crypto_key);
    let settings = settings_repo
        .find(tenant_id)
        .await?
        .ok_or_else(|| not_found("No transcript integration configured for this tenant"))?;

    let secret = settings_repo.webhook_secret(&settings)?;
    let check = verify_signature(
        &body,
        signature_from_headers(&parts.headers),
        secret.as_deref().map(String::as_str),
    )?;
    debug!(tenant_id = %tenant_id, ?check, "Webhook delivery authenticated");

    if let Err(err) = settings_repo.touch_last_webhook(tenant_id).await {
        warn!(tenant_id = %tenant_id, error = %err, "Failed to record webhook receipt time");
    }

    let (payload, raw) = parse_payload(&body)?;

    match WebhookPipeline::new(&state).process(&settings, &payload, raw).await {
        Ok(report) => {
            metrics::counter!("webhook_deliveries_total", "outcome" => report.outcome.as_str())
                .increment(1);
            Ok((StatusCode::OK, Json(WebhookResponse::from(report))).into_response())
        }
        Err(err) => {
            metrics::counter!("webhook_deliveries_total", "outcome" => "failed").increment(1);
            error!(
                tenant_id = %tenant_id,
                meeting_id = %payload.meeting_id,
                error = %err,
                "Transcript webhook processing failed"
            );
            let failure = WebhookFailure {
                error: err.label().to_string(),
                details: err.to_string(),
            };
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(failure)).into_response())
        }
    }
}

/// Reachability check for a tenant webhook URL
#[utoipa::path(
    get,
    path = "/webhooks/transcripts/{tenant_id}",
    params(TenantPath),
    responses(
        (status = 200, description = "Endpoint reachable", body = WebhookHealthResponse),
        (status = 400, description = "Invalid tenant id", body = ApiError)
    ),
    tag = "webhooks"
)]
pub async fn tenant_webhook_health(
    Path(path): Path<TenantPath>,
) -> Result<Json<WebhookHealthResponse>, ApiError> {
    let tenant_id = parse_tenant(&path.tenant_id)?;
    Ok(Json(WebhookHealthResponse {
        status: "ok".to_string(),
        tenant_id: Some(tenant_id),
        signature_header: SIGNATURE_HEADER.to_string(),
    }))
}

/// Reachability check for the webhook surface
#[utoipa::path(
    get,
    path = "/webhooks/transcripts",
    responses(
        (status = 200, description = "Endpoint reachable", body = WebhookHealthResponse)
    ),
    tag = "webhooks"
)]
pub async fn webhook_health() -> Json<WebhookHealthResponse> {
    Json(WebhookHealthResponse {
        status: "ok".to_string(),
        tenant_id: None,
        signature_header: SIGNATURE_HEADER.to_string(),
    })
}
