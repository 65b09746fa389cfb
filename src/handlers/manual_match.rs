//! # Manual match handler

use axum::{
    extract::{State, rejection::JsonRejection},
    response::Json,
};

use crate::auth::{OperatorTenant, TenantHeader};
use crate::error::ApiError;
use crate::manual_match::{ManualMatchRequest, ManualMatchResponse, ManualMatcher};
use crate::server::AppState;

/// Resolve a queued meeting to a church and optionally a call
#[utoipa::path(
    post,
    path = "/transcripts/manual-match",
    security(("bearer_auth" = [])),
    params(TenantHeader),
    request_body = ManualMatchRequest,
    responses(
        (status = 200, description = "Transcript stored and linked", body = ManualMatchResponse),
        (status = 400, description = "callId and createCall both given, or invalid body", body = ApiError),
        (status = 404, description = "Unmatched meeting, church or call not found", body = ApiError),
        (status = 409, description = "Already resolved, provider not connected or transcript not ready", body = ApiError),
        (status = 502, description = "Provider request failed", body = ApiError)
    ),
    tag = "transcripts"
)]
pub async fn manual_match(
    State(state): State<AppState>,
    OperatorTenant(tenant_id): OperatorTenant,
    body: Result<Json<ManualMatchRequest>, JsonRejection>,
) -> Result<Json<ManualMatchResponse>, ApiError> {
    let Json(request) = body?;
    let response = ManualMatcher::new(&state).resolve(tenant_id, request).await?;
    Ok(Json(response))
}
