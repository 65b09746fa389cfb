//! # Review queue and event log
//!
//! Read-only operator views over unmatched meetings and webhook deliveries.

use axum::{
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::{OperatorTenant, TenantHeader};
use crate::error::ApiError;
use crate::handlers::types::{
    UnmatchedMeetingList, UnmatchedMeetingView, WebhookEventList, WebhookEventView,
};
use crate::repositories::{ReviewStatus, UnmatchedMeetingRepository, WebhookEventRepository};
use crate::server::AppState;

const DEFAULT_EVENT_LIMIT: u64 = 50;
const MAX_EVENT_LIMIT: u64 = 200;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ReviewQuery {
    /// unresolved (default), resolved or all
    #[param(value_type = Option<String>, example = "unresolved")]
    pub status: Option<ReviewStatus>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(rename_all = "camelCase")]
pub struct EventLogQuery {
    /// Only events for this provider meeting id
    pub meeting_id: Option<String>,
    /// Page size, 1 to 200 (default 50)
    pub limit: Option<u64>,
}

fn invalid_query(rejection: QueryRejection) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", rejection.body_text())
}

/// List meetings awaiting (or past) manual review
#[utoipa::path(
    get,
    path = "/unmatched-meetings",
    security(("bearer_auth" = [])),
    params(TenantHeader, ReviewQuery),
    responses(
        (status = 200, description = "Review queue, newest first", body = UnmatchedMeetingList),
        (status = 400, description = "Invalid status filter", body = ApiError)
    ),
    tag = "review"
)]
pub async fn list_unmatched_meetings(
    State(state): State<AppState>,
    OperatorTenant(tenant_id): OperatorTenant,
    query: Result<Query<ReviewQuery>, QueryRejection>,
) -> Result<Json<UnmatchedMeetingList>, ApiError> {
    let Query(query) = query.map_err(invalid_query)?;
    let rows = UnmatchedMeetingRepository::new(&state.db)
        .list(tenant_id, query.status.unwrap_or_default())
        .await?;

    Ok(Json(UnmatchedMeetingList {
        data: rows.into_iter().map(UnmatchedMeetingView::from).collect(),
    }))
}

/// Webhook delivery log
#[utoipa::path(
    get,
    path = "/webhook-events",
    security(("bearer_auth" = [])),
    params(TenantHeader, EventLogQuery),
    responses(
        (status = 200, description = "Deliveries, newest first", body = WebhookEventList),
        (status = 400, description = "Invalid query", body = ApiError)
    ),
    tag = "review"
)]
pub async fn list_webhook_events(
    State(state): State<AppState>,
    OperatorTenant(tenant_id): OperatorTenant,
    query: Result<Query<EventLogQuery>, QueryRejection>,
) -> Result<Json<WebhookEventList>, ApiError> {
    let Query(query) = query.map_err(invalid_query)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .clamp(1, MAX_EVENT_LIMIT);
    let meeting_id = query
        .meeting_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let rows = WebhookEventRepository::new(&state.db)
        .list(tenant_id, meeting_id, limit)
        .await?;

    Ok(Json(WebhookEventList {
        data: rows.into_iter().map(WebhookEventView::from).collect(),
    }))
}
