//! # Transcript integration settings
//!
//! Operator management of the per-tenant provider API key, webhook secret and the
//! processing flags. Secrets are write-only: responses only say whether one is set.

use axum::{
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use tracing::info;

use crate::auth::{OperatorTenant, TenantHeader};
use crate::error::ApiError;
use crate::handlers::types::{
    ApiKeyRequest, ConnectionTestResponse, SettingsView, UpdateSettingsRequest,
    WebhookSecretRequest,
};
use crate::provider::FetchError;
use crate::repositories::{SettingsRepository, SettingsUpdate};
use crate::server::AppState;

fn required(value: &str, field: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(crate::error::validation_error(
            "Missing required field",
            serde_json::json!({ field: "must not be empty" }),
        ));
    }
    Ok(trimmed.to_string())
}

/// Key rejection at the provider is the caller's problem, not an upstream failure.
fn connection_error(err: FetchError) -> ApiError {
    match err {
        FetchError::Unauthorized { .. } => ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_API_KEY",
            "The provider rejected the API key",
        ),
        other => other.into(),
    }
}

/// Get the tenant's transcript integration settings
#[utoipa::path(
    get,
    path = "/settings/transcripts",
    security(("bearer_auth" = [])),
    params(TenantHeader),
    responses(
        (status = 200, description = "Current settings", body = SettingsView),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    tag = "settings"
)]
pub async fn get_settings(
    State(state): State<AppState>,
    OperatorTenant(tenant_id): OperatorTenant,
) -> Result<Json<SettingsView>, ApiError> {
    let settings = SettingsRepository::new(&state.db, &state.crypto_key)
        .get_or_create(tenant_id)
        .await?;
    Ok(Json(SettingsView::from(&settings)))
}

/// Toggle auto-processing and auto-matching
#[utoipa::path(
    patch,
    path = "/settings/transcripts",
    security(("bearer_auth" = [])),
    params(TenantHeader),
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Updated settings", body = SettingsView),
        (status = 400, description = "Invalid body", body = ApiError)
    ),
    tag = "settings"
)]
pub async fn update_settings(
    State(state): State<AppState>,
    OperatorTenant(tenant_id): OperatorTenant,
    body: Result<Json<UpdateSettingsRequest>, JsonRejection>,
) -> Result<Json<SettingsView>, ApiError> {
    let Json(body) = body?;
    let settings = SettingsRepository::new(&state.db, &state.crypto_key)
        .update_flags(
            tenant_id,
            SettingsUpdate {
                auto_process_enabled: body.auto_process_enabled,
                auto_match_enabled: body.auto_match_enabled,
            },
        )
        .await?;

    info!(
        tenant_id = %tenant_id,
        auto_process_enabled = settings.auto_process_enabled,
        auto_match_enabled = settings.auto_match_enabled,
        "Transcript settings updated"
    );
    Ok(Json(SettingsView::from(&settings)))
}

/// Connect the provider with an API key
///
/// The key is checked against the provider before it is stored.
#[utoipa::path(
    put,
    path = "/settings/transcripts/api-key",
    security(("bearer_auth" = [])),
    params(TenantHeader),
    request_body = ApiKeyRequest,
    responses(
        (status = 200, description = "Connected", body = SettingsView),
        (status = 400, description = "Empty or rejected key", body = ApiError),
        (status = 502, description = "Provider unavailable", body = ApiError)
    ),
    tag = "settings"
)]
pub async fn put_api_key(
    State(state): State<AppState>,
    OperatorTenant(tenant_id): OperatorTenant,
    body: Result<Json<ApiKeyRequest>, JsonRejection>,
) -> Result<Json<SettingsView>, ApiError> {
    let Json(body) = body?;
    let api_key = zeroize::Zeroizing::new(required(&body.api_key, "apiKey")?);

    let account = state
        .provider
        .test_connection(&api_key)
        .await
        .map_err(connection_error)?;

    let settings = SettingsRepository::new(&state.db, &state.crypto_key)
        .connect(tenant_id, &api_key)
        .await?;
    info!(tenant_id = %tenant_id, account = ?account.email, "Provider API key stored");

    Ok(Json(SettingsView::from(&settings)))
}

/// Disconnect the provider
#[utoipa::path(
    delete,
    path = "/settings/transcripts/api-key",
    security(("bearer_auth" = [])),
    params(TenantHeader),
    responses(
        (status = 200, description = "Disconnected", body = SettingsView),
        (status = 404, description = "No settings for tenant", body = ApiError)
    ),
    tag = "settings"
)]
pub async fn delete_api_key(
    State(state): State<AppState>,
    OperatorTenant(tenant_id): OperatorTenant,
) -> Result<Json<SettingsView>, ApiError> {
    let settings = SettingsRepository::new(&state.db, &state.crypto_key)
        .disconnect(tenant_id)
        .await?;
    Ok(Json(SettingsView::from(&settings)))
}

/// Set the webhook signing secret
#[utoipa::path(
    put,
    path = "/settings/transcripts/webhook-secret",
    security(("bearer_auth" = [])),
    params(TenantHeader),
    request_body = WebhookSecretRequest,
    responses(
        (status = 200, description = "Secret stored", body = SettingsView),
        (status = 400, description = "Empty secret", body = ApiError)
    ),
    tag = "settings"
)]
pub async fn put_webhook_secret(
    State(state): State<AppState>,
    OperatorTenant(tenant_id): OperatorTenant,
    body: Result<Json<WebhookSecretRequest>, JsonRejection>,
) -> Result<Json<SettingsView>, ApiError> {
    let Json(body) = body?;
    let secret = zeroize::Zeroizing::new(required(&body.webhook_secret, "webhookSecret")?);

    let settings = SettingsRepository::new(&state.db, &state.crypto_key)
        .set_webhook_secret(tenant_id, Some(&secret))
        .await?;
    info!(tenant_id = %tenant_id, "Webhook secret updated");

    Ok(Json(SettingsView::from(&settings)))
}

/// Clear the webhook signing secret
///
/// Without a secret, deliveries are accepted unsigned.
#[utoipa::path(
    delete,
    path = "/settings/transcripts/webhook-secret",
    security(("bearer_auth" = [])),
    params(TenantHeader),
    responses(
        (status = 200, description = "Secret cleared", body = SettingsView)
    ),
    tag = "settings"
)]
pub async fn delete_webhook_secret(
    State(state): State<AppState>,
    OperatorTenant(tenant_id): OperatorTenant,
) -> Result<Json<SettingsView>, ApiError> {
    let settings = SettingsRepository::new(&state.db, &state.crypto_key)
        .set_webhook_secret(tenant_id, None)
        .await?;
    tracing::warn!(tenant_id = %tenant_id, "Webhook secret cleared; signatures will not be checked");

    Ok(Json(SettingsView::from(&settings)))
}

/// Check the stored API key against the provider
#[utoipa::path(
    post,
    path = "/settings/transcripts/test-connection",
    security(("bearer_auth" = [])),
    params(TenantHeader),
    responses(
        (status = 200, description = "Key accepted", body = ConnectionTestResponse),
        (status = 400, description = "Key rejected", body = ApiError),
        (status = 409, description = "No API key stored", body = ApiError),
        (status = 502, description = "Provider unavailable", body = ApiError)
    ),
    tag = "settings"
)]
pub async fn test_connection(
    State(state): State<AppState>,
    OperatorTenant(tenant_id): OperatorTenant,
) -> Result<Json<ConnectionTestResponse>, ApiError> {
    let repo = SettingsRepository::new(&state.db, &state.crypto_key);
    let settings = repo
        .find(tenant_id)
        .await?
        .ok_or(FetchError::MissingApiKey)?;
    let api_key = repo.api_key(&settings)?.ok_or(FetchError::MissingApiKey)?;

    let account = state
        .provider
        .test_connection(&api_key)
        .await
        .map_err(connection_error)?;

    Ok(Json(ConnectionTestResponse {
        success: true,
        account,
    }))
}
