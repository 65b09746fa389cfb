//! # Server Configuration
//!
//! Router assembly, shared state and the serve loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::auth_middleware;
use crate::config::AppConfig;
use crate::crypto::CryptoKey;
use crate::handlers;
use crate::notifications::Notifier;
use crate::provider::{GraphqlTranscriptClient, TranscriptProvider};
use crate::telemetry;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub crypto_key: CryptoKey,
    pub provider: Arc<dyn TranscriptProvider>,
    pub notifier: Notifier,
}

impl AppState {
    /// Wire the production provider client and notifier from configuration.
    pub fn from_config(config: AppConfig, db: DatabaseConnection) -> Result<Self> {
        let key_bytes = config
            .crypto_key
            .clone()
            .context("INTAKE_CRYPTO_KEY is required")?;
        let crypto_key = CryptoKey::new(key_bytes).context("invalid crypto key")?;
        let provider = GraphqlTranscriptClient::new(&config.provider)
            .context("failed to build provider HTTP client")?;
        let notifier = Notifier::new(config.notify_webhook_url.clone())
            .context("failed to build notification HTTP client")?;

        Ok(Self {
            config: Arc::new(config),
            db,
            crypto_key,
            provider: Arc::new(provider),
            notifier,
        })
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let operator_routes = Router::new()
        .route(
            "/settings/transcripts",
            get(handlers::settings::get_settings).patch(handlers::settings::update_settings),
        )
        .route(
            "/settings/transcripts/api-key",
            put(handlers::settings::put_api_key).delete(handlers::settings::delete_api_key),
        )
        .route(
            "/settings/transcripts/webhook-secret",
            put(handlers::settings::put_webhook_secret)
                .delete(handlers::settings::delete_webhook_secret),
        )
        .route(
            "/settings/transcripts/test-connection",
            post(handlers::settings::test_connection),
        )
        .route(
            "/transcripts/manual-match",
            post(handlers::manual_match::manual_match),
        )
        .route(
            "/unmatched-meetings",
            get(handlers::review::list_unmatched_meetings),
        )
        .route("/webhook-events", get(handlers::review::list_webhook_events))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth_middleware,
        ));

    let public_routes = Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/webhooks/transcripts", get(handlers::webhooks::webhook_health))
        .route(
            "/webhooks/transcripts/{tenant_id}",
            post(handlers::webhooks::receive_transcript_webhook)
                .get(handlers::webhooks::tenant_webhook_health),
        );

    Router::new()
        .merge(public_routes)
        .merge(operator_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(telemetry::trace_context_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve until `shutdown` is cancelled.
pub async fn run_server(
    config: AppConfig,
    db: DatabaseConnection,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = config
        .bind_addr()
        .with_context(|| format!("invalid bind address {}", config.api_bind_addr))?;
    let profile = config.profile.clone();

    let state = AppState::from_config(config, db)?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(%addr, %profile, "Transcript intake listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::webhooks::receive_transcript_webhook,
        crate::handlers::webhooks::tenant_webhook_health,
        crate::handlers::webhooks::webhook_health,
        crate::handlers::manual_match::manual_match,
        crate::handlers::settings::get_settings,
        crate::handlers::settings::update_settings,
        crate::handlers::settings::put_api_key,
        crate::handlers::settings::delete_api_key,
        crate::handlers::settings::put_webhook_secret,
        crate::handlers::settings::delete_webhook_secret,
        crate::handlers::settings::test_connection,
        crate::handlers::review::list_unmatched_meetings,
        crate::handlers::review::list_webhook_events,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthResponse,
            crate::error::ApiError,
            crate::error::ProviderError,
            crate::pipeline::WebhookPayload,
            crate::handlers::types::WebhookResponse,
            crate::handlers::types::WebhookFailure,
            crate::handlers::types::WebhookHealthResponse,
            crate::manual_match::ManualMatchRequest,
            crate::manual_match::CreateCallRequest,
            crate::manual_match::ManualMatchResponse,
            crate::handlers::types::SettingsView,
            crate::handlers::types::UpdateSettingsRequest,
            crate::handlers::types::ApiKeyRequest,
            crate::handlers::types::WebhookSecretRequest,
            crate::handlers::types::ConnectionTestResponse,
            crate::provider::ProviderAccount,
            crate::handlers::types::UnmatchedMeetingView,
            crate::handlers::types::UnmatchedMeetingList,
            crate::handlers::types::WebhookEventView,
            crate::handlers::types::WebhookEventList,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Transcript Intake API",
        description = "Meeting transcript ingestion, matching and manual review",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
