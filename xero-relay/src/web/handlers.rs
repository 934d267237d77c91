//! Webhook endpoint handlers.
//!
//! Xero expects a quick answer and only distinguishes three outcomes:
//! accepted (200), bad signature (401), and anything else (500). Per-event
//! failures are never surfaced to the sender.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::catalog::CatalogSchema;
use crate::dispatch::{DispatchStatus, WebhookDispatcher, WebhookRequest};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<WebhookDispatcher>,
}

impl AppState {
    pub fn new(config: Config, dispatcher: WebhookDispatcher) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/schemas/:record_name", get(catalog_schema))
        .route("/xero", post(xero_webhook))
        .route("/xero/", post(xero_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Catalog Schemas
// =============================================================================

/// JSON Schema document for a catalog record name, e.g. `xeroInvoice`.
pub async fn catalog_schema(Path(record_name): Path<String>) -> Result<Json<Value>, StatusCode> {
    match CatalogSchema::for_record_name(&record_name) {
        Some(schema) => Ok(Json(schema.json_schema())),
        None => {
            warn!(record_name = %record_name, "catalog_schema_unknown");
            Err(StatusCode::NOT_FOUND)
        }
    }
}

// =============================================================================
// Xero Webhook
// =============================================================================

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub message: String,
}

impl WebhookResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// Xero webhook endpoint.
///
/// Takes the body as raw bytes: the signature covers the exact bytes sent,
/// so nothing may be parsed or re-encoded before verification.
pub async fn xero_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let span = info_span!(
        "xero_webhook",
        run_id = state.config.run_id.as_deref().unwrap_or_default()
    );

    async move {
        info!(body_length = body.len(), "xero_webhook_received");

        if state.config.run_id.is_some() {
            debug!(body = %String::from_utf8_lossy(&body), "xero_webhook_body");
        }

        let request = WebhookRequest { headers, body };
        let report = state.dispatcher.handle(&request).await;

        match report.status {
            DispatchStatus::Completed => (
                StatusCode::OK,
                WebhookResponse::new("Webhook received successfully"),
            ),
            DispatchStatus::Replayed(reason) => {
                info!(reason = %reason, "xero_webhook_replay_acknowledged");
                (
                    StatusCode::OK,
                    WebhookResponse::new("Webhook received successfully"),
                )
            }
            DispatchStatus::Rejected(verdict) => {
                warn!(reason = verdict.reason(), "xero_webhook_unauthorized");
                (
                    StatusCode::UNAUTHORIZED,
                    WebhookResponse::new("Unauthorized - Invalid signature"),
                )
            }
            DispatchStatus::MalformedPayload(detail)
            | DispatchStatus::CredentialsUnavailable(detail) => {
                error!(detail = %detail, "xero_webhook_failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    WebhookResponse::new(format!("Error processing webhook: {detail}")),
                )
            }
        }
    }
    .instrument(span)
    .await
}
