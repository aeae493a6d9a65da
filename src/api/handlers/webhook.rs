//! Inbound processor webhook endpoint.
//!
//! The raw body bytes are verified against the signature header before
//! any JSON parsing; an unverifiable delivery is rejected with 401 and
//! touches no state.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::error::{ErrorResponse, SettlementError};
use crate::processor::{ProcessorEvent, SIGNATURE_HEADER};
use crate::service::SyncOutcome;

/// Webhook acknowledgement body.
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    /// Whether the event changed local state.
    pub applied: bool,
}

/// `POST /webhooks/processor` — Receive a processor event.
///
/// # Errors
///
/// Returns [`SettlementError::WebhookSignature`] for missing or invalid
/// signatures and [`SettlementError::InvalidRequest`] for unparseable
/// payloads.
#[utoipa::path(
    post,
    path = "/webhooks/processor",
    tag = "Webhooks",
    summary = "Receive a processor event",
    description = "Verifies the delivery signature, then applies account capability updates. \
                   Event types this service does not act on are acknowledged so the processor \
                   stops redelivering them.",
    request_body(content = String, description = "Raw signed event payload"),
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAck),
        (status = 401, description = "Signature verification failed", body = ErrorResponse),
        (status = 400, description = "Unparseable payload", body = ErrorResponse),
    )
)]
pub async fn receive_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, SettlementError> {
    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            SettlementError::WebhookSignature("missing signature header".to_string())
        })?;
    state.verifier.verify(&body, header, Utc::now().timestamp())?;

    let event: ProcessorEvent = serde_json::from_slice(&body)
        .map_err(|e| SettlementError::InvalidRequest(format!("malformed event payload: {e}")))?;

    let outcome = state.account_sync.handle(event).await?;
    let applied = matches!(outcome, SyncOutcome::AccountUpdated { .. });
    Ok(Json(WebhookAck { applied }))
}

/// Webhook routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/webhooks/processor", post(receive_event))
}
