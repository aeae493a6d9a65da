//! Payout aggregation and execution endpoint handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    ExecutePayoutResponse, GeneratePayoutsRequest, GeneratePayoutsResponse, PayoutDto,
    SweepResponse,
};
use crate::app_state::AppState;
use crate::domain::PayoutId;
use crate::error::{ErrorResponse, SettlementError};

/// `POST /payouts/generate` — Aggregate a closed period into payouts.
///
/// # Errors
///
/// Returns [`SettlementError`] only when the period scan fails;
/// partner-local failures land in the response body.
#[utoipa::path(
    post,
    path = "/api/v1/payouts/generate",
    tag = "Payouts",
    summary = "Generate payouts for a closed period",
    description = "Aggregates eligible confirmed bookings of the closed calendar month into one \
                   pending payout per partner. Re-running for the same period creates nothing new.",
    request_body = GeneratePayoutsRequest,
    responses(
        (status = 200, description = "Aggregation finished", body = GeneratePayoutsResponse),
        (status = 500, description = "Period scan failed", body = ErrorResponse),
    )
)]
pub async fn generate_payouts(
    State(state): State<AppState>,
    Json(req): Json<GeneratePayoutsRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let summary = state.payouts.generate(req.reference_date).await?;
    Ok(Json(GeneratePayoutsResponse::from(summary)))
}

/// `POST /payouts/:id/execute` — Move funds for one payout.
///
/// # Errors
///
/// Returns [`SettlementError`] when the payout or its partner does not
/// exist.
#[utoipa::path(
    post,
    path = "/api/v1/payouts/{id}/execute",
    tag = "Payouts",
    summary = "Execute a payout",
    description = "Transfers the net amount to the partner's connected account. Paid payouts are \
                   never re-sent; partners not yet able to receive transfers leave the payout \
                   pending.",
    params(
        ("id" = uuid::Uuid, Path, description = "Payout UUID"),
    ),
    responses(
        (status = 200, description = "Execution attempted", body = ExecutePayoutResponse),
        (status = 404, description = "Payout not found", body = ErrorResponse),
        (status = 502, description = "Processor unreachable", body = ErrorResponse),
    )
)]
pub async fn execute_payout(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    let payout_id = PayoutId::from_uuid(id);
    let outcome = state.payouts.execute(payout_id).await?;
    Ok(Json(ExecutePayoutResponse::from_outcome(payout_id, outcome)))
}

/// `POST /payouts/execute-pending` — Sweep all pending payouts.
///
/// # Errors
///
/// Returns [`SettlementError`] only when the pending scan fails.
#[utoipa::path(
    post,
    path = "/api/v1/payouts/execute-pending",
    tag = "Payouts",
    summary = "Execute all pending payouts",
    description = "Attempts every pending payout in turn. Failures are isolated per payout and \
                   reported in the response body.",
    responses(
        (status = 200, description = "Sweep finished", body = SweepResponse),
        (status = 500, description = "Pending scan failed", body = ErrorResponse),
    )
)]
pub async fn execute_pending(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, SettlementError> {
    let summary = state.payouts.execute_pending().await?;
    Ok(Json(SweepResponse::from(summary)))
}

/// `GET /payouts/:id` — Fetch a payout.
///
/// # Errors
///
/// Returns [`SettlementError`] when the payout does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/payouts/{id}",
    tag = "Payouts",
    summary = "Get a payout",
    params(
        ("id" = uuid::Uuid, Path, description = "Payout UUID"),
    ),
    responses(
        (status = 200, description = "Payout found", body = PayoutDto),
        (status = 404, description = "Payout not found", body = ErrorResponse),
    )
)]
pub async fn get_payout(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    let payout = state.payouts.get(PayoutId::from_uuid(id)).await?;
    Ok(Json(PayoutDto::from(payout)))
}

/// Payout routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payouts/generate", post(generate_payouts))
        .route("/payouts/execute-pending", post(execute_pending))
        .route("/payouts/{id}/execute", post(execute_payout))
        .route("/payouts/{id}", get(get_payout))
}
