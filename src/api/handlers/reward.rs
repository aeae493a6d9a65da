//! Loyalty point endpoint handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{AwardPointsRequest, AwardPointsResponse, BalanceResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, SettlementError};

/// `POST /rewards/award` — Grant or claw back points.
///
/// # Errors
///
/// Returns [`SettlementError`] on a zero amount, an empty reason, or an
/// unknown user.
#[utoipa::path(
    post,
    path = "/api/v1/rewards/award",
    tag = "Rewards",
    summary = "Award loyalty points",
    description = "Appends a signed entry to the customer's point ledger. Awards carrying a \
                   booking_id in metadata are deduplicated per booking.",
    request_body = AwardPointsRequest,
    responses(
        (status = 200, description = "Award processed", body = AwardPointsResponse),
        (status = 400, description = "Invalid award", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    )
)]
pub async fn award_points(
    State(state): State<AppState>,
    Json(req): Json<AwardPointsRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let outcome = state
        .rewards
        .award(req.user_id, req.amount, &req.reason, req.metadata)
        .await?;
    Ok(Json(AwardPointsResponse {
        success: true,
        applied: outcome.applied,
        balance: outcome.balance,
    }))
}

/// `GET /rewards/:user_id/balance` — Current point balance.
///
/// A user without ledger entries reads as zero; the endpoint never 404s.
///
/// # Errors
///
/// Returns [`SettlementError`] on a persistence failure.
#[utoipa::path(
    get,
    path = "/api/v1/rewards/{user_id}/balance",
    tag = "Rewards",
    summary = "Get a point balance",
    params(
        ("user_id" = uuid::Uuid, Path, description = "Customer UUID"),
    ),
    responses(
        (status = 200, description = "Current balance, zero for users without entries", body = BalanceResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    let balance = state.rewards.balance(user_id).await?;
    Ok(Json(BalanceResponse { user_id, balance }))
}

/// Reward routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rewards/award", post(award_points))
        .route("/rewards/{user_id}/balance", get(get_balance))
}
