//! Booking confirmation and cancellation endpoint handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    BookingDto, CancelBookingRequest, CancelBookingResponse, ConfirmBookingRequest,
    ConfirmBookingResponse,
};
use crate::app_state::AppState;
use crate::domain::BookingId;
use crate::error::{ErrorResponse, SettlementError};

/// `POST /bookings/confirm` — Apply one confirmation signal.
///
/// Safe to replay: redelivering the same `external_id` returns the
/// booking the signal already landed on.
///
/// # Errors
///
/// Returns [`SettlementError`] on invalid signal fields.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/confirm",
    tag = "Bookings",
    summary = "Apply a confirmation signal",
    description = "Applies a payment or schedule confirmation signal. Two signals for the same \
                   reservation merge into one booking regardless of arrival order.",
    request_body = ConfirmBookingRequest,
    responses(
        (status = 200, description = "Signal applied", body = ConfirmBookingResponse),
        (status = 400, description = "Invalid signal", body = ErrorResponse),
    )
)]
pub async fn confirm_booking(
    State(state): State<AppState>,
    Json(req): Json<ConfirmBookingRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let outcome = state.bookings.confirm(req.into()).await?;
    Ok(Json(ConfirmBookingResponse {
        success: true,
        booking_id: outcome.booking.id,
        status: outcome.booking.status,
        created: outcome.created,
        newly_confirmed: outcome.newly_confirmed,
        points_awarded: outcome.points_awarded,
    }))
}

/// `POST /bookings/:id/cancel` — Cancel a booking.
///
/// # Errors
///
/// Returns [`SettlementError`] when the booking does not exist.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/cancel",
    tag = "Bookings",
    summary = "Cancel a booking",
    description = "Cancels a booking. A refunded cancellation claws back the points the booking \
                   earned; repeating the call is a no-op.",
    params(
        ("id" = uuid::Uuid, Path, description = "Booking UUID"),
    ),
    request_body = CancelBookingRequest,
    responses(
        (status = 200, description = "Booking cancelled", body = CancelBookingResponse),
        (status = 404, description = "Booking not found", body = ErrorResponse),
    )
)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<CancelBookingRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let outcome = state
        .bookings
        .cancel(BookingId::from_uuid(id), req.reason, req.refunded)
        .await?;
    Ok(Json(CancelBookingResponse {
        success: true,
        booking_id: outcome.booking.id,
        status: outcome.booking.status,
        already_cancelled: outcome.already_cancelled,
        reversal_applied: outcome.reversal_applied,
    }))
}

/// `GET /bookings/:id` — Fetch a booking.
///
/// # Errors
///
/// Returns [`SettlementError`] when the booking does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/bookings/{id}",
    tag = "Bookings",
    summary = "Get a booking",
    params(
        ("id" = uuid::Uuid, Path, description = "Booking UUID"),
    ),
    responses(
        (status = 200, description = "Booking found", body = BookingDto),
        (status = 404, description = "Booking not found", body = ErrorResponse),
    )
)]
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    let booking = state.bookings.get(BookingId::from_uuid(id)).await?;
    Ok(Json(BookingDto::from(booking)))
}

/// Booking routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookings/confirm", post(confirm_booking))
        .route("/bookings/{id}/cancel", post(cancel_booking))
        .route("/bookings/{id}", get(get_booking))
}
