//! Booking confirmation and cancellation DTOs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Booking, BookingId, BookingSource, BookingStatus, ConfirmSignal};

/// Request body for `POST /bookings/confirm`.
///
/// One of the two confirmation signals (payment settlement or schedule
/// sync). `external_id` is the upstream correlation id and makes the
/// delivery replay-safe.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmBookingRequest {
    /// Customer reference.
    pub user_id: Uuid,
    /// Purchased offer reference.
    pub offer_id: Uuid,
    /// Partner providing the service.
    pub partner_id: Uuid,
    /// Optional offer variant.
    #[serde(default)]
    pub variant_id: Option<Uuid>,
    /// Status asserted by the sender.
    pub status: BookingStatus,
    /// Which upstream system sent the signal.
    pub source: BookingSource,
    /// Gross amount paid, in currency units.
    pub amount: Decimal,
    /// Upstream correlation id (payment intent or calendar event id).
    pub external_id: String,
    /// Scheduled meeting time, if the sender knows it.
    #[serde(default)]
    pub booking_date: Option<DateTime<Utc>>,
    /// Meeting location or conferencing link.
    #[serde(default)]
    pub meeting_location: Option<String>,
}

impl From<ConfirmBookingRequest> for ConfirmSignal {
    fn from(req: ConfirmBookingRequest) -> Self {
        Self {
            user_id: req.user_id,
            offer_id: req.offer_id,
            partner_id: req.partner_id,
            variant_id: req.variant_id,
            status: req.status,
            source: req.source,
            amount: req.amount,
            external_id: req.external_id,
            booking_date: req.booking_date,
            meeting_location: req.meeting_location,
        }
    }
}

/// Response body for `POST /bookings/confirm`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmBookingResponse {
    /// Always `true` on 2xx.
    pub success: bool,
    /// The booking the signal landed on.
    pub booking_id: BookingId,
    /// Booking status after the merge.
    pub status: BookingStatus,
    /// Whether a new row was created (vs. merged into an open one).
    pub created: bool,
    /// Whether this signal moved the booking to `confirmed`.
    pub newly_confirmed: bool,
    /// Whether loyalty points were granted by this call.
    pub points_awarded: bool,
}

/// Request body for `POST /bookings/{id}/cancel`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelBookingRequest {
    /// Free-form cancellation reason.
    #[serde(default)]
    pub reason: Option<String>,
    /// Whether money was returned to the customer.
    #[serde(default)]
    pub refunded: bool,
}

/// Response body for `POST /bookings/{id}/cancel`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CancelBookingResponse {
    /// Always `true` on 2xx.
    pub success: bool,
    /// The cancelled booking.
    pub booking_id: BookingId,
    /// Status after the call; always `cancelled`.
    pub status: BookingStatus,
    /// Whether the booking was already cancelled before this call.
    pub already_cancelled: bool,
    /// Whether earned points were clawed back.
    pub reversal_applied: bool,
}

/// Full booking representation for `GET /bookings/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct BookingDto {
    /// Row identifier.
    pub id: BookingId,
    /// Customer reference.
    pub user_id: Uuid,
    /// Purchased offer reference.
    pub offer_id: Uuid,
    /// Optional offer variant.
    pub variant_id: Option<Uuid>,
    /// Partner providing the service.
    pub partner_id: Uuid,
    /// Lifecycle status.
    pub status: BookingStatus,
    /// Gross amount paid.
    pub amount: Decimal,
    /// Which upstream system created the row.
    pub source: BookingSource,
    /// Upstream correlation id.
    pub external_id: String,
    /// Scheduled meeting time.
    pub booking_date: Option<DateTime<Utc>>,
    /// Meeting location or conferencing link.
    pub meeting_location: Option<String>,
    /// Recorded cancellation reason.
    pub cancellation_reason: Option<String>,
    /// Whether money was returned on cancellation.
    pub refunded: bool,
    /// Whether the booking counts toward partner payouts.
    pub is_payout_eligible: bool,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl From<Booking> for BookingDto {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            user_id: b.user_id,
            offer_id: b.offer_id,
            variant_id: b.variant_id,
            partner_id: b.partner_id,
            status: b.status,
            amount: b.amount,
            source: b.source,
            external_id: b.external_id,
            booking_date: b.booking_date,
            meeting_location: b.meeting_location,
            cancellation_reason: b.cancellation_reason,
            refunded: b.refunded,
            is_payout_eligible: b.is_payout_eligible,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}
