//! Booking state machine and two-signal confirmation merge.
//!
//! A logical booking is materialized from two independent, order-
//! unconstrained external signals: payment settlement and slot
//! scheduling. Whichever arrives first creates the row in the state it
//! can assert on its own; the second signal merges into the existing row
//! (last-write-wins per field) and flips the status toward `confirmed`.
//! The merge is a pure function so both the PostgreSQL and the in-memory
//! ledger apply identical semantics.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::ids::BookingId;
use crate::error::SettlementError;

/// Lifecycle state of a booking.
///
/// `pending → confirmed` and `pending → cancelled` happen at most once
/// per correlation id; `confirmed → cancelled` only via the explicit
/// cancellation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Reservation intent recorded, waiting for the other signal.
    Pending,
    /// Both conditions satisfied (or one authoritative signal seen).
    Confirmed,
    /// Explicitly cancelled, optionally with a refund.
    Cancelled,
}

impl BookingStatus {
    /// Returns the database/wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses the database/wire representation.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidValue`] for unknown strings.
    pub fn parse(s: &str) -> Result<Self, SettlementError> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(SettlementError::InvalidValue(format!(
                "unknown booking status '{other}'"
            ))),
        }
    }
}

/// Origin of a confirmation signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BookingSource {
    /// Payment settlement event from the payments processor.
    Stripe,
    /// Slot-scheduling event from the scheduling provider.
    Calendly,
    /// Operator-entered booking.
    Manual,
}

impl BookingSource {
    /// Returns the database/wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
            Self::Calendly => "calendly",
            Self::Manual => "manual",
        }
    }

    /// Parses the database/wire representation.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidValue`] for unknown strings.
    pub fn parse(s: &str) -> Result<Self, SettlementError> {
        match s {
            "stripe" => Ok(Self::Stripe),
            "calendly" => Ok(Self::Calendly),
            "manual" => Ok(Self::Manual),
            other => Err(SettlementError::InvalidValue(format!(
                "unknown booking source '{other}'"
            ))),
        }
    }
}

/// One customer's claim on one offer (or offer variant).
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    /// Row identifier.
    pub id: BookingId,
    /// Customer reference.
    pub user_id: Uuid,
    /// Offer reference.
    pub offer_id: Uuid,
    /// Optional offer variant reference.
    pub variant_id: Option<Uuid>,
    /// Partner owning the offer, denormalized for payout aggregation.
    pub partner_id: Uuid,
    /// Lifecycle state.
    pub status: BookingStatus,
    /// Monetary amount; immutable once confirmed.
    pub amount: Decimal,
    /// Signal origin that last advanced the state.
    pub source: BookingSource,
    /// Correlation id of the signal that created the row.
    pub external_id: String,
    /// Scheduled meeting time, when known.
    pub booking_date: Option<DateTime<Utc>>,
    /// Meeting location / join link, when known.
    pub meeting_location: Option<String>,
    /// Free-text cancellation reason, operators only.
    pub cancellation_reason: Option<String>,
    /// Whether the cancellation carried a refund.
    pub refunded: bool,
    /// Whether this booking counts toward the partner's next payout.
    pub is_payout_eligible: bool,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

/// A validated confirmation signal (payment settled, slot scheduled, or
/// a manual entry), ready to be applied to the ledger.
#[derive(Debug, Clone)]
pub struct ConfirmSignal {
    /// Customer reference.
    pub user_id: Uuid,
    /// Offer reference.
    pub offer_id: Uuid,
    /// Partner owning the offer.
    pub partner_id: Uuid,
    /// Optional offer variant reference.
    pub variant_id: Option<Uuid>,
    /// State this signal asserts on its own: `pending` when the other
    /// condition is still outstanding, `confirmed` when the signal alone
    /// is authoritative (e.g. a direct paid purchase).
    pub status: BookingStatus,
    /// Signal origin.
    pub source: BookingSource,
    /// Monetary amount carried by the signal.
    pub amount: Decimal,
    /// The external event's idempotency key.
    pub external_id: String,
    /// Scheduled meeting time, when the signal carries one.
    pub booking_date: Option<DateTime<Utc>>,
    /// Meeting location, when the signal carries one.
    pub meeting_location: Option<String>,
}

impl ConfirmSignal {
    /// Checks the signal's structural constraints.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidRequest`] when identifying
    /// fields are absent, the amount is negative, or the asserted state
    /// is not reachable through confirmation.
    pub fn validate(&self) -> Result<(), SettlementError> {
        if self.user_id.is_nil() {
            return Err(SettlementError::InvalidRequest(
                "user_id is required".to_string(),
            ));
        }
        if self.offer_id.is_nil() {
            return Err(SettlementError::InvalidRequest(
                "offer_id is required".to_string(),
            ));
        }
        if self.partner_id.is_nil() {
            return Err(SettlementError::InvalidRequest(
                "partner_id is required".to_string(),
            ));
        }
        if self.external_id.trim().is_empty() {
            return Err(SettlementError::InvalidRequest(
                "external_id is required".to_string(),
            ));
        }
        if self.amount < Decimal::ZERO {
            return Err(SettlementError::InvalidRequest(
                "amount must be non-negative".to_string(),
            ));
        }
        if self.status == BookingStatus::Cancelled {
            return Err(SettlementError::InvalidRequest(
                "cancellation must go through the cancel operation".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of applying a confirmation signal to an existing booking row.
#[derive(Debug, Clone)]
pub struct SignalMerge {
    /// The merged booking.
    pub booking: Booking,
    /// Whether this signal transitioned the booking into `confirmed`.
    pub newly_confirmed: bool,
}

/// Materializes a brand-new booking row from the first observed signal.
#[must_use]
pub fn booking_from_signal(id: BookingId, signal: &ConfirmSignal, now: DateTime<Utc>) -> Booking {
    let confirmed = signal.status == BookingStatus::Confirmed;
    Booking {
        id,
        user_id: signal.user_id,
        offer_id: signal.offer_id,
        variant_id: signal.variant_id,
        partner_id: signal.partner_id,
        status: signal.status,
        amount: signal.amount,
        source: signal.source,
        external_id: signal.external_id.clone(),
        booking_date: signal.booking_date,
        meeting_location: signal.meeting_location.clone(),
        cancellation_reason: None,
        refunded: false,
        is_payout_eligible: confirmed,
        created_at: now,
        updated_at: now,
    }
}

/// Merges a later-arriving signal into an existing booking row.
///
/// Per-field last-write-wins: a field the new signal carries overwrites
/// the stored value (a real meeting location replaces an earlier
/// placeholder), a field it does not carry is left alone. The status only
/// moves forward: `pending` flips to `confirmed` when the signal asserts
/// it; a row already `confirmed` keeps its status and amount. Cancelled
/// rows are never reached here — the store only merges into pending or
/// confirmed rows.
#[must_use]
pub fn merge_signal(existing: &Booking, signal: &ConfirmSignal, now: DateTime<Utc>) -> SignalMerge {
    let mut booking = existing.clone();
    let newly_confirmed =
        existing.status == BookingStatus::Pending && signal.status == BookingStatus::Confirmed;

    if let Some(date) = signal.booking_date {
        booking.booking_date = Some(date);
    }
    if let Some(location) = &signal.meeting_location {
        booking.meeting_location = Some(location.clone());
    }
    if signal.variant_id.is_some() {
        booking.variant_id = signal.variant_id;
    }

    // Amount is immutable once confirmed; while pending, a signal that
    // carries a real amount wins over a zero placeholder.
    if existing.status == BookingStatus::Pending && signal.amount > Decimal::ZERO {
        booking.amount = signal.amount;
    }

    if newly_confirmed {
        booking.status = BookingStatus::Confirmed;
        booking.source = signal.source;
        booking.is_payout_eligible = true;
    }
    booking.updated_at = now;

    SignalMerge {
        booking,
        newly_confirmed,
    }
}

/// Applies a cancellation to a booking.
///
/// Returns the cancelled booking, or `None` if the booking was already
/// cancelled (idempotent no-op for the caller to report).
#[must_use]
pub fn cancel(
    existing: &Booking,
    reason: Option<String>,
    refunded: bool,
    now: DateTime<Utc>,
) -> Option<Booking> {
    if existing.status == BookingStatus::Cancelled {
        return None;
    }
    let mut booking = existing.clone();
    booking.status = BookingStatus::Cancelled;
    booking.cancellation_reason = reason;
    booking.refunded = refunded;
    booking.is_payout_eligible = false;
    booking.updated_at = now;
    Some(booking)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn payment_signal(external_id: &str) -> ConfirmSignal {
        ConfirmSignal {
            user_id: Uuid::from_u128(1),
            offer_id: Uuid::from_u128(2),
            partner_id: Uuid::from_u128(3),
            variant_id: None,
            status: BookingStatus::Confirmed,
            source: BookingSource::Stripe,
            amount: Decimal::new(10_000, 2), // 100.00
            external_id: external_id.to_string(),
            booking_date: None,
            meeting_location: None,
        }
    }

    fn schedule_signal(external_id: &str) -> ConfirmSignal {
        ConfirmSignal {
            user_id: Uuid::from_u128(1),
            offer_id: Uuid::from_u128(2),
            partner_id: Uuid::from_u128(3),
            variant_id: None,
            status: BookingStatus::Pending,
            source: BookingSource::Calendly,
            amount: Decimal::ZERO,
            external_id: external_id.to_string(),
            booking_date: Some(Utc::now()),
            meeting_location: Some("https://meet.example/abc".to_string()),
        }
    }

    #[test]
    fn validation_rejects_missing_user() {
        let mut signal = payment_signal("evt-1");
        signal.user_id = Uuid::nil();
        assert!(signal.validate().is_err());
    }

    #[test]
    fn validation_rejects_negative_amount() {
        let mut signal = payment_signal("evt-1");
        signal.amount = Decimal::new(-1, 0);
        assert!(signal.validate().is_err());
    }

    #[test]
    fn merge_is_order_independent() {
        let now = Utc::now();
        let pay = payment_signal("evt-pay");
        let sched = schedule_signal("evt-sched");

        // Payment first, schedule second.
        let first = booking_from_signal(BookingId::new(), &pay, now);
        let a = merge_signal(&first, &sched, now);

        // Schedule first, payment second.
        let second = booking_from_signal(BookingId::new(), &sched, now);
        let b = merge_signal(&second, &pay, now);

        assert_eq!(a.booking.status, BookingStatus::Confirmed);
        assert_eq!(b.booking.status, BookingStatus::Confirmed);
        assert_eq!(a.booking.amount, b.booking.amount);
        assert_eq!(a.booking.meeting_location, b.booking.meeting_location);
        assert_eq!(a.booking.booking_date.is_some(), b.booking.booking_date.is_some());
        assert!(b.newly_confirmed);
        // Payment-first was already confirmed, so the schedule merge
        // carries no second transition.
        assert!(!a.newly_confirmed);
    }

    #[test]
    fn later_meeting_location_overwrites_placeholder() {
        let now = Utc::now();
        let mut sched = schedule_signal("evt-sched");
        sched.meeting_location = Some("TBD".to_string());
        let row = booking_from_signal(BookingId::new(), &sched, now);

        let mut update = schedule_signal("evt-sched-2");
        update.meeting_location = Some("https://meet.example/real".to_string());
        let merged = merge_signal(&row, &update, now);

        assert_eq!(
            merged.booking.meeting_location.as_deref(),
            Some("https://meet.example/real")
        );
    }

    #[test]
    fn amount_is_immutable_once_confirmed() {
        let now = Utc::now();
        let row = booking_from_signal(BookingId::new(), &payment_signal("evt-pay"), now);
        let mut late = schedule_signal("evt-late");
        late.amount = Decimal::new(999_00, 2);
        let merged = merge_signal(&row, &late, now);
        assert_eq!(merged.booking.amount, Decimal::new(10_000, 2));
    }

    #[test]
    fn cancel_clears_eligibility_and_is_idempotent() {
        let now = Utc::now();
        let row = booking_from_signal(BookingId::new(), &payment_signal("evt-pay"), now);
        assert!(row.is_payout_eligible);

        let Some(cancelled) = cancel(&row, Some("customer request".to_string()), true, now)
        else {
            panic!("first cancel must apply");
        };
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert!(cancelled.refunded);
        assert!(!cancelled.is_payout_eligible);

        assert!(cancel(&cancelled, None, false, now).is_none());
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
        ] {
            let Ok(parsed) = BookingStatus::parse(status.as_str()) else {
                panic!("round trip failed");
            };
            assert_eq!(parsed, status);
        }
        assert!(BookingStatus::parse("refunded").is_err());
    }
}
