//! The `LedgerStore` trait: transactional operations over the ledger.
//!
//! This trait abstracts the durable ledger (PostgreSQL in production, an
//! in-memory double in tests). Operations are deliberately coarse: each
//! method is one atomic unit, so a crash can never leave a booking
//! confirmed without its reward attempt recorded, or a payout paid
//! without its transfer id.
//!
//! Methods return `impl Future + Send` rather than plain `async fn` so
//! callers can be held to axum's `Send` handler bound and spawned onto
//! the runtime; implementations still use `async fn`.

use std::future::Future;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{
    Booking, BookingId, ConfirmSignal, Partner, Payout, PayoutId, PayoutPeriod,
};
use crate::error::SettlementError;

/// Result of applying a confirmation signal.
#[derive(Debug, Clone)]
pub struct ConfirmOutcome {
    /// The booking row after the signal was applied (or the unchanged
    /// row on a correlation-id replay).
    pub booking: Booking,
    /// Whether this signal created the row.
    pub created: bool,
    /// Whether this signal transitioned the booking into `confirmed`.
    pub newly_confirmed: bool,
    /// Whether a reward earn entry was written for this transition.
    pub points_awarded: bool,
}

/// Result of a cancellation.
#[derive(Debug, Clone)]
pub struct CancelOutcome {
    /// The booking row after cancellation.
    pub booking: Booking,
    /// Whether the booking was already cancelled (idempotent no-op).
    pub already_cancelled: bool,
    /// Whether a reward reversal entry was written.
    pub reversal_applied: bool,
}

/// Result of a reward award.
#[derive(Debug, Clone, Copy)]
pub struct AwardOutcome {
    /// Whether the entry was applied (`false` on a duplicate
    /// booking-derived award, which is a logged no-op).
    pub applied: bool,
    /// The user's balance after the call.
    pub balance: i64,
}

/// Per-partner sum of eligible booking amounts in a period.
#[derive(Debug, Clone)]
pub struct PartnerPeriodTotal {
    /// Partner reference.
    pub partner_id: Uuid,
    /// Sum of eligible booking amounts.
    pub total: Decimal,
    /// The partner's commission fraction at aggregation time.
    pub commission_rate: Decimal,
}

/// Durable relational storage for bookings, reward entries, payouts, and
/// partner processor accounts.
pub trait LedgerStore: Send + Sync {
    /// Applies a confirmation signal: correlation-id replay check,
    /// find-or-create on the logical booking key, per-field merge,
    /// status transition, and the guarded reward earn — all in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    fn apply_confirmation(
        &self,
        signal: ConfirmSignal,
    ) -> impl Future<Output = Result<ConfirmOutcome, SettlementError>> + Send;

    /// Cancels a booking, clearing payout eligibility. When `refunded`,
    /// writes exactly one reversal of the originally earned points in
    /// the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::BookingNotFound`] for unknown ids.
    fn cancel_booking(
        &self,
        id: BookingId,
        reason: Option<String>,
        refunded: bool,
    ) -> impl Future<Output = Result<CancelOutcome, SettlementError>> + Send;

    /// Fetches a booking by id.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::BookingNotFound`] for unknown ids.
    fn booking(
        &self,
        id: BookingId,
    ) -> impl Future<Output = Result<Booking, SettlementError>> + Send;

    /// Appends a reward entry and updates the user's balance in one
    /// transaction. Booking-derived entries are guarded by the
    /// per-booking `(booking_id, kind)` uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::UserNotFound`] for unknown users.
    fn award_points(
        &self,
        user_id: Uuid,
        amount: i64,
        reason: &str,
        booking_id: Option<Uuid>,
        metadata: serde_json::Value,
    ) -> impl Future<Output = Result<AwardOutcome, SettlementError>> + Send;

    /// Reads the user's materialized point balance (zero when the user
    /// has no entries).
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    fn reward_balance(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<i64, SettlementError>> + Send;

    /// Fetches a partner by id.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PartnerNotFound`] for unknown ids.
    fn partner(&self, id: Uuid) -> impl Future<Output = Result<Partner, SettlementError>> + Send;

    /// Sums eligible confirmed bookings per partner for the period.
    /// Partners with no eligible bookings are absent from the result.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    fn eligible_totals(
        &self,
        period: &PayoutPeriod,
    ) -> impl Future<Output = Result<Vec<PartnerPeriodTotal>, SettlementError>> + Send;

    /// Inserts a payout, keyed on partner+period. Returns `false` when a
    /// payout for that partner and period already exists.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    fn insert_payout(
        &self,
        payout: &Payout,
    ) -> impl Future<Output = Result<bool, SettlementError>> + Send;

    /// Fetches a payout by id.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PayoutNotFound`] for unknown ids.
    fn payout(&self, id: PayoutId) -> impl Future<Output = Result<Payout, SettlementError>> + Send;

    /// Lists ids of all `pending` payouts, for the executor sweep.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    fn pending_payouts(&self) -> impl Future<Output = Result<Vec<PayoutId>, SettlementError>> + Send;

    /// Marks a payout `paid` with its transfer id. A payout already
    /// `paid` is returned unchanged — `paid` is terminal.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PayoutNotFound`] for unknown ids.
    fn mark_payout_paid(
        &self,
        id: PayoutId,
        transfer_id: &str,
    ) -> impl Future<Output = Result<Payout, SettlementError>> + Send;

    /// Marks a payout `failed` with the processor's error text, leaving
    /// it eligible for retry. Never downgrades a `paid` payout.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PayoutNotFound`] for unknown ids.
    fn mark_payout_failed(
        &self,
        id: PayoutId,
        error: &str,
    ) -> impl Future<Output = Result<Payout, SettlementError>> + Send;

    /// Writes the processor-asserted `charges_enabled` capability (and
    /// payout schedule, when present) for the partner owning the given
    /// connected account. This is the only writer of that flag. Returns
    /// `false` when no partner owns the account id.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PersistenceError`] on storage failure.
    fn set_charges_enabled(
        &self,
        processor_account_id: &str,
        enabled: bool,
        payout_schedule: Option<&str>,
    ) -> impl Future<Output = Result<bool, SettlementError>> + Send;
}
