//! Booking confirmation service.
//!
//! Validates confirmation signals and drives the ledger's atomic
//! find-or-create/merge/transition operation. Duplicate signals and
//! repeated cancellations are no-ops, reported as such rather than as
//! errors.

use std::sync::Arc;

use crate::domain::{Booking, BookingId, ConfirmSignal};
use crate::error::SettlementError;
use crate::persistence::{CancelOutcome, ConfirmOutcome, LedgerStore};

/// Orchestrates the booking confirmation and cancellation flow.
#[derive(Debug, Clone)]
pub struct BookingService<L> {
    ledger: Arc<L>,
}

impl<L: LedgerStore> BookingService<L> {
    /// Creates a new `BookingService`.
    #[must_use]
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// Applies one confirmation signal (payment settled, slot scheduled,
    /// or a manual entry).
    ///
    /// Calling this twice with the same correlation id produces no
    /// duplicate row and no second reward earn.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidRequest`] on validation failure
    /// or a persistence error from the ledger.
    pub async fn confirm(&self, signal: ConfirmSignal) -> Result<ConfirmOutcome, SettlementError> {
        signal.validate()?;
        let external_id = signal.external_id.clone();
        let outcome = self.ledger.apply_confirmation(signal).await?;

        if outcome.newly_confirmed {
            tracing::info!(
                booking_id = %outcome.booking.id,
                external_id,
                points_awarded = outcome.points_awarded,
                "booking confirmed"
            );
        } else if outcome.created {
            tracing::info!(booking_id = %outcome.booking.id, external_id, "booking recorded as pending");
        } else {
            tracing::info!(booking_id = %outcome.booking.id, external_id, "confirmation signal merged or replayed");
        }
        Ok(outcome)
    }

    /// Cancels a booking, reversing the reward earn when the
    /// cancellation carries a refund.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::BookingNotFound`] for unknown ids.
    pub async fn cancel(
        &self,
        id: BookingId,
        reason: Option<String>,
        refunded: bool,
    ) -> Result<CancelOutcome, SettlementError> {
        let outcome = self.ledger.cancel_booking(id, reason, refunded).await?;
        if outcome.already_cancelled {
            tracing::info!(booking_id = %id, "cancellation replayed; booking already cancelled");
        } else {
            tracing::info!(
                booking_id = %id,
                refunded,
                reversal_applied = outcome.reversal_applied,
                "booking cancelled"
            );
        }
        Ok(outcome)
    }

    /// Fetches a booking by id.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::BookingNotFound`] for unknown ids.
    pub async fn get(&self, id: BookingId) -> Result<Booking, SettlementError> {
        self.ledger.booking(id).await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::*;
    use crate::domain::{BookingSource, BookingStatus};
    use crate::persistence::MemoryLedger;

    fn harness() -> (BookingService<MemoryLedger>, Arc<MemoryLedger>) {
        let ledger = Arc::new(MemoryLedger::new());
        (BookingService::new(Arc::clone(&ledger)), ledger)
    }

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
            status: BookingStatus::Pending,
            source: BookingSource::Calendly,
            amount: Decimal::ZERO,
            external_id: external_id.to_string(),
            booking_date: Some(Utc::now()),
            meeting_location: Some("https://meet.example/abc".to_string()),
            ..payment_signal(external_id)
        }
    }

    #[tokio::test]
    async fn confirmation_is_idempotent_per_correlation_id() {
        let (service, ledger) = harness();

        let Ok(first) = service.confirm(payment_signal("evt-1")).await else {
            panic!("first confirm failed");
        };
        let Ok(second) = service.confirm(payment_signal("evt-1")).await else {
            panic!("second confirm failed");
        };

        assert!(first.created);
        assert!(first.newly_confirmed);
        assert!(first.points_awarded);
        assert!(!second.created);
        assert!(!second.newly_confirmed);
        assert!(!second.points_awarded);
        assert_eq!(first.booking.id, second.booking.id);

        let Ok(entries) = ledger.entries_for_booking(first.booking.id) else {
            panic!("entries lookup failed");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries.first().map(|e| e.amount), Some(100));
    }

    #[tokio::test]
    async fn payment_and_schedule_converge_in_either_order() {
        let (service, _) = harness();

        // Payment first.
        let Ok(p1) = service.confirm(payment_signal("a-pay")).await else {
            panic!("confirm failed");
        };
        let Ok(s1) = service.confirm(schedule_signal("a-sched")).await else {
            panic!("confirm failed");
        };
        assert_eq!(p1.booking.id, s1.booking.id);

        let (service, _) = harness();

        // Schedule first.
        let Ok(s2) = service.confirm(schedule_signal("b-sched")).await else {
            panic!("confirm failed");
        };
        let Ok(p2) = service.confirm(payment_signal("b-pay")).await else {
            panic!("confirm failed");
        };
        assert_eq!(s2.booking.id, p2.booking.id);

        assert_eq!(s1.booking.status, BookingStatus::Confirmed);
        assert_eq!(p2.booking.status, BookingStatus::Confirmed);
        assert_eq!(s1.booking.amount, p2.booking.amount);
        assert_eq!(s1.booking.meeting_location, p2.booking.meeting_location);
        // Exactly one transition into confirmed per logical booking.
        assert!(p1.newly_confirmed && !s1.newly_confirmed);
        assert!(!s2.newly_confirmed && p2.newly_confirmed);
    }

    #[tokio::test]
    async fn refund_cancellation_reverses_original_earn() {
        let (service, ledger) = harness();
        let Ok(confirmed) = service.confirm(payment_signal("evt-b1")).await else {
            panic!("confirm failed");
        };
        let user = confirmed.booking.user_id;
        let Ok(balance) = ledger.reward_balance(user).await else {
            panic!("balance failed");
        };
        assert_eq!(balance, 100);

        let Ok(cancelled) = service
            .cancel(confirmed.booking.id, Some("customer request".to_string()), true)
            .await
        else {
            panic!("cancel failed");
        };
        assert!(cancelled.reversal_applied);
        assert!(!cancelled.booking.is_payout_eligible);

        let Ok(balance) = ledger.reward_balance(user).await else {
            panic!("balance failed");
        };
        assert_eq!(balance, 0);

        let Ok(entries) = ledger.entries_for_booking(confirmed.booking.id) else {
            panic!("entries lookup failed");
        };
        let amounts: Vec<i64> = entries.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![100, -100]);
    }

    #[tokio::test]
    async fn repeated_refund_cancellation_reverses_once() {
        let (service, ledger) = harness();
        let Ok(confirmed) = service.confirm(payment_signal("evt-b2")).await else {
            panic!("confirm failed");
        };

        let Ok(first) = service.cancel(confirmed.booking.id, None, true).await else {
            panic!("cancel failed");
        };
        assert!(first.reversal_applied);

        let Ok(second) = service.cancel(confirmed.booking.id, None, true).await else {
            panic!("second cancel failed");
        };
        assert!(second.already_cancelled);
        assert!(!second.reversal_applied);

        let Ok(entries) = ledger.entries_for_booking(confirmed.booking.id) else {
            panic!("entries lookup failed");
        };
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn non_refund_cancellation_keeps_points() {
        let (service, ledger) = harness();
        let Ok(confirmed) = service.confirm(payment_signal("evt-b3")).await else {
            panic!("confirm failed");
        };
        let Ok(outcome) = service.cancel(confirmed.booking.id, None, false).await else {
            panic!("cancel failed");
        };
        assert!(!outcome.reversal_applied);
        let Ok(balance) = ledger.reward_balance(confirmed.booking.user_id).await else {
            panic!("balance failed");
        };
        assert_eq!(balance, 100);
    }

    #[tokio::test]
    async fn rejects_missing_identifiers() {
        let (service, _) = harness();
        let mut signal = payment_signal("evt-x");
        signal.offer_id = Uuid::nil();
        assert!(service.confirm(signal).await.is_err());
    }
}
