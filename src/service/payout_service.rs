//! Payout aggregation and execution.
//!
//! Aggregation turns a closed calendar month of eligible bookings into
//! at most one payout row per partner (keyed on partner+period).
//! Execution moves funds through the processor's connected-accounts API
//! with the payout id as idempotency key, and records the outcome.
//! Partner-local errors never abort the rest of a batch.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::payout::{closed_period, compute_breakdown};
use crate::domain::{Payout, PayoutId, PayoutPeriod, PayoutStatus};
use crate::error::SettlementError;
use crate::notify::{NotificationSink, PayoutStatement, send_with_retry};
use crate::persistence::{LedgerStore, PartnerPeriodTotal};
use crate::processor::{ProcessorClient, TransferError, TransferRequest};

/// Deployment-level payout policy.
#[derive(Debug, Clone)]
pub struct PayoutPolicy {
    /// Tax rate applied on top of the commission (fraction).
    pub commission_tax_rate: Decimal,
    /// ISO currency code for transfers.
    pub currency: String,
    /// Maximum statement delivery attempts.
    pub notify_max_attempts: u32,
    /// Base delay between delivery attempts, doubled each retry.
    pub notify_base_delay_ms: u64,
}

/// A partner whose aggregation failed; the rest of the batch proceeds.
#[derive(Debug, Clone)]
pub struct PartnerFailure {
    /// The affected partner.
    pub partner_id: Uuid,
    /// What went wrong.
    pub message: String,
}

/// Summary of one aggregation run.
#[derive(Debug, Clone)]
pub struct GenerateSummary {
    /// The settled period.
    pub period: PayoutPeriod,
    /// Payouts created by this run.
    pub created: Vec<PayoutId>,
    /// Partners skipped because a payout for the period already existed.
    pub skipped_existing: u32,
    /// Per-partner failures, collected rather than propagated.
    pub errors: Vec<PartnerFailure>,
}

/// Outcome of one payout execution attempt.
#[derive(Debug, Clone)]
pub enum ExecuteOutcome {
    /// Funds moved; the payout is now `paid`.
    Paid {
        /// The updated payout row.
        payout: Payout,
    },
    /// The payout was already `paid`; no processor call was made.
    AlreadyPaid {
        /// The transfer id recorded when the payout was first paid.
        transfer_id: String,
    },
    /// The partner's account cannot receive transfers yet; the payout
    /// stays `pending`. A wait state, not a failure.
    NotReady {
        /// Why the transfer was not attempted.
        reason: String,
    },
    /// The processor rejected or could not take the transfer; the
    /// payout is `failed` and eligible for retry.
    Failed {
        /// The recorded processor error.
        error: String,
    },
    /// The call timed out; the outcome is unknown and the payout stays
    /// `pending` until reconciliation.
    OutcomeUnknown,
}

/// A payout whose execution attempt errored during a sweep.
#[derive(Debug, Clone)]
pub struct SweepFailure {
    /// The affected payout.
    pub payout_id: PayoutId,
    /// What went wrong.
    pub message: String,
}

/// Summary of a sweep over all pending payouts.
#[derive(Debug, Clone, Default)]
pub struct SweepSummary {
    /// Payouts attempted.
    pub attempted: u32,
    /// Transfers that succeeded.
    pub paid: u32,
    /// Payouts found already `paid`; no transfer was made.
    pub already_paid: u32,
    /// Payouts left pending because the partner is not transfer-ready.
    pub not_ready: u32,
    /// Transfers rejected by the processor.
    pub failed: u32,
    /// Calls with unknown outcome.
    pub unknown: u32,
    /// Payout-local errors, collected rather than propagated.
    pub errors: Vec<SweepFailure>,
}

/// Orchestrates payout aggregation and execution.
#[derive(Debug, Clone)]
pub struct PayoutService<L, P, N> {
    ledger: Arc<L>,
    processor: Arc<P>,
    notifier: Arc<N>,
    policy: PayoutPolicy,
}

impl<L, P, N> PayoutService<L, P, N>
where
    L: LedgerStore + 'static,
    P: ProcessorClient + 'static,
    N: NotificationSink + 'static,
{
    /// Creates a new `PayoutService`.
    #[must_use]
    pub fn new(ledger: Arc<L>, processor: Arc<P>, notifier: Arc<N>, policy: PayoutPolicy) -> Self {
        Self {
            ledger,
            processor,
            notifier,
            policy,
        }
    }

    /// Aggregates the closed period ending at `reference_date` into one
    /// payout per partner with eligible bookings.
    ///
    /// Re-running for a period that already has a payout for a partner
    /// skips that partner; partners with zero eligible bookings produce
    /// no row at all.
    ///
    /// # Errors
    ///
    /// Returns a persistence error only when the period scan itself
    /// fails; per-partner errors are collected in the summary.
    pub async fn generate(&self, reference_date: NaiveDate) -> Result<GenerateSummary, SettlementError> {
        let period = closed_period(reference_date);
        let totals = self.ledger.eligible_totals(&period).await?;

        let mut summary = GenerateSummary {
            period,
            created: Vec::new(),
            skipped_existing: 0,
            errors: Vec::new(),
        };

        for total in totals {
            let partner_id = total.partner_id;
            match self.aggregate_partner(&period, total).await {
                Ok(Some(payout_id)) => summary.created.push(payout_id),
                Ok(None) => summary.skipped_existing += 1,
                Err(err) => {
                    tracing::warn!(%partner_id, error = %err, "partner aggregation failed");
                    summary.errors.push(PartnerFailure {
                        partner_id,
                        message: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            period_start = %summary.period.start,
            period_end = %summary.period.end,
            created = summary.created.len(),
            skipped = summary.skipped_existing,
            errors = summary.errors.len(),
            "payout aggregation finished"
        );
        Ok(summary)
    }

    async fn aggregate_partner(
        &self,
        period: &PayoutPeriod,
        total: PartnerPeriodTotal,
    ) -> Result<Option<PayoutId>, SettlementError> {
        if total.commission_rate < Decimal::ZERO || total.commission_rate > Decimal::ONE {
            return Err(SettlementError::InvalidValue(format!(
                "commission rate {} out of range",
                total.commission_rate
            )));
        }

        let split = compute_breakdown(total.total, total.commission_rate, self.policy.commission_tax_rate);
        let payout = Payout {
            id: PayoutId::new(),
            partner_id: total.partner_id,
            period_start: period.start,
            period_end: period.end,
            total_amount: split.total,
            commission_amount: split.commission,
            commission_tax: split.tax,
            net_payout_amount: split.net,
            status: PayoutStatus::Pending,
            transfer_id: None,
            paid_at: None,
            last_error: None,
            created_at: Utc::now(),
        };

        if self.ledger.insert_payout(&payout).await? {
            Ok(Some(payout.id))
        } else {
            Ok(None)
        }
    }

    /// Attempts to move funds for one payout.
    ///
    /// A payout already `paid` returns its existing transfer id without
    /// a processor call; a partner that is not transfer-ready leaves the
    /// payout `pending`.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PayoutNotFound`] or
    /// [`SettlementError::PartnerNotFound`] for unknown ids.
    pub async fn execute(&self, id: PayoutId) -> Result<ExecuteOutcome, SettlementError> {
        let payout = self.ledger.payout(id).await?;
        // This read is not serialized with the transfer below. Two
        // concurrent executes still cannot double-pay: the processor
        // deduplicates on the payout id used as idempotency key, and
        // `mark_payout_paid` re-checks the terminal status under its
        // own transaction before recording the transfer.
        if payout.status == PayoutStatus::Paid {
            tracing::info!(payout_id = %id, "payout already paid; skipping transfer");
            return Ok(ExecuteOutcome::AlreadyPaid {
                transfer_id: payout.transfer_id.unwrap_or_default(),
            });
        }

        let partner = self.ledger.partner(payout.partner_id).await?;
        let Some(destination) = partner.processor_account_id.clone() else {
            return Ok(ExecuteOutcome::NotReady {
                reason: "partner has no processor account".to_string(),
            });
        };
        if !partner.charges_enabled {
            return Ok(ExecuteOutcome::NotReady {
                reason: "processor has not enabled charges for this account".to_string(),
            });
        }

        let request = TransferRequest {
            payout_id: id,
            destination_account_id: destination,
            amount: payout.net_payout_amount,
            currency: self.policy.currency.clone(),
        };

        match self.processor.create_transfer(&request).await {
            Ok(transfer_id) => {
                let paid = self.ledger.mark_payout_paid(id, &transfer_id).await?;
                tracing::info!(payout_id = %id, transfer_id, "payout executed");
                self.emit_statement(&paid);
                Ok(ExecuteOutcome::Paid { payout: paid })
            }
            Err(TransferError::TimedOut) => {
                // Unknown outcome: leave the payout pending rather than
                // guessing. The idempotency key makes a retry safe.
                tracing::warn!(payout_id = %id, "transfer timed out; payout left pending");
                Ok(ExecuteOutcome::OutcomeUnknown)
            }
            Err(err) => {
                let message = err.to_string();
                self.ledger.mark_payout_failed(id, &message).await?;
                tracing::warn!(payout_id = %id, error = message, "payout failed");
                Ok(ExecuteOutcome::Failed { error: message })
            }
        }
    }

    /// Executes every `pending` payout, isolating per-payout errors.
    ///
    /// # Errors
    ///
    /// Returns a persistence error only when the pending scan itself
    /// fails.
    pub async fn execute_pending(&self) -> Result<SweepSummary, SettlementError> {
        let ids = self.ledger.pending_payouts().await?;
        Ok(self.sweep(ids).await)
    }

    /// Runs the sweep over an explicit id list. A payout paid between
    /// the pending scan and its turn in the loop lands in
    /// `already_paid` rather than `paid`.
    async fn sweep(&self, ids: Vec<PayoutId>) -> SweepSummary {
        let mut summary = SweepSummary::default();

        for id in ids {
            summary.attempted += 1;
            match self.execute(id).await {
                Ok(ExecuteOutcome::Paid { .. }) => summary.paid += 1,
                Ok(ExecuteOutcome::AlreadyPaid { .. }) => summary.already_paid += 1,
                Ok(ExecuteOutcome::NotReady { .. }) => summary.not_ready += 1,
                Ok(ExecuteOutcome::Failed { .. }) => summary.failed += 1,
                Ok(ExecuteOutcome::OutcomeUnknown) => summary.unknown += 1,
                Err(err) => summary.errors.push(SweepFailure {
                    payout_id: id,
                    message: err.to_string(),
                }),
            }
        }
        summary
    }

    /// Fetches a payout by id.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::PayoutNotFound`] for unknown ids.
    pub async fn get(&self, id: PayoutId) -> Result<Payout, SettlementError> {
        self.ledger.payout(id).await
    }

    /// Fires the statement notification in the background. Delivery
    /// failures are logged; they never affect the financial transition
    /// that already committed.
    fn emit_statement(&self, paid: &Payout) {
        let Some(transfer_id) = paid.transfer_id.clone() else {
            return;
        };
        let statement = PayoutStatement {
            payout_id: paid.id,
            partner_id: paid.partner_id,
            period_start: paid.period_start,
            period_end: paid.period_end,
            net_amount: paid.net_payout_amount,
            transfer_id,
        };
        let notifier = Arc::clone(&self.notifier);
        let max_attempts = self.policy.notify_max_attempts;
        let base_delay_ms = self.policy.notify_base_delay_ms;
        tokio::spawn(async move {
            if let Err(err) =
                send_with_retry(notifier.as_ref(), &statement, max_attempts, base_delay_ms).await
            {
                tracing::error!(
                    payout_id = %statement.payout_id,
                    error = %err,
                    "statement delivery permanently failed"
                );
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::{BookingSource, BookingStatus, ConfirmSignal, Partner};
    use crate::notify::TracingSink;
    use crate::persistence::MemoryLedger;
    use crate::processor::{MockBehavior, MockProcessor};

    const PARTNER: Uuid = Uuid::from_u128(3);

    fn policy() -> PayoutPolicy {
        PayoutPolicy {
            commission_tax_rate: Decimal::ZERO,
            currency: "eur".to_string(),
            notify_max_attempts: 1,
            notify_base_delay_ms: 1,
        }
    }

    fn partner(charges_enabled: bool) -> Partner {
        Partner {
            id: PARTNER,
            display_name: "Studio One".to_string(),
            commission_rate: Decimal::new(15, 2),
            processor_account_id: Some("acct_42".to_string()),
            charges_enabled,
            payout_schedule: None,
        }
    }

    fn harness(
        behavior: MockBehavior,
        charges_enabled: bool,
    ) -> (
        PayoutService<MemoryLedger, MockProcessor, TracingSink>,
        Arc<MemoryLedger>,
        Arc<MockProcessor>,
    ) {
        let ledger = Arc::new(MemoryLedger::new());
        let Ok(()) = ledger.add_partner(partner(charges_enabled)) else {
            panic!("seed failed");
        };
        let processor = Arc::new(MockProcessor::new(behavior));
        let service = PayoutService::new(
            Arc::clone(&ledger),
            Arc::clone(&processor),
            Arc::new(TracingSink),
            policy(),
        );
        (service, ledger, processor)
    }

    /// Confirms a booking for `PARTNER` and backdates it into January 2026.
    async fn seed_january_booking(ledger: &Arc<MemoryLedger>, external_id: &str, amount: Decimal) {
        let signal = ConfirmSignal {
            user_id: Uuid::from_u128(1),
            offer_id: Uuid::new_v4(),
            partner_id: PARTNER,
            variant_id: None,
            status: BookingStatus::Confirmed,
            source: BookingSource::Stripe,
            amount,
            external_id: external_id.to_string(),
            booking_date: None,
            meeting_location: None,
        };
        let Ok(outcome) = ledger.apply_confirmation(signal).await else {
            panic!("seed confirm failed");
        };
        let Some(created_at) = chrono::Utc
            .with_ymd_and_hms(2026, 1, 15, 12, 0, 0)
            .single()
        else {
            panic!("valid timestamp");
        };
        let Ok(()) = ledger.backdate_booking(outcome.booking.id, created_at) else {
            panic!("backdate failed");
        };
    }

    fn jan_31() -> NaiveDate {
        let Some(date) = NaiveDate::from_ymd_opt(2026, 1, 31) else {
            panic!("valid date");
        };
        date
    }

    #[tokio::test]
    async fn january_aggregation_matches_scenario() {
        let (service, ledger, _) = harness(MockBehavior::Succeed, true);
        seed_january_booking(&ledger, "evt-1", Decimal::new(30_000, 2)).await;
        seed_january_booking(&ledger, "evt-2", Decimal::new(20_000, 2)).await;

        let Ok(summary) = service.generate(jan_31()).await else {
            panic!("generate failed");
        };
        assert_eq!(summary.created.len(), 1);
        assert!(summary.errors.is_empty());

        let Some(&payout_id) = summary.created.first() else {
            panic!("payout id missing");
        };
        let Ok(payout) = service.get(payout_id).await else {
            panic!("payout lookup failed");
        };
        assert_eq!(payout.period_start, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or_default());
        assert_eq!(payout.period_end, jan_31());
        assert_eq!(payout.total_amount, Decimal::new(50_000, 2));
        // 15% commission, no tax.
        assert_eq!(payout.commission_amount, Decimal::new(7_500, 2));
        assert_eq!(payout.net_payout_amount, Decimal::new(42_500, 2));
        assert_eq!(payout.status, PayoutStatus::Pending);
    }

    #[tokio::test]
    async fn aggregation_is_idempotent_per_partner_period() {
        let (service, ledger, _) = harness(MockBehavior::Succeed, true);
        seed_january_booking(&ledger, "evt-1", Decimal::new(10_000, 2)).await;

        let Ok(first) = service.generate(jan_31()).await else {
            panic!("generate failed");
        };
        let Ok(second) = service.generate(jan_31()).await else {
            panic!("generate failed");
        };
        assert_eq!(first.created.len(), 1);
        assert!(second.created.is_empty());
        assert_eq!(second.skipped_existing, 1);
    }

    #[tokio::test]
    async fn no_eligible_bookings_produce_no_rows() {
        let (service, _, _) = harness(MockBehavior::Succeed, true);
        let Ok(summary) = service.generate(jan_31()).await else {
            panic!("generate failed");
        };
        assert!(summary.created.is_empty());
        assert_eq!(summary.skipped_existing, 0);
    }

    #[tokio::test]
    async fn partner_error_does_not_abort_others() {
        let (service, ledger, _) = harness(MockBehavior::Succeed, true);
        // A second partner with an out-of-range commission rate.
        let broken = Partner {
            id: Uuid::from_u128(4),
            commission_rate: Decimal::new(150, 2), // 1.50
            ..partner(true)
        };
        let Ok(()) = ledger.add_partner(broken) else {
            panic!("seed failed");
        };
        seed_january_booking(&ledger, "evt-good", Decimal::new(10_000, 2)).await;
        let signal = ConfirmSignal {
            user_id: Uuid::from_u128(2),
            offer_id: Uuid::new_v4(),
            partner_id: Uuid::from_u128(4),
            variant_id: None,
            status: BookingStatus::Confirmed,
            source: BookingSource::Stripe,
            amount: Decimal::new(5_000, 2),
            external_id: "evt-broken".to_string(),
            booking_date: None,
            meeting_location: None,
        };
        let Ok(outcome) = ledger.apply_confirmation(signal).await else {
            panic!("seed confirm failed");
        };
        let Some(created_at) = chrono::Utc.with_ymd_and_hms(2026, 1, 20, 9, 0, 0).single() else {
            panic!("valid timestamp");
        };
        let Ok(()) = ledger.backdate_booking(outcome.booking.id, created_at) else {
            panic!("backdate failed");
        };

        let Ok(summary) = service.generate(jan_31()).await else {
            panic!("generate failed");
        };
        assert_eq!(summary.created.len(), 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors.first().map(|e| e.partner_id), Some(Uuid::from_u128(4)));
    }

    async fn generated_payout(
        service: &PayoutService<MemoryLedger, MockProcessor, TracingSink>,
        ledger: &Arc<MemoryLedger>,
    ) -> PayoutId {
        seed_january_booking(ledger, "evt-exec", Decimal::new(77_500, 2)).await;
        let Ok(summary) = service.generate(jan_31()).await else {
            panic!("generate failed");
        };
        let Some(&id) = summary.created.first() else {
            panic!("no payout created");
        };
        id
    }

    #[tokio::test]
    async fn execute_pays_and_records_transfer() {
        let (service, ledger, processor) = harness(MockBehavior::Succeed, true);
        let id = generated_payout(&service, &ledger).await;

        let Ok(ExecuteOutcome::Paid { payout }) = service.execute(id).await else {
            panic!("expected paid outcome");
        };
        assert_eq!(payout.status, PayoutStatus::Paid);
        assert!(payout.transfer_id.is_some());
        assert!(payout.paid_at.is_some());
        // 775.00 at 15% commission → net 658.75 transferred.
        assert_eq!(payout.net_payout_amount, Decimal::new(65_875, 2));
        assert_eq!(processor.call_count(), 1);
    }

    #[tokio::test]
    async fn no_second_transfer_for_paid_payout() {
        let (service, ledger, processor) = harness(MockBehavior::Succeed, true);
        let id = generated_payout(&service, &ledger).await;

        let Ok(ExecuteOutcome::Paid { payout }) = service.execute(id).await else {
            panic!("expected paid outcome");
        };
        let Ok(ExecuteOutcome::AlreadyPaid { transfer_id }) = service.execute(id).await else {
            panic!("expected already-paid outcome");
        };
        assert_eq!(Some(transfer_id), payout.transfer_id);
        assert_eq!(processor.call_count(), 1);
    }

    #[tokio::test]
    async fn charges_disabled_is_a_wait_state() {
        let (service, ledger, processor) = harness(MockBehavior::Succeed, false);
        let id = generated_payout(&service, &ledger).await;

        let Ok(ExecuteOutcome::NotReady { .. }) = service.execute(id).await else {
            panic!("expected not-ready outcome");
        };
        assert_eq!(processor.call_count(), 0);
        let Ok(payout) = service.get(id).await else {
            panic!("payout lookup failed");
        };
        assert_eq!(payout.status, PayoutStatus::Pending);
    }

    #[tokio::test]
    async fn rejection_marks_failed_and_retry_can_pay() {
        let (service, ledger, processor) =
            harness(MockBehavior::Reject("insufficient platform balance".to_string()), true);
        let id = generated_payout(&service, &ledger).await;

        let Ok(ExecuteOutcome::Failed { error }) = service.execute(id).await else {
            panic!("expected failed outcome");
        };
        assert!(error.contains("insufficient platform balance"));
        let Ok(payout) = service.get(id).await else {
            panic!("payout lookup failed");
        };
        assert_eq!(payout.status, PayoutStatus::Failed);
        assert!(payout.last_error.is_some());

        processor.set_behavior(MockBehavior::Succeed);
        let Ok(ExecuteOutcome::Paid { .. }) = service.execute(id).await else {
            panic!("expected paid outcome after retry");
        };
        assert_eq!(processor.call_count(), 2);
    }

    #[tokio::test]
    async fn timeout_leaves_payout_pending() {
        let (service, ledger, _) = harness(MockBehavior::TimeOut, true);
        let id = generated_payout(&service, &ledger).await;

        let Ok(ExecuteOutcome::OutcomeUnknown) = service.execute(id).await else {
            panic!("expected unknown outcome");
        };
        let Ok(payout) = service.get(id).await else {
            panic!("payout lookup failed");
        };
        assert_eq!(payout.status, PayoutStatus::Pending);
        assert!(payout.transfer_id.is_none());
    }

    #[tokio::test]
    async fn sweep_counts_outcomes() {
        let (service, ledger, _) = harness(MockBehavior::Succeed, true);
        let _ = generated_payout(&service, &ledger).await;

        let Ok(summary) = service.execute_pending().await else {
            panic!("sweep failed");
        };
        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.paid, 1);
        assert!(summary.errors.is_empty());
        assert_eq!(
            summary.attempted,
            summary.paid
                + summary.already_paid
                + summary.not_ready
                + summary.failed
                + summary.unknown
                + u32::try_from(summary.errors.len()).unwrap_or(u32::MAX)
        );

        // Second sweep has nothing pending.
        let Ok(summary) = service.execute_pending().await else {
            panic!("sweep failed");
        };
        assert_eq!(summary.attempted, 0);
    }

    #[tokio::test]
    async fn sweep_counts_payout_paid_after_scan() {
        let (service, ledger, processor) = harness(MockBehavior::Succeed, true);
        let id = generated_payout(&service, &ledger).await;

        // The payout gets paid between the pending scan and its turn
        // in the loop.
        let Ok(ExecuteOutcome::Paid { .. }) = service.execute(id).await else {
            panic!("expected paid outcome");
        };
        let summary = service.sweep(vec![id]).await;

        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.already_paid, 1);
        assert_eq!(summary.paid, 0);
        assert!(summary.errors.is_empty());
        assert_eq!(processor.call_count(), 1);
    }
}
