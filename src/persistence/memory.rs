//! In-memory ledger store for tests.
//!
//! Implements [`LedgerStore`] over `Arc<Mutex<HashMap>>` state, applying
//! the same pure domain functions as the PostgreSQL implementation, so
//! service-level tests exercise the deployed merge/transition semantics
//! without a database.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::store::{
    AwardOutcome, CancelOutcome, ConfirmOutcome, LedgerStore, PartnerPeriodTotal,
};
use crate::domain::reward::{RewardEntry, RewardEntryKind, points_for_amount};
use crate::domain::{
    Booking, BookingId, BookingStatus, ConfirmSignal, Partner, Payout, PayoutId, PayoutPeriod,
    PayoutStatus, booking,
};
use crate::error::SettlementError;

#[derive(Debug, Default)]
struct Inner {
    users: HashSet<Uuid>,
    partners: HashMap<Uuid, Partner>,
    bookings: HashMap<Uuid, Booking>,
    applied_signals: HashMap<String, Uuid>,
    rewards: Vec<RewardEntry>,
    reward_guard: HashSet<(Uuid, RewardEntryKind)>,
    balances: HashMap<Uuid, i64>,
    payouts: HashMap<Uuid, Payout>,
    payout_periods: HashSet<(Uuid, chrono::NaiveDate, chrono::NaiveDate)>,
    next_reward_id: i64,
}

/// In-memory [`LedgerStore`] double.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, SettlementError> {
        self.inner
            .lock()
            .map_err(|_| SettlementError::Internal("ledger lock poisoned".to_string()))
    }

    /// Registers a user so award/confirm operations can reference it.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Internal`] if the lock is poisoned.
    pub fn add_user(&self, user_id: Uuid) -> Result<(), SettlementError> {
        self.lock()?.users.insert(user_id);
        Ok(())
    }

    /// Registers a partner.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Internal`] if the lock is poisoned.
    pub fn add_partner(&self, partner: Partner) -> Result<(), SettlementError> {
        self.lock()?.partners.insert(partner.id, partner);
        Ok(())
    }

    /// Rewrites a booking's creation time, so aggregation tests can
    /// place bookings inside a specific settlement period.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::BookingNotFound`] for unknown ids.
    pub fn backdate_booking(
        &self,
        id: BookingId,
        created_at: DateTime<Utc>,
    ) -> Result<(), SettlementError> {
        let mut inner = self.lock()?;
        let b = inner
            .bookings
            .get_mut(id.as_uuid())
            .ok_or(SettlementError::BookingNotFound(*id.as_uuid()))?;
        b.created_at = created_at;
        Ok(())
    }

    /// Returns all reward entries recorded for a booking, in append
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Internal`] if the lock is poisoned.
    pub fn entries_for_booking(
        &self,
        booking_id: BookingId,
    ) -> Result<Vec<RewardEntry>, SettlementError> {
        let inner = self.lock()?;
        Ok(inner
            .rewards
            .iter()
            .filter(|e| e.booking_id == Some(*booking_id.as_uuid()))
            .cloned()
            .collect())
    }
}

impl Inner {
    fn push_reward(
        &mut self,
        user_id: Uuid,
        amount: i64,
        reason: &str,
        booking_id: Option<Uuid>,
        kind: RewardEntryKind,
        metadata: serde_json::Value,
    ) -> bool {
        if let Some(bid) = booking_id {
            if !self.reward_guard.insert((bid, kind)) {
                return false;
            }
        }
        self.next_reward_id += 1;
        self.rewards.push(RewardEntry {
            id: self.next_reward_id,
            user_id,
            amount,
            reason: reason.to_string(),
            booking_id,
            kind,
            metadata,
            created_at: Utc::now(),
        });
        *self.balances.entry(user_id).or_insert(0) += amount;
        true
    }
}

impl LedgerStore for MemoryLedger {
    async fn apply_confirmation(
        &self,
        signal: ConfirmSignal,
    ) -> Result<ConfirmOutcome, SettlementError> {
        let now = Utc::now();
        let mut inner = self.lock()?;

        if let Some(booking_id) = inner.applied_signals.get(&signal.external_id).copied() {
            let booking = inner
                .bookings
                .get(&booking_id)
                .cloned()
                .ok_or(SettlementError::BookingNotFound(booking_id))?;
            return Ok(ConfirmOutcome {
                booking,
                created: false,
                newly_confirmed: false,
                points_awarded: false,
            });
        }

        // Confirmed rows still match: when the payment signal arrives
        // first the schedule signal must land on the same row, not a
        // sibling. Pending rows win over confirmed ones, newest first.
        let open = inner
            .bookings
            .values()
            .filter(|b| {
                b.user_id == signal.user_id
                    && b.offer_id == signal.offer_id
                    && (b.variant_id.is_none()
                        || signal.variant_id.is_none()
                        || b.variant_id == signal.variant_id)
                    && b.status != BookingStatus::Cancelled
            })
            .max_by_key(|b| (b.status == BookingStatus::Pending, b.created_at))
            .cloned();

        let (booking, created, newly_confirmed) = match open {
            Some(existing) => {
                let merge = booking::merge_signal(&existing, &signal, now);
                inner
                    .bookings
                    .insert(*merge.booking.id.as_uuid(), merge.booking.clone());
                (merge.booking, false, merge.newly_confirmed)
            }
            None => {
                let b = booking::booking_from_signal(BookingId::new(), &signal, now);
                inner.bookings.insert(*b.id.as_uuid(), b.clone());
                let confirmed = b.status == BookingStatus::Confirmed;
                (b, true, confirmed)
            }
        };

        inner
            .applied_signals
            .insert(signal.external_id.clone(), *booking.id.as_uuid());

        let mut points_awarded = false;
        if newly_confirmed {
            let points = points_for_amount(booking.amount);
            if points > 0 {
                points_awarded = inner.push_reward(
                    booking.user_id,
                    points,
                    "booking confirmed",
                    Some(*booking.id.as_uuid()),
                    RewardEntryKind::Earn,
                    serde_json::json!({ "booking_id": booking.id }),
                );
            }
        }

        Ok(ConfirmOutcome {
            booking,
            created,
            newly_confirmed,
            points_awarded,
        })
    }

    async fn cancel_booking(
        &self,
        id: BookingId,
        reason: Option<String>,
        refunded: bool,
    ) -> Result<CancelOutcome, SettlementError> {
        let now = Utc::now();
        let mut inner = self.lock()?;

        let existing = inner
            .bookings
            .get(id.as_uuid())
            .cloned()
            .ok_or(SettlementError::BookingNotFound(*id.as_uuid()))?;

        let Some(cancelled) = booking::cancel(&existing, reason, refunded, now) else {
            return Ok(CancelOutcome {
                booking: existing,
                already_cancelled: true,
                reversal_applied: false,
            });
        };
        inner.bookings.insert(*id.as_uuid(), cancelled.clone());

        let mut reversal_applied = false;
        if refunded {
            let earned = inner
                .rewards
                .iter()
                .find(|e| {
                    e.booking_id == Some(*id.as_uuid()) && e.kind == RewardEntryKind::Earn
                })
                .map(|e| e.amount)
                .filter(|e| *e > 0);
            if let Some(earned) = earned {
                reversal_applied = inner.push_reward(
                    cancelled.user_id,
                    -earned,
                    "booking refunded",
                    Some(*id.as_uuid()),
                    RewardEntryKind::Reversal,
                    serde_json::json!({ "booking_id": id }),
                );
            }
        }

        Ok(CancelOutcome {
            booking: cancelled,
            already_cancelled: false,
            reversal_applied,
        })
    }

    async fn booking(&self, id: BookingId) -> Result<Booking, SettlementError> {
        self.lock()?
            .bookings
            .get(id.as_uuid())
            .cloned()
            .ok_or(SettlementError::BookingNotFound(*id.as_uuid()))
    }

    async fn award_points(
        &self,
        user_id: Uuid,
        amount: i64,
        reason: &str,
        booking_id: Option<Uuid>,
        metadata: serde_json::Value,
    ) -> Result<AwardOutcome, SettlementError> {
        let mut inner = self.lock()?;
        if !inner.users.contains(&user_id) {
            return Err(SettlementError::UserNotFound(user_id));
        }
        let kind = match booking_id {
            Some(_) => RewardEntryKind::for_amount(amount),
            None => RewardEntryKind::Manual,
        };
        let applied = inner.push_reward(user_id, amount, reason, booking_id, kind, metadata);
        Ok(AwardOutcome {
            applied,
            balance: inner.balances.get(&user_id).copied().unwrap_or(0),
        })
    }

    async fn reward_balance(&self, user_id: Uuid) -> Result<i64, SettlementError> {
        Ok(self.lock()?.balances.get(&user_id).copied().unwrap_or(0))
    }

    async fn partner(&self, id: Uuid) -> Result<Partner, SettlementError> {
        self.lock()?
            .partners
            .get(&id)
            .cloned()
            .ok_or(SettlementError::PartnerNotFound(id))
    }

    async fn eligible_totals(
        &self,
        period: &PayoutPeriod,
    ) -> Result<Vec<PartnerPeriodTotal>, SettlementError> {
        let inner = self.lock()?;
        let mut totals: HashMap<Uuid, rust_decimal::Decimal> = HashMap::new();
        for b in inner.bookings.values() {
            let day = b.created_at.date_naive();
            if b.status == BookingStatus::Confirmed
                && b.is_payout_eligible
                && day >= period.start
                && day <= period.end
            {
                *totals.entry(b.partner_id).or_default() += b.amount;
            }
        }
        Ok(totals
            .into_iter()
            .filter_map(|(partner_id, total)| {
                inner.partners.get(&partner_id).map(|p| PartnerPeriodTotal {
                    partner_id,
                    total,
                    commission_rate: p.commission_rate,
                })
            })
            .collect())
    }

    async fn insert_payout(&self, payout: &Payout) -> Result<bool, SettlementError> {
        let mut inner = self.lock()?;
        let key = (payout.partner_id, payout.period_start, payout.period_end);
        if !inner.payout_periods.insert(key) {
            return Ok(false);
        }
        inner.payouts.insert(*payout.id.as_uuid(), payout.clone());
        Ok(true)
    }

    async fn payout(&self, id: PayoutId) -> Result<Payout, SettlementError> {
        self.lock()?
            .payouts
            .get(id.as_uuid())
            .cloned()
            .ok_or(SettlementError::PayoutNotFound(*id.as_uuid()))
    }

    async fn pending_payouts(&self) -> Result<Vec<PayoutId>, SettlementError> {
        let inner = self.lock()?;
        let mut pending: Vec<_> = inner
            .payouts
            .values()
            .filter(|p| p.status == PayoutStatus::Pending)
            .collect();
        pending.sort_by_key(|p| p.created_at);
        Ok(pending.iter().map(|p| p.id).collect())
    }

    async fn mark_payout_paid(
        &self,
        id: PayoutId,
        transfer_id: &str,
    ) -> Result<Payout, SettlementError> {
        let mut inner = self.lock()?;
        let payout = inner
            .payouts
            .get_mut(id.as_uuid())
            .ok_or(SettlementError::PayoutNotFound(*id.as_uuid()))?;
        if payout.status == PayoutStatus::Paid {
            return Ok(payout.clone());
        }
        payout.status = PayoutStatus::Paid;
        payout.transfer_id = Some(transfer_id.to_string());
        payout.paid_at = Some(Utc::now());
        payout.last_error = None;
        Ok(payout.clone())
    }

    async fn mark_payout_failed(
        &self,
        id: PayoutId,
        error: &str,
    ) -> Result<Payout, SettlementError> {
        let mut inner = self.lock()?;
        let payout = inner
            .payouts
            .get_mut(id.as_uuid())
            .ok_or(SettlementError::PayoutNotFound(*id.as_uuid()))?;
        if payout.status == PayoutStatus::Paid {
            return Ok(payout.clone());
        }
        payout.status = PayoutStatus::Failed;
        payout.last_error = Some(error.to_string());
        Ok(payout.clone())
    }

    async fn set_charges_enabled(
        &self,
        processor_account_id: &str,
        enabled: bool,
        payout_schedule: Option<&str>,
    ) -> Result<bool, SettlementError> {
        let mut inner = self.lock()?;
        let partner = inner
            .partners
            .values_mut()
            .find(|p| p.processor_account_id.as_deref() == Some(processor_account_id));
        match partner {
            Some(p) => {
                p.charges_enabled = enabled;
                if let Some(schedule) = payout_schedule {
                    p.payout_schedule = Some(schedule.to_string());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
