//! PostgreSQL implementation of the ledger store.
//!
//! Idempotency is enforced at the data layer, not by advisory locking:
//! the `booking_signals` table collapses correlation-id replays, the
//! partial unique index on `(user_id, offer_id, variant_id)` for pending
//! rows is the logical booking key, `reward_history (booking_id,
//! entry_kind)` guards double earns/reversals, and `payouts (partner_id,
//! period_start, period_end)` guards duplicate aggregation.

use chrono::{Days, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::models::{BookingRow, PartnerRow, PayoutRow};
use super::store::{
    AwardOutcome, CancelOutcome, ConfirmOutcome, LedgerStore, PartnerPeriodTotal,
};
use crate::domain::reward::{RewardEntryKind, points_for_amount};
use crate::domain::{
    Booking, BookingId, ConfirmSignal, Partner, Payout, PayoutId, PayoutPeriod, PayoutStatus,
    booking,
};
use crate::error::SettlementError;

const BOOKING_COLUMNS: &str = "id, user_id, offer_id, variant_id, partner_id, status, amount, \
     source, external_id, booking_date, meeting_location, cancellation_reason, refunded, \
     is_payout_eligible, created_at, updated_at";

const PAYOUT_COLUMNS: &str = "id, partner_id, period_start, period_end, total_amount, \
     commission_amount, commission_tax, net_payout_amount, status, transfer_id, paid_at, \
     last_error, created_at";

/// PostgreSQL-backed ledger store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Creates a new ledger store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn booking_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Booking, SettlementError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
        row.ok_or(SettlementError::BookingNotFound(id))?.into_domain()
    }

    /// Guarded reward insert plus balance update. Returns whether the
    /// entry was actually applied (`false` when the per-booking guard
    /// swallowed a duplicate).
    async fn insert_reward_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        amount: i64,
        reason: &str,
        booking_id: Option<Uuid>,
        kind: RewardEntryKind,
        metadata: &serde_json::Value,
    ) -> Result<bool, SettlementError> {
        let result = sqlx::query(
            "INSERT INTO reward_history (user_id, amount, reason, booking_id, entry_kind, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (booking_id, entry_kind) WHERE booking_id IS NOT NULL DO NOTHING",
        )
        .bind(user_id)
        .bind(amount)
        .bind(reason)
        .bind(booking_id)
        .bind(kind.as_str())
        .bind(metadata)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO reward_balances (user_id, balance) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE \
             SET balance = reward_balances.balance + EXCLUDED.balance, updated_at = now()",
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut **tx)
        .await?;

        Ok(true)
    }

    async fn write_booking_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        b: &Booking,
    ) -> Result<(), SettlementError> {
        sqlx::query(
            "UPDATE bookings SET status = $2, amount = $3, variant_id = $4, source = $5, \
             booking_date = $6, meeting_location = $7, cancellation_reason = $8, refunded = $9, \
             is_payout_eligible = $10, updated_at = $11 WHERE id = $1",
        )
        .bind(b.id.as_uuid())
        .bind(b.status.as_str())
        .bind(b.amount)
        .bind(b.variant_id)
        .bind(b.source.as_str())
        .bind(b.booking_date)
        .bind(&b.meeting_location)
        .bind(&b.cancellation_reason)
        .bind(b.refunded)
        .bind(b.is_payout_eligible)
        .bind(b.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

impl LedgerStore for PostgresLedger {
    async fn apply_confirmation(
        &self,
        signal: ConfirmSignal,
    ) -> Result<ConfirmOutcome, SettlementError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Correlation-id replay: the signal was already applied.
        let applied_to: Option<Uuid> =
            sqlx::query_scalar("SELECT booking_id FROM booking_signals WHERE external_id = $1")
                .bind(&signal.external_id)
                .fetch_optional(&mut *tx)
                .await?;
        if let Some(booking_id) = applied_to {
            let booking = Self::booking_in_tx(&mut tx, booking_id).await?;
            tx.commit().await?;
            return Ok(ConfirmOutcome {
                booking,
                created: false,
                newly_confirmed: false,
                points_awarded: false,
            });
        }

        // Logical booking created by the other signal, locked for the
        // duration of the merge. A confirmed row still matches: the
        // payment signal may arrive first and the schedule signal must
        // land on the same row, not a sibling. Pending rows win over
        // confirmed ones, newest first.
        let open = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE user_id = $1 AND offer_id = $2 \
               AND (variant_id IS NULL OR $3::uuid IS NULL OR variant_id = $3) \
               AND status <> 'cancelled' \
             ORDER BY (status = 'pending') DESC, created_at DESC LIMIT 1 FOR UPDATE"
        ))
        .bind(signal.user_id)
        .bind(signal.offer_id)
        .bind(signal.variant_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (booking, created, newly_confirmed) = match open {
            Some(row) => {
                let existing = row.into_domain()?;
                let merge = booking::merge_signal(&existing, &signal, now);
                Self::write_booking_in_tx(&mut tx, &merge.booking).await?;
                (merge.booking, false, merge.newly_confirmed)
            }
            None => {
                let b = booking::booking_from_signal(BookingId::new(), &signal, now);
                sqlx::query(
                    "INSERT INTO bookings (id, user_id, offer_id, variant_id, partner_id, status, \
                     amount, source, external_id, booking_date, meeting_location, refunded, \
                     is_payout_eligible, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
                )
                .bind(b.id.as_uuid())
                .bind(b.user_id)
                .bind(b.offer_id)
                .bind(b.variant_id)
                .bind(b.partner_id)
                .bind(b.status.as_str())
                .bind(b.amount)
                .bind(b.source.as_str())
                .bind(&b.external_id)
                .bind(b.booking_date)
                .bind(&b.meeting_location)
                .bind(b.refunded)
                .bind(b.is_payout_eligible)
                .bind(b.created_at)
                .bind(b.updated_at)
                .execute(&mut *tx)
                .await?;
                let confirmed = b.status == crate::domain::BookingStatus::Confirmed;
                (b, true, confirmed)
            }
        };

        // Record the applied signal so replays collapse to a no-op.
        sqlx::query(
            "INSERT INTO booking_signals (external_id, booking_id) VALUES ($1, $2) \
             ON CONFLICT (external_id) DO NOTHING",
        )
        .bind(&signal.external_id)
        .bind(booking.id.as_uuid())
        .execute(&mut *tx)
        .await?;

        let mut points_awarded = false;
        if newly_confirmed {
            let points = points_for_amount(booking.amount);
            if points > 0 {
                let metadata = serde_json::json!({ "booking_id": booking.id });
                points_awarded = Self::insert_reward_in_tx(
                    &mut tx,
                    booking.user_id,
                    points,
                    "booking confirmed",
                    Some(*booking.id.as_uuid()),
                    RewardEntryKind::Earn,
                    &metadata,
                )
                .await?;
            }
        }

        tx.commit().await?;
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
        let mut tx = self.pool.begin().await?;

        let existing = Self::booking_in_tx(&mut tx, *id.as_uuid()).await?;
        let Some(cancelled) = booking::cancel(&existing, reason, refunded, now) else {
            tx.commit().await?;
            return Ok(CancelOutcome {
                booking: existing,
                already_cancelled: true,
                reversal_applied: false,
            });
        };
        Self::write_booking_in_tx(&mut tx, &cancelled).await?;

        // Reversal deducts exactly what was originally earned for this
        // booking, looked up from the ledger — never recomputed from
        // the refunded monetary amount.
        let mut reversal_applied = false;
        if refunded {
            let earned: Option<i64> = sqlx::query_scalar(
                "SELECT amount FROM reward_history WHERE booking_id = $1 AND entry_kind = 'earn'",
            )
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
            if let Some(earned) = earned.filter(|e| *e > 0) {
                let metadata = serde_json::json!({ "booking_id": id });
                reversal_applied = Self::insert_reward_in_tx(
                    &mut tx,
                    cancelled.user_id,
                    -earned,
                    "booking refunded",
                    Some(*id.as_uuid()),
                    RewardEntryKind::Reversal,
                    &metadata,
                )
                .await?;
            }
        }

        tx.commit().await?;
        Ok(CancelOutcome {
            booking: cancelled,
            already_cancelled: false,
            reversal_applied,
        })
    }

    async fn booking(&self, id: BookingId) -> Result<Booking, SettlementError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or(SettlementError::BookingNotFound(*id.as_uuid()))?
            .into_domain()
    }

    async fn award_points(
        &self,
        user_id: Uuid,
        amount: i64,
        reason: &str,
        booking_id: Option<Uuid>,
        metadata: serde_json::Value,
    ) -> Result<AwardOutcome, SettlementError> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(SettlementError::UserNotFound(user_id));
        }

        let kind = match booking_id {
            Some(_) => RewardEntryKind::for_amount(amount),
            None => RewardEntryKind::Manual,
        };
        let applied =
            Self::insert_reward_in_tx(&mut tx, user_id, amount, reason, booking_id, kind, &metadata)
                .await?;

        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM reward_balances WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;

        tx.commit().await?;
        Ok(AwardOutcome {
            applied,
            balance: balance.unwrap_or(0),
        })
    }

    async fn reward_balance(&self, user_id: Uuid) -> Result<i64, SettlementError> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM reward_balances WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(balance.unwrap_or(0))
    }

    async fn partner(&self, id: Uuid) -> Result<Partner, SettlementError> {
        let row = sqlx::query_as::<_, PartnerRow>(
            "SELECT id, display_name, commission_rate, processor_account_id, charges_enabled, \
             payout_schedule FROM partners WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.ok_or(SettlementError::PartnerNotFound(id))?.into())
    }

    async fn eligible_totals(
        &self,
        period: &PayoutPeriod,
    ) -> Result<Vec<PartnerPeriodTotal>, SettlementError> {
        let from = period.start.and_time(NaiveTime::MIN).and_utc();
        let to = period
            .end
            .checked_add_days(Days::new(1))
            .unwrap_or(period.end)
            .and_time(NaiveTime::MIN)
            .and_utc();

        let rows = sqlx::query_as::<_, (Uuid, Decimal, Decimal)>(
            "SELECT b.partner_id, SUM(b.amount) AS total, p.commission_rate \
             FROM bookings b JOIN partners p ON p.id = b.partner_id \
             WHERE b.status = 'confirmed' AND b.is_payout_eligible \
               AND b.created_at >= $1 AND b.created_at < $2 \
             GROUP BY b.partner_id, p.commission_rate",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(partner_id, total, commission_rate)| PartnerPeriodTotal {
                partner_id,
                total,
                commission_rate,
            })
            .collect())
    }

    async fn insert_payout(&self, payout: &Payout) -> Result<bool, SettlementError> {
        let result = sqlx::query(
            "INSERT INTO payouts (id, partner_id, period_start, period_end, total_amount, \
             commission_amount, commission_tax, net_payout_amount, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (partner_id, period_start, period_end) DO NOTHING",
        )
        .bind(payout.id.as_uuid())
        .bind(payout.partner_id)
        .bind(payout.period_start)
        .bind(payout.period_end)
        .bind(payout.total_amount)
        .bind(payout.commission_amount)
        .bind(payout.commission_tax)
        .bind(payout.net_payout_amount)
        .bind(payout.status.as_str())
        .bind(payout.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn payout(&self, id: PayoutId) -> Result<Payout, SettlementError> {
        let row = sqlx::query_as::<_, PayoutRow>(&format!(
            "SELECT {PAYOUT_COLUMNS} FROM payouts WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or(SettlementError::PayoutNotFound(*id.as_uuid()))?
            .into_domain()
    }

    async fn pending_payouts(&self) -> Result<Vec<PayoutId>, SettlementError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM payouts WHERE status = 'pending' ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(PayoutId::from_uuid).collect())
    }

    async fn mark_payout_paid(
        &self,
        id: PayoutId,
        transfer_id: &str,
    ) -> Result<Payout, SettlementError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PayoutRow>(&format!(
            "SELECT {PAYOUT_COLUMNS} FROM payouts WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let current = row
            .ok_or(SettlementError::PayoutNotFound(*id.as_uuid()))?
            .into_domain()?;

        // Paid is terminal: a concurrent retry that lost the race keeps
        // the original transfer id.
        if current.status == PayoutStatus::Paid {
            tx.commit().await?;
            return Ok(current);
        }

        let row = sqlx::query_as::<_, PayoutRow>(&format!(
            "UPDATE payouts SET status = 'paid', transfer_id = $2, paid_at = now(), \
             last_error = NULL WHERE id = $1 RETURNING {PAYOUT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(transfer_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        row.into_domain()
    }

    async fn mark_payout_failed(
        &self,
        id: PayoutId,
        error: &str,
    ) -> Result<Payout, SettlementError> {
        let row = sqlx::query_as::<_, PayoutRow>(&format!(
            "UPDATE payouts SET status = 'failed', last_error = $2 \
             WHERE id = $1 AND status <> 'paid' RETURNING {PAYOUT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(error)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => row.into_domain(),
            // Either unknown, or already paid — report the current row.
            None => self.payout(id).await,
        }
    }

    async fn set_charges_enabled(
        &self,
        processor_account_id: &str,
        enabled: bool,
        payout_schedule: Option<&str>,
    ) -> Result<bool, SettlementError> {
        let result = sqlx::query(
            "UPDATE partners SET charges_enabled = $2, \
             payout_schedule = COALESCE($3, payout_schedule) \
             WHERE processor_account_id = $1",
        )
        .bind(processor_account_id)
        .bind(enabled)
        .bind(payout_schedule)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
