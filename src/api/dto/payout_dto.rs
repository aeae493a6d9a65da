//! Payout aggregation and execution DTOs.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Payout, PayoutId, PayoutStatus};
use crate::service::{ExecuteOutcome, GenerateSummary, SweepSummary};

/// Request body for `POST /payouts/generate`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GeneratePayoutsRequest {
    /// Reference date; the previous calendar month is settled, or the
    /// month containing this date when it falls on the month's last day.
    pub reference_date: NaiveDate,
}

/// A partner-local aggregation failure.
#[derive(Debug, Serialize, ToSchema)]
pub struct PartnerFailureDto {
    /// The affected partner.
    pub partner_id: Uuid,
    /// What went wrong.
    pub message: String,
}

/// Response body for `POST /payouts/generate`.
#[derive(Debug, Serialize, ToSchema)]
pub struct GeneratePayoutsResponse {
    /// Always `true` on 2xx, even when partner-local errors occurred.
    pub success: bool,
    /// First day of the settled period.
    pub period_start: NaiveDate,
    /// Last day of the settled period.
    pub period_end: NaiveDate,
    /// Payouts created by this run.
    pub created: Vec<PayoutId>,
    /// Partners skipped because their payout for the period existed.
    pub skipped_existing: u32,
    /// Partner-local failures.
    pub errors: Vec<PartnerFailureDto>,
}

impl From<GenerateSummary> for GeneratePayoutsResponse {
    fn from(s: GenerateSummary) -> Self {
        Self {
            success: true,
            period_start: s.period.start,
            period_end: s.period.end,
            created: s.created,
            skipped_existing: s.skipped_existing,
            errors: s
                .errors
                .into_iter()
                .map(|e| PartnerFailureDto {
                    partner_id: e.partner_id,
                    message: e.message,
                })
                .collect(),
        }
    }
}

/// Full payout representation for `GET /payouts/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PayoutDto {
    /// Row identifier.
    pub id: PayoutId,
    /// Receiving partner.
    pub partner_id: Uuid,
    /// First day of the settled period.
    pub period_start: NaiveDate,
    /// Last day of the settled period.
    pub period_end: NaiveDate,
    /// Gross eligible revenue in the period.
    pub total_amount: Decimal,
    /// Platform commission withheld.
    pub commission_amount: Decimal,
    /// Tax on the commission.
    pub commission_tax: Decimal,
    /// Amount transferred to the partner.
    pub net_payout_amount: Decimal,
    /// Lifecycle status.
    pub status: PayoutStatus,
    /// Processor transfer id once paid.
    pub transfer_id: Option<String>,
    /// When funds moved.
    pub paid_at: Option<DateTime<Utc>>,
    /// Last recorded processor error.
    pub last_error: Option<String>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
}

impl From<Payout> for PayoutDto {
    fn from(p: Payout) -> Self {
        Self {
            id: p.id,
            partner_id: p.partner_id,
            period_start: p.period_start,
            period_end: p.period_end,
            total_amount: p.total_amount,
            commission_amount: p.commission_amount,
            commission_tax: p.commission_tax,
            net_payout_amount: p.net_payout_amount,
            status: p.status,
            transfer_id: p.transfer_id,
            paid_at: p.paid_at,
            last_error: p.last_error,
            created_at: p.created_at,
        }
    }
}

/// Response body for `POST /payouts/{id}/execute`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ExecutePayoutResponse {
    /// One of `paid`, `already_paid`, `not_ready`, `failed`, `unknown`.
    pub outcome: String,
    /// The executed payout.
    pub payout_id: PayoutId,
    /// Processor transfer id when funds moved (now or previously).
    pub transfer_id: Option<String>,
    /// Failure or wait-state detail.
    pub detail: Option<String>,
}

impl ExecutePayoutResponse {
    /// Flattens an execution outcome into the wire shape.
    #[must_use]
    pub fn from_outcome(payout_id: PayoutId, outcome: ExecuteOutcome) -> Self {
        match outcome {
            ExecuteOutcome::Paid { payout } => Self {
                outcome: "paid".to_string(),
                payout_id,
                transfer_id: payout.transfer_id,
                detail: None,
            },
            ExecuteOutcome::AlreadyPaid { transfer_id } => Self {
                outcome: "already_paid".to_string(),
                payout_id,
                transfer_id: Some(transfer_id),
                detail: None,
            },
            ExecuteOutcome::NotReady { reason } => Self {
                outcome: "not_ready".to_string(),
                payout_id,
                transfer_id: None,
                detail: Some(reason),
            },
            ExecuteOutcome::Failed { error } => Self {
                outcome: "failed".to_string(),
                payout_id,
                transfer_id: None,
                detail: Some(error),
            },
            ExecuteOutcome::OutcomeUnknown => Self {
                outcome: "unknown".to_string(),
                payout_id,
                transfer_id: None,
                detail: Some("transfer timed out; outcome pending reconciliation".to_string()),
            },
        }
    }
}

/// A payout-local sweep failure.
#[derive(Debug, Serialize, ToSchema)]
pub struct SweepFailureDto {
    /// The affected payout.
    pub payout_id: PayoutId,
    /// What went wrong.
    pub message: String,
}

/// Response body for `POST /payouts/execute-pending`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SweepResponse {
    /// Always `true` on 2xx, even when payout-local errors occurred.
    pub success: bool,
    /// Payouts attempted.
    pub attempted: u32,
    /// Transfers that succeeded.
    pub paid: u32,
    /// Payouts found already `paid`; no transfer was made.
    pub already_paid: u32,
    /// Payouts left pending awaiting partner onboarding.
    pub not_ready: u32,
    /// Transfers rejected by the processor.
    pub failed: u32,
    /// Calls with unknown outcome.
    pub unknown: u32,
    /// Payout-local failures.
    pub errors: Vec<SweepFailureDto>,
}

impl From<SweepSummary> for SweepResponse {
    fn from(s: SweepSummary) -> Self {
        Self {
            success: true,
            attempted: s.attempted,
            paid: s.paid,
            already_paid: s.already_paid,
            not_ready: s.not_ready,
            failed: s.failed,
            unknown: s.unknown,
            errors: s
                .errors
                .into_iter()
                .map(|e| SweepFailureDto {
                    payout_id: e.payout_id,
                    message: e.message,
                })
                .collect(),
        }
    }
}
