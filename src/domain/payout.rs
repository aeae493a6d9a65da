//! Payout aggregates: period math and commission/tax arithmetic.
//!
//! The money split is computed exactly once at aggregation time and
//! stored; it is never silently recomputed in place. The canonical
//! composition is `commission = total * rate`, `tax = commission *
//! tax_rate`, `net = total - commission - tax`.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::ids::PayoutId;
use crate::error::SettlementError;

/// Lifecycle state of a payout.
///
/// `paid` is terminal; `failed` is retryable by re-invoking the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    /// Created by aggregation, funds not yet moved.
    Pending,
    /// Funds transferred; terminal.
    Paid,
    /// Processor rejected the transfer; retryable.
    Failed,
}

impl PayoutStatus {
    /// Returns the database/wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
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
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            other => Err(SettlementError::InvalidValue(format!(
                "unknown payout status '{other}'"
            ))),
        }
    }
}

/// Inclusive date range of a settled calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PayoutPeriod {
    /// First day of the period.
    pub start: NaiveDate,
    /// Last day of the period, inclusive.
    pub end: NaiveDate,
}

/// A partner-period financial aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct Payout {
    /// Row identifier.
    pub id: PayoutId,
    /// Partner owed the payout.
    pub partner_id: Uuid,
    /// First day of the settled period.
    pub period_start: NaiveDate,
    /// Last day of the settled period, inclusive.
    pub period_end: NaiveDate,
    /// Sum of eligible booking amounts in the period.
    pub total_amount: Decimal,
    /// Platform commission withheld.
    pub commission_amount: Decimal,
    /// Tax on the commission.
    pub commission_tax: Decimal,
    /// Amount actually transferred to the partner.
    pub net_payout_amount: Decimal,
    /// Lifecycle state.
    pub status: PayoutStatus,
    /// Processor transfer id, once paid.
    pub transfer_id: Option<String>,
    /// Funds-moved timestamp, once paid.
    pub paid_at: Option<DateTime<Utc>>,
    /// Last processor error, for operator visibility on failed payouts.
    pub last_error: Option<String>,
    /// Aggregation time.
    pub created_at: DateTime<Utc>,
}

/// Commission/tax split of a period total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutBreakdown {
    /// Sum of eligible booking amounts.
    pub total: Decimal,
    /// `total * commission_rate`, rounded to cents.
    pub commission: Decimal,
    /// `commission * tax_rate`, rounded to cents.
    pub tax: Decimal,
    /// `total - commission - tax`.
    pub net: Decimal,
}

/// Computes the commission/tax split for a period total.
///
/// Rates are fractions (`0.15` for 15%). Intermediate values are rounded
/// to two decimal places; the net is derived by subtraction so the three
/// parts always sum back to the total.
#[must_use]
pub fn compute_breakdown(total: Decimal, commission_rate: Decimal, tax_rate: Decimal) -> PayoutBreakdown {
    let commission = (total * commission_rate).round_dp(2);
    let tax = (commission * tax_rate).round_dp(2);
    let net = total - commission - tax;
    PayoutBreakdown {
        total,
        commission,
        tax,
        net,
    }
}

/// Determines the closed calendar month ending at `reference`.
///
/// A reference date that is the last day of a month closes that same
/// month (so a trigger on January 31st settles January); any other date
/// settles the previous calendar month.
#[must_use]
pub fn closed_period(reference: NaiveDate) -> PayoutPeriod {
    let first_of_month = reference.with_day(1).unwrap_or(reference);
    let first_of_next = first_of_month
        .checked_add_months(Months::new(1))
        .unwrap_or(first_of_month);
    let last_of_month = first_of_next
        .checked_sub_days(Days::new(1))
        .unwrap_or(reference);

    if reference == last_of_month {
        return PayoutPeriod {
            start: first_of_month,
            end: last_of_month,
        };
    }

    let start = first_of_month
        .checked_sub_months(Months::new(1))
        .unwrap_or(first_of_month);
    let end = first_of_month
        .checked_sub_days(Days::new(1))
        .unwrap_or(first_of_month);
    PayoutPeriod { start, end }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        let Some(date) = NaiveDate::from_ymd_opt(y, m, d) else {
            panic!("valid date");
        };
        date
    }

    #[test]
    fn worked_example_from_source_data() {
        // total=775.00, commission 15%, tax 0 → commission 116.25, net 658.75
        let split = compute_breakdown(
            Decimal::new(77_500, 2),
            Decimal::new(15, 2),
            Decimal::ZERO,
        );
        assert_eq!(split.commission, Decimal::new(11_625, 2));
        assert_eq!(split.tax, Decimal::ZERO);
        assert_eq!(split.net, Decimal::new(65_875, 2));
    }

    #[test]
    fn tax_composes_on_commission() {
        // total=1000.00, commission 10% = 100.00, tax 20% of commission = 20.00
        let split = compute_breakdown(
            Decimal::new(100_000, 2),
            Decimal::new(10, 2),
            Decimal::new(20, 2),
        );
        assert_eq!(split.commission, Decimal::new(10_000, 2));
        assert_eq!(split.tax, Decimal::new(2_000, 2));
        assert_eq!(split.net, Decimal::new(88_000, 2));
        assert_eq!(split.commission + split.tax + split.net, split.total);
    }

    #[test]
    fn last_day_of_month_closes_that_month() {
        let period = closed_period(date(2026, 1, 31));
        assert_eq!(period.start, date(2026, 1, 1));
        assert_eq!(period.end, date(2026, 1, 31));
    }

    #[test]
    fn mid_month_closes_previous_month() {
        let period = closed_period(date(2026, 2, 15));
        assert_eq!(period.start, date(2026, 1, 1));
        assert_eq!(period.end, date(2026, 1, 31));
    }

    #[test]
    fn first_of_month_closes_previous_month() {
        let period = closed_period(date(2026, 3, 1));
        assert_eq!(period.start, date(2026, 2, 1));
        assert_eq!(period.end, date(2026, 2, 28));
    }

    #[test]
    fn leap_february_end_is_recognized() {
        let period = closed_period(date(2024, 2, 29));
        assert_eq!(period.start, date(2024, 2, 1));
        assert_eq!(period.end, date(2024, 2, 29));
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [PayoutStatus::Pending, PayoutStatus::Paid, PayoutStatus::Failed] {
            let Ok(parsed) = PayoutStatus::parse(status.as_str()) else {
                panic!("round trip failed");
            };
            assert_eq!(parsed, status);
        }
    }
}
