//! Database row models and their conversions into domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{
    Booking, BookingId, BookingSource, BookingStatus, Partner, Payout, PayoutId, PayoutStatus,
};
use crate::error::SettlementError;

/// A row from the `bookings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BookingRow {
    /// Row identifier.
    pub id: Uuid,
    /// Customer reference.
    pub user_id: Uuid,
    /// Offer reference.
    pub offer_id: Uuid,
    /// Optional offer variant reference.
    pub variant_id: Option<Uuid>,
    /// Partner owning the offer.
    pub partner_id: Uuid,
    /// Status string (`pending`/`confirmed`/`cancelled`).
    pub status: String,
    /// Monetary amount.
    pub amount: Decimal,
    /// Source string (`stripe`/`calendly`/`manual`).
    pub source: String,
    /// Correlation id of the creating signal.
    pub external_id: String,
    /// Scheduled meeting time.
    pub booking_date: Option<DateTime<Utc>>,
    /// Meeting location.
    pub meeting_location: Option<String>,
    /// Cancellation reason.
    pub cancellation_reason: Option<String>,
    /// Refund flag.
    pub refunded: bool,
    /// Payout eligibility flag.
    pub is_payout_eligible: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl BookingRow {
    /// Converts the row into the domain type.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidValue`] if a status or source
    /// string in the database is unknown.
    pub fn into_domain(self) -> Result<Booking, SettlementError> {
        Ok(Booking {
            id: BookingId::from_uuid(self.id),
            user_id: self.user_id,
            offer_id: self.offer_id,
            variant_id: self.variant_id,
            partner_id: self.partner_id,
            status: BookingStatus::parse(&self.status)?,
            amount: self.amount,
            source: BookingSource::parse(&self.source)?,
            external_id: self.external_id,
            booking_date: self.booking_date,
            meeting_location: self.meeting_location,
            cancellation_reason: self.cancellation_reason,
            refunded: self.refunded,
            is_payout_eligible: self.is_payout_eligible,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A row from the `payouts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PayoutRow {
    /// Row identifier.
    pub id: Uuid,
    /// Partner reference.
    pub partner_id: Uuid,
    /// Period start date.
    pub period_start: NaiveDate,
    /// Period end date, inclusive.
    pub period_end: NaiveDate,
    /// Sum of eligible booking amounts.
    pub total_amount: Decimal,
    /// Platform commission.
    pub commission_amount: Decimal,
    /// Tax on the commission.
    pub commission_tax: Decimal,
    /// Net amount transferred to the partner.
    pub net_payout_amount: Decimal,
    /// Status string (`pending`/`paid`/`failed`).
    pub status: String,
    /// Processor transfer id.
    pub transfer_id: Option<String>,
    /// Funds-moved timestamp.
    pub paid_at: Option<DateTime<Utc>>,
    /// Last processor error text.
    pub last_error: Option<String>,
    /// Aggregation time.
    pub created_at: DateTime<Utc>,
}

impl PayoutRow {
    /// Converts the row into the domain type.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidValue`] if the status string in
    /// the database is unknown.
    pub fn into_domain(self) -> Result<Payout, SettlementError> {
        Ok(Payout {
            id: PayoutId::from_uuid(self.id),
            partner_id: self.partner_id,
            period_start: self.period_start,
            period_end: self.period_end,
            total_amount: self.total_amount,
            commission_amount: self.commission_amount,
            commission_tax: self.commission_tax,
            net_payout_amount: self.net_payout_amount,
            status: PayoutStatus::parse(&self.status)?,
            transfer_id: self.transfer_id,
            paid_at: self.paid_at,
            last_error: self.last_error,
            created_at: self.created_at,
        })
    }
}

/// A row from the `partners` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PartnerRow {
    /// Partner reference.
    pub id: Uuid,
    /// Display name.
    pub display_name: String,
    /// Commission fraction.
    pub commission_rate: Decimal,
    /// Processor connected account id.
    pub processor_account_id: Option<String>,
    /// Processor-asserted transfer capability.
    pub charges_enabled: bool,
    /// Processor-side payout schedule.
    pub payout_schedule: Option<String>,
}

impl From<PartnerRow> for Partner {
    fn from(row: PartnerRow) -> Self {
        Self {
            id: row.id,
            display_name: row.display_name,
            commission_rate: row.commission_rate,
            processor_account_id: row.processor_account_id,
            charges_enabled: row.charges_enabled,
            payout_schedule: row.payout_schedule,
        }
    }
}
