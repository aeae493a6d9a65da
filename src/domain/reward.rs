//! Reward ledger entries: append-only signed point deltas per user.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

/// Kind discriminator for a reward ledger entry.
///
/// Together with the booking id this carries the double-count guard: at
/// most one `earn` and at most one `reversal` may exist per booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardEntryKind {
    /// Points earned on booking confirmation.
    Earn,
    /// Points deducted on a refunded cancellation.
    Reversal,
    /// Operator-issued adjustment, not tied to a booking transition.
    Manual,
}

impl RewardEntryKind {
    /// Returns the database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Earn => "earn",
            Self::Reversal => "reversal",
            Self::Manual => "manual",
        }
    }

    /// Kind implied by the sign of a booking-derived amount.
    #[must_use]
    pub const fn for_amount(amount: i64) -> Self {
        if amount >= 0 { Self::Earn } else { Self::Reversal }
    }
}

/// An immutable signed-amount record attributing a point delta to a user.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RewardEntry {
    /// Ledger sequence number.
    pub id: i64,
    /// User the delta applies to.
    pub user_id: Uuid,
    /// Signed point amount.
    pub amount: i64,
    /// Human-readable reason.
    pub reason: String,
    /// Triggering booking, when booking-derived.
    pub booking_id: Option<Uuid>,
    /// Entry kind discriminator.
    pub kind: RewardEntryKind,
    /// Free-form metadata carried alongside the entry.
    pub metadata: serde_json::Value,
    /// Append time.
    pub created_at: DateTime<Utc>,
}

/// Points earned for a confirmed monetary amount: one point per whole
/// currency unit.
#[must_use]
pub fn points_for_amount(amount: Decimal) -> i64 {
    amount.trunc().to_i64().unwrap_or(0).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_truncate_to_whole_units() {
        assert_eq!(points_for_amount(Decimal::new(10_050, 2)), 100); // 100.50
        assert_eq!(points_for_amount(Decimal::new(9_999, 2)), 99); // 99.99
        assert_eq!(points_for_amount(Decimal::ZERO), 0);
    }

    #[test]
    fn negative_amounts_never_earn() {
        assert_eq!(points_for_amount(Decimal::new(-500, 2)), 0);
    }

    #[test]
    fn kind_follows_sign() {
        assert_eq!(RewardEntryKind::for_amount(100), RewardEntryKind::Earn);
        assert_eq!(RewardEntryKind::for_amount(-100), RewardEntryKind::Reversal);
    }
}
