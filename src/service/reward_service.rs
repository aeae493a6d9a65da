//! Reward ledger service.
//!
//! Translates award requests into guarded ledger appends. A duplicate
//! booking-derived award is logged and reported as not applied — never
//! surfaced as an error, never double counted.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::SettlementError;
use crate::persistence::{AwardOutcome, LedgerStore};

/// Orchestrates reward point awards and balance reads.
#[derive(Debug, Clone)]
pub struct RewardService<L> {
    ledger: Arc<L>,
}

impl<L: LedgerStore> RewardService<L> {
    /// Creates a new `RewardService`.
    #[must_use]
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// Awards a signed point amount to a user.
    ///
    /// When `metadata` carries a `booking_id`, the award is idempotent
    /// with respect to that booking and the sign of the amount.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidRequest`] for a zero amount and
    /// [`SettlementError::UserNotFound`] for unknown users.
    pub async fn award(
        &self,
        user_id: Uuid,
        amount: i64,
        reason: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<AwardOutcome, SettlementError> {
        if amount == 0 {
            return Err(SettlementError::InvalidRequest(
                "amount must be non-zero".to_string(),
            ));
        }
        if reason.trim().is_empty() {
            return Err(SettlementError::InvalidRequest(
                "reason is required".to_string(),
            ));
        }

        let metadata = metadata.unwrap_or_else(|| serde_json::json!({}));
        let booking_id = metadata
            .get("booking_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok());

        let outcome = self
            .ledger
            .award_points(user_id, amount, reason, booking_id, metadata)
            .await?;

        if outcome.applied {
            tracing::info!(%user_id, amount, reason, "reward entry applied");
        } else {
            tracing::info!(%user_id, amount, ?booking_id, "duplicate reward entry ignored");
        }
        Ok(outcome)
    }

    /// Reads the user's current point balance.
    ///
    /// # Errors
    ///
    /// Returns a persistence error from the ledger.
    pub async fn balance(&self, user_id: Uuid) -> Result<i64, SettlementError> {
        self.ledger.reward_balance(user_id).await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::MemoryLedger;

    fn service_with_user(user_id: Uuid) -> RewardService<MemoryLedger> {
        let ledger = Arc::new(MemoryLedger::new());
        let Ok(()) = ledger.add_user(user_id) else {
            panic!("seed failed");
        };
        RewardService::new(ledger)
    }

    #[tokio::test]
    async fn booking_derived_award_is_idempotent() {
        let user = Uuid::from_u128(1);
        let service = service_with_user(user);
        let booking = Uuid::from_u128(9);
        let metadata = serde_json::json!({ "booking_id": booking.to_string() });

        let Ok(first) = service
            .award(user, 50, "booking confirmed", Some(metadata.clone()))
            .await
        else {
            panic!("award failed");
        };
        let Ok(second) = service
            .award(user, 50, "booking confirmed", Some(metadata))
            .await
        else {
            panic!("award failed");
        };

        assert!(first.applied);
        assert!(!second.applied);
        assert_eq!(second.balance, 50);
    }

    #[tokio::test]
    async fn earn_and_reversal_coexist_for_one_booking() {
        let user = Uuid::from_u128(1);
        let service = service_with_user(user);
        let booking = Uuid::from_u128(9);
        let metadata = serde_json::json!({ "booking_id": booking.to_string() });

        let Ok(earn) = service.award(user, 80, "earn", Some(metadata.clone())).await else {
            panic!("award failed");
        };
        let Ok(reversal) = service.award(user, -80, "reversal", Some(metadata)).await else {
            panic!("award failed");
        };
        assert!(earn.applied);
        assert!(reversal.applied);
        assert_eq!(reversal.balance, 0);
    }

    #[tokio::test]
    async fn manual_awards_are_not_deduplicated() {
        let user = Uuid::from_u128(1);
        let service = service_with_user(user);

        let Ok(first) = service.award(user, 10, "referral bonus", None).await else {
            panic!("award failed");
        };
        let Ok(second) = service.award(user, 10, "referral bonus", None).await else {
            panic!("award failed");
        };
        assert!(first.applied);
        assert!(second.applied);
        assert_eq!(second.balance, 20);
    }

    #[tokio::test]
    async fn unknown_user_is_rejected() {
        let service = RewardService::new(Arc::new(MemoryLedger::new()));
        let result = service.award(Uuid::from_u128(42), 10, "earn", None).await;
        assert!(matches!(result, Err(SettlementError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn unknown_user_balance_reads_as_zero() {
        let service = RewardService::new(Arc::new(MemoryLedger::new()));
        let Ok(balance) = service.balance(Uuid::from_u128(42)).await else {
            panic!("balance failed");
        };
        assert_eq!(balance, 0);
    }

    #[tokio::test]
    async fn zero_amount_is_rejected() {
        let user = Uuid::from_u128(1);
        let service = service_with_user(user);
        assert!(service.award(user, 0, "noop", None).await.is_err());
    }
}
