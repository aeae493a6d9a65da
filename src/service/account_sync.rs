//! Connected-account state synchronization.
//!
//! The processor is the source of truth for whether a partner's account
//! can receive transfers. `charges_enabled` is written here and nowhere
//! else; execution paths only ever read it.

use std::sync::Arc;

use crate::error::SettlementError;
use crate::persistence::LedgerStore;
use crate::processor::{AccountObject, ProcessorEvent};

/// What a webhook delivery did to local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A partner account's capability flags were updated.
    AccountUpdated {
        /// The processor account id.
        account_id: String,
        /// Whether the account can now receive charges.
        charges_enabled: bool,
    },
    /// The event named an account no partner is linked to.
    UnknownAccount {
        /// The processor account id.
        account_id: String,
    },
    /// An event type this service does not act on. Acknowledged so the
    /// processor stops redelivering it.
    Ignored {
        /// The delivered event type.
        event_type: String,
    },
}

/// Applies verified processor events to partner records.
#[derive(Debug, Clone)]
pub struct AccountSyncService<L> {
    ledger: Arc<L>,
}

impl<L: LedgerStore> AccountSyncService<L> {
    /// Creates a new `AccountSyncService`.
    #[must_use]
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// Dispatches one verified event. Unrecognized event types are
    /// acknowledged without side effects.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the partner update fails.
    pub async fn handle(&self, event: ProcessorEvent) -> Result<SyncOutcome, SettlementError> {
        match event.event_type.as_str() {
            "account.updated" => self.apply_account_update(&event).await,
            other => {
                tracing::debug!(event_id = event.id, event_type = other, "event ignored");
                Ok(SyncOutcome::Ignored {
                    event_type: other.to_string(),
                })
            }
        }
    }

    async fn apply_account_update(
        &self,
        event: &ProcessorEvent,
    ) -> Result<SyncOutcome, SettlementError> {
        let account: AccountObject = serde_json::from_value(event.data.object.clone())
            .map_err(|e| SettlementError::InvalidRequest(format!("malformed account object: {e}")))?;

        let updated = self
            .ledger
            .set_charges_enabled(&account.id, account.charges_enabled, account.schedule_interval())
            .await?;

        if updated {
            tracing::info!(
                account_id = account.id,
                charges_enabled = account.charges_enabled,
                "partner account capabilities updated"
            );
            Ok(SyncOutcome::AccountUpdated {
                account_id: account.id,
                charges_enabled: account.charges_enabled,
            })
        } else {
            tracing::warn!(account_id = account.id, "event for unlinked account");
            Ok(SyncOutcome::UnknownAccount {
                account_id: account.id,
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::*;
    use crate::domain::Partner;
    use crate::persistence::MemoryLedger;

    fn event(event_type: &str, object: serde_json::Value) -> ProcessorEvent {
        let Ok(event) = serde_json::from_value(serde_json::json!({
            "id": "evt_1",
            "type": event_type,
            "data": { "object": object },
        })) else {
            panic!("event construction failed");
        };
        event
    }

    fn harness() -> (AccountSyncService<MemoryLedger>, Arc<MemoryLedger>) {
        let ledger = Arc::new(MemoryLedger::new());
        let Ok(()) = ledger.add_partner(Partner {
            id: Uuid::from_u128(7),
            display_name: "Studio One".to_string(),
            commission_rate: Decimal::new(15, 2),
            processor_account_id: Some("acct_42".to_string()),
            charges_enabled: false,
            payout_schedule: None,
        }) else {
            panic!("seed failed");
        };
        (AccountSyncService::new(Arc::clone(&ledger)), ledger)
    }

    #[tokio::test]
    async fn account_updated_flips_charges_enabled() {
        let (service, ledger) = harness();
        let evt = event(
            "account.updated",
            serde_json::json!({
                "id": "acct_42",
                "charges_enabled": true,
                "settings": { "payouts": { "schedule": { "interval": "weekly" } } },
            }),
        );

        let Ok(SyncOutcome::AccountUpdated {
            account_id,
            charges_enabled,
        }) = service.handle(evt).await
        else {
            panic!("expected account update");
        };
        assert_eq!(account_id, "acct_42");
        assert!(charges_enabled);

        let Ok(partner) = ledger.partner(Uuid::from_u128(7)).await else {
            panic!("partner lookup failed");
        };
        assert!(partner.charges_enabled);
        assert_eq!(partner.payout_schedule.as_deref(), Some("weekly"));
    }

    #[tokio::test]
    async fn event_can_disable_charges_again() {
        let (service, ledger) = harness();
        let enable = event(
            "account.updated",
            serde_json::json!({ "id": "acct_42", "charges_enabled": true }),
        );
        let Ok(_) = service.handle(enable).await else {
            panic!("handle failed");
        };
        let disable = event(
            "account.updated",
            serde_json::json!({ "id": "acct_42", "charges_enabled": false }),
        );
        let Ok(_) = service.handle(disable).await else {
            panic!("handle failed");
        };

        let Ok(partner) = ledger.partner(Uuid::from_u128(7)).await else {
            panic!("partner lookup failed");
        };
        assert!(!partner.charges_enabled);
    }

    #[tokio::test]
    async fn unlinked_account_is_reported() {
        let (service, _) = harness();
        let evt = event(
            "account.updated",
            serde_json::json!({ "id": "acct_unknown", "charges_enabled": true }),
        );
        let Ok(SyncOutcome::UnknownAccount { account_id }) = service.handle(evt).await else {
            panic!("expected unknown account");
        };
        assert_eq!(account_id, "acct_unknown");
    }

    #[tokio::test]
    async fn unrelated_events_are_acknowledged() {
        let (service, ledger) = harness();
        let evt = event("payment_intent.succeeded", serde_json::json!({ "id": "pi_1" }));
        let Ok(SyncOutcome::Ignored { event_type }) = service.handle(evt).await else {
            panic!("expected ignored outcome");
        };
        assert_eq!(event_type, "payment_intent.succeeded");

        let Ok(partner) = ledger.partner(Uuid::from_u128(7)).await else {
            panic!("partner lookup failed");
        };
        assert!(!partner.charges_enabled);
    }
}
