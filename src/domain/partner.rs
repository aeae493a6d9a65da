//! Partner model with processor connected-account state.

use rust_decimal::Decimal;
use uuid::Uuid;

/// A marketplace partner and their connected account with the payments
/// processor.
///
/// `charges_enabled` is the source of truth for whether the payout
/// executor may attempt a transfer. It is only ever written by the
/// processor webhook handler; the executor reads it, never sets it.
#[derive(Debug, Clone, PartialEq)]
pub struct Partner {
    /// Partner reference.
    pub id: Uuid,
    /// Display name used on statements.
    pub display_name: String,
    /// Commission fraction withheld by the platform (e.g. `0.15`).
    pub commission_rate: Decimal,
    /// Connected account id at the payments processor, once onboarded.
    pub processor_account_id: Option<String>,
    /// Processor-asserted capability to receive transfers.
    pub charges_enabled: bool,
    /// Processor-side payout schedule (e.g. `"monthly"`).
    pub payout_schedule: Option<String>,
}

impl Partner {
    /// Whether the payout executor may attempt a transfer right now.
    #[must_use]
    pub fn transfer_ready(&self) -> bool {
        self.charges_enabled && self.processor_account_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_requires_account_and_capability() {
        let mut partner = Partner {
            id: Uuid::from_u128(1),
            display_name: "Studio One".to_string(),
            commission_rate: Decimal::new(15, 2),
            processor_account_id: None,
            charges_enabled: false,
            payout_schedule: None,
        };
        assert!(!partner.transfer_ready());

        partner.processor_account_id = Some("acct_123".to_string());
        assert!(!partner.transfer_ready());

        partner.charges_enabled = true;
        assert!(partner.transfer_ready());
    }
}
