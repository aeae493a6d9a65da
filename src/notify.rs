//! Payout statement notifications.
//!
//! Statement delivery is a collaborator of the payout executor, never a
//! participant in its transaction: a notification failure is logged and
//! reported separately, and must not roll back or delay the financial
//! state transition. Delivery retries a bounded number of times with
//! exponential backoff before being marked permanently failed.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::PayoutId;
use crate::error::SettlementError;

/// The statement emitted to a partner after a successful payout.
#[derive(Debug, Clone)]
pub struct PayoutStatement {
    /// Payout the statement describes.
    pub payout_id: PayoutId,
    /// Receiving partner.
    pub partner_id: Uuid,
    /// First day of the settled period.
    pub period_start: NaiveDate,
    /// Last day of the settled period.
    pub period_end: NaiveDate,
    /// Net amount transferred.
    pub net_amount: Decimal,
    /// Processor transfer id.
    pub transfer_id: String,
}

/// Delivery channel for payout statements (email + PDF in production).
pub trait NotificationSink: Send + Sync {
    /// Delivers one statement.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError`] when delivery fails; the caller
    /// decides whether to retry.
    fn send_statement(
        &self,
        statement: &PayoutStatement,
    ) -> impl std::future::Future<Output = Result<(), SettlementError>> + Send;
}

/// Sink that logs statements through `tracing` instead of delivering
/// them. Used in development and as the default wiring until an email
/// provider is configured.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    async fn send_statement(&self, statement: &PayoutStatement) -> Result<(), SettlementError> {
        tracing::info!(
            payout_id = %statement.payout_id,
            partner_id = %statement.partner_id,
            net_amount = %statement.net_amount,
            transfer_id = %statement.transfer_id,
            "payout statement"
        );
        Ok(())
    }
}

/// Delivers a statement with bounded exponential backoff.
///
/// Attempts `max_attempts` deliveries, sleeping `base_delay_ms`,
/// `2 * base_delay_ms`, ... between attempts. Returns the last error if
/// every attempt fails.
///
/// # Errors
///
/// Returns the final delivery error after retries are exhausted.
pub async fn send_with_retry<N: NotificationSink>(
    sink: &N,
    statement: &PayoutStatement,
    max_attempts: u32,
    base_delay_ms: u64,
) -> Result<(), SettlementError> {
    let attempts = max_attempts.max(1);
    let mut delay_ms = base_delay_ms;
    let mut last_error = SettlementError::Internal("no delivery attempt made".to_string());

    for attempt in 1..=attempts {
        match sink.send_statement(statement).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                tracing::warn!(
                    payout_id = %statement.payout_id,
                    attempt,
                    error = %err,
                    "statement delivery failed"
                );
                last_error = err;
                if attempt < attempts {
                    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                    delay_ms = delay_ms.saturating_mul(2);
                }
            }
        }
    }
    Err(last_error)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug, Default)]
    struct FlakySink {
        calls: AtomicU32,
        succeed_on: u32,
    }

    impl NotificationSink for FlakySink {
        async fn send_statement(&self, _: &PayoutStatement) -> Result<(), SettlementError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.succeed_on != 0 && n >= self.succeed_on {
                Ok(())
            } else {
                Err(SettlementError::Internal("smtp down".to_string()))
            }
        }
    }

    fn statement() -> PayoutStatement {
        PayoutStatement {
            payout_id: PayoutId::new(),
            partner_id: Uuid::from_u128(7),
            period_start: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or_default(),
            period_end: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap_or_default(),
            net_amount: Decimal::new(65_875, 2),
            transfer_id: "tr_1".to_string(),
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let sink = FlakySink {
            calls: AtomicU32::new(0),
            succeed_on: 2,
        };
        let result = send_with_retry(&sink, &statement(), 3, 1).await;
        assert!(result.is_ok());
        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let sink = FlakySink {
            calls: AtomicU32::new(0),
            succeed_on: 0,
        };
        let result = send_with_retry(&sink, &statement(), 3, 1).await;
        assert!(result.is_err());
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
    }
}
