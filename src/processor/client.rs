//! Payments processor client: connected-account transfers.
//!
//! [`ProcessorClient`] is the seam between the payout executor and the
//! processor's HTTP API. The real client talks to the processor's
//! transfer endpoint with the payout id as idempotency key, so a retry
//! after an unknown outcome can never move funds twice.

use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::domain::PayoutId;
use crate::error::SettlementError;

/// A funds transfer to a partner's connected account.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Payout being executed; doubles as the processor idempotency key.
    pub payout_id: PayoutId,
    /// Destination connected account id.
    pub destination_account_id: String,
    /// Net amount to transfer, in currency units.
    pub amount: Decimal,
    /// ISO currency code.
    pub currency: String,
}

/// Failure modes of a transfer call.
///
/// `TimedOut` is deliberately distinct from `Rejected`: a timeout means
/// the outcome is unknown and the payout must stay `pending`, while a
/// rejection is a recorded, retryable `failed` state.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The processor rejected the transfer.
    #[error("transfer rejected by processor: {0}")]
    Rejected(String),

    /// The processor could not be reached or answered with a server
    /// error; no transfer was created.
    #[error("processor unavailable: {0}")]
    Unavailable(String),

    /// The call timed out; the outcome is unknown.
    #[error("processor call timed out; outcome unknown")]
    TimedOut,
}

/// Request/response API of the payments processor.
pub trait ProcessorClient: Send + Sync {
    /// Creates a transfer and returns the processor's transfer id.
    ///
    /// # Errors
    ///
    /// Returns a [`TransferError`] describing whether the transfer was
    /// rejected, the processor was unavailable, or the outcome is
    /// unknown.
    fn create_transfer(
        &self,
        request: &TransferRequest,
    ) -> impl std::future::Future<Output = Result<String, TransferError>> + Send;
}

/// HTTP client for the processor's connected-accounts transfer API.
#[derive(Debug, Clone)]
pub struct StripeConnectClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl StripeConnectClient {
    /// Builds a client with the given base URL, secret key, and request
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Processor`] if the underlying HTTP
    /// client cannot be constructed.
    pub fn new(
        base_url: &str,
        secret_key: &str,
        timeout_secs: u64,
    ) -> Result<Self, SettlementError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SettlementError::Processor(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }
}

impl ProcessorClient for StripeConnectClient {
    async fn create_transfer(&self, request: &TransferRequest) -> Result<String, TransferError> {
        // The processor API takes amounts in minor units.
        let cents = (request.amount * Decimal::ONE_HUNDRED)
            .trunc()
            .to_i64()
            .ok_or_else(|| TransferError::Rejected("amount not representable".to_string()))?;

        let response = self
            .http
            .post(format!("{}/v1/transfers", self.base_url))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", request.payout_id.to_string())
            .form(&[
                ("amount", cents.to_string()),
                ("currency", request.currency.clone()),
                ("destination", request.destination_account_id.clone()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransferError::TimedOut
                } else {
                    TransferError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransferError::Unavailable(e.to_string()))?;

        if status.is_client_error() {
            return Err(TransferError::Rejected(processor_message(&body)));
        }
        if !status.is_success() {
            return Err(TransferError::Unavailable(format!(
                "status {status}: {}",
                processor_message(&body)
            )));
        }

        let parsed: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| TransferError::Unavailable(format!("malformed response: {e}")))?;
        parsed
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| TransferError::Unavailable("response missing transfer id".to_string()))
    }
}

/// Extracts the processor's error message from a JSON error body,
/// falling back to the raw body.
fn processor_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

/// Scripted behavior for [`MockProcessor`].
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Every transfer succeeds with a deterministic id.
    Succeed,
    /// Every transfer is rejected with the given message.
    Reject(String),
    /// Every transfer call times out.
    TimeOut,
}

/// In-memory processor double recording every transfer attempt.
#[derive(Debug, Clone)]
pub struct MockProcessor {
    behavior: Arc<Mutex<MockBehavior>>,
    calls: Arc<Mutex<Vec<TransferRequest>>>,
}

impl MockProcessor {
    /// Creates a mock with the given scripted behavior.
    #[must_use]
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replaces the scripted behavior, for multi-phase tests.
    pub fn set_behavior(&self, behavior: MockBehavior) {
        if let Ok(mut guard) = self.behavior.lock() {
            *guard = behavior;
        }
    }

    /// Number of transfer attempts observed.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl ProcessorClient for MockProcessor {
    async fn create_transfer(&self, request: &TransferRequest) -> Result<String, TransferError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        let behavior = self
            .behavior
            .lock()
            .map(|b| b.clone())
            .unwrap_or(MockBehavior::Succeed);
        match behavior {
            MockBehavior::Succeed => Ok(format!("tr_{}", request.payout_id)),
            MockBehavior::Reject(message) => Err(TransferError::Rejected(message)),
            MockBehavior::TimeOut => Err(TransferError::TimedOut),
        }
    }
}
