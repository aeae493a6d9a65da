//! Processor webhook signature verification and event payloads.
//!
//! The processor signs each delivery with
//! `Processor-Signature: t=<unix-ts>,v1=<hex hmac-sha256>` over
//! `"<ts>.<raw body>"`. Verification checks the timestamp against a
//! tolerance window (replay protection) and compares the digest in
//! constant time.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::SettlementError;

type HmacSha256 = Hmac<Sha256>;

/// Name of the signature header on inbound webhook deliveries.
pub const SIGNATURE_HEADER: &str = "Processor-Signature";

/// Verifies processor webhook signatures.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl SignatureVerifier {
    /// Creates a verifier for the given shared secret and timestamp
    /// tolerance.
    #[must_use]
    pub fn new(secret: &str, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.to_string(),
            tolerance_secs,
        }
    }

    /// Verifies a delivery against its signature header.
    ///
    /// `now_unix` is passed in rather than read from the clock so the
    /// tolerance window is testable.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::WebhookSignature`] when the header is
    /// malformed, the timestamp is outside the tolerance window, or the
    /// digest does not match.
    pub fn verify(
        &self,
        payload: &[u8],
        header: &str,
        now_unix: i64,
    ) -> Result<(), SettlementError> {
        let (timestamp, signature) = parse_header(header)?;

        if (now_unix - timestamp).abs() > self.tolerance_secs {
            return Err(SettlementError::WebhookSignature(
                "timestamp outside tolerance".to_string(),
            ));
        }

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| SettlementError::WebhookSignature("invalid secret".to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        let expected = hex::decode(signature)
            .map_err(|_| SettlementError::WebhookSignature("signature not hex".to_string()))?;
        mac.verify_slice(&expected)
            .map_err(|_| SettlementError::WebhookSignature("digest mismatch".to_string()))
    }
}

/// Splits `t=<ts>,v1=<sig>` into its parts.
fn parse_header(header: &str) -> Result<(i64, &str), SettlementError> {
    let mut timestamp = None;
    let mut signature = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signature = Some(value),
            _ => {}
        }
    }
    match (timestamp, signature) {
        (Some(t), Some(v1)) => Ok((t, v1)),
        _ => Err(SettlementError::WebhookSignature(
            "malformed signature header".to_string(),
        )),
    }
}

/// An inbound processor event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorEvent {
    /// Processor-assigned event id.
    pub id: String,
    /// Event type discriminator (e.g. `"account.updated"`).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload.
    pub data: EventData,
}

/// Payload wrapper of a processor event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    /// The affected object, shape depending on the event type.
    pub object: serde_json::Value,
}

/// The connected-account object carried by `account.updated` events.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountObject {
    /// Connected account id.
    pub id: String,
    /// Whether the account may receive transfers.
    #[serde(default)]
    pub charges_enabled: bool,
    /// Account settings subtree.
    #[serde(default)]
    pub settings: Option<AccountSettings>,
}

/// Settings subtree of a connected account.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSettings {
    /// Payout settings.
    #[serde(default)]
    pub payouts: Option<PayoutSettings>,
}

/// Payout settings of a connected account.
#[derive(Debug, Clone, Deserialize)]
pub struct PayoutSettings {
    /// Payout schedule.
    #[serde(default)]
    pub schedule: Option<PayoutSchedule>,
}

/// Payout schedule of a connected account.
#[derive(Debug, Clone, Deserialize)]
pub struct PayoutSchedule {
    /// Schedule interval (e.g. `"monthly"`).
    #[serde(default)]
    pub interval: Option<String>,
}

impl AccountObject {
    /// The schedule interval, when the payload carries one.
    #[must_use]
    pub fn schedule_interval(&self) -> Option<&str> {
        self.settings
            .as_ref()
            .and_then(|s| s.payouts.as_ref())
            .and_then(|p| p.schedule.as_ref())
            .and_then(|s| s.interval.as_deref())
    }
}
