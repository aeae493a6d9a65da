//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::notify::TracingSink;
use crate::persistence::PostgresLedger;
use crate::processor::{SignatureVerifier, StripeConnectClient};
use crate::service::{AccountSyncService, BookingService, PayoutService, RewardService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Booking confirmation and cancellation.
    pub bookings: Arc<BookingService<PostgresLedger>>,
    /// Loyalty point awards and balances.
    pub rewards: Arc<RewardService<PostgresLedger>>,
    /// Payout aggregation and execution.
    pub payouts: Arc<PayoutService<PostgresLedger, StripeConnectClient, TracingSink>>,
    /// Connected-account webhook dispatch.
    pub account_sync: Arc<AccountSyncService<PostgresLedger>>,
    /// Webhook signature verification.
    pub verifier: Arc<SignatureVerifier>,
}
