//! Application services orchestrating the ledger, the processor, and
//! notifications.

pub mod account_sync;
pub mod booking_service;
pub mod payout_service;
pub mod reward_service;

pub use account_sync::{AccountSyncService, SyncOutcome};
pub use booking_service::BookingService;
pub use payout_service::{
    ExecuteOutcome, GenerateSummary, PartnerFailure, PayoutPolicy, PayoutService, SweepFailure,
    SweepSummary,
};
pub use reward_service::RewardService;
