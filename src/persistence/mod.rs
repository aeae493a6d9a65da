//! Persistence layer: the ledger store trait, its PostgreSQL
//! implementation, and an in-memory double for tests.
//!
//! All cross-entity updates (booking confirm + reward earn, payout
//! status + transfer id) commit in a single transaction, so a crash
//! between steps can never leave money moved with a disagreeing record.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use memory::MemoryLedger;
pub use postgres::PostgresLedger;
pub use store::{
    AwardOutcome, CancelOutcome, ConfirmOutcome, LedgerStore, PartnerPeriodTotal,
};
