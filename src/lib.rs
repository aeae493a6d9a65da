//! # settlement-gateway
//!
//! Booking confirmation and partner payout settlement service for a
//! subscription marketplace.
//!
//! Two upstream systems independently confirm a reservation — the
//! payments processor settles the charge and the scheduling provider
//! syncs the calendar slot. This crate merges those signals into one
//! booking, grants loyalty points on confirmation, aggregates closed
//! calendar months into per-partner payouts, and moves funds through
//! the processor's connected-accounts API.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP) · Processor webhooks
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── BookingService / RewardService / PayoutService (service/)
//!     ├── AccountSyncService (service/)
//!     │
//!     ├── LedgerStore (persistence/) ── PostgreSQL
//!     ├── ProcessorClient (processor/) ── connected-accounts API
//!     └── NotificationSink (notify/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod notify;
pub mod persistence;
pub mod processor;
pub mod service;
