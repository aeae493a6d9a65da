//! Data Transfer Objects for REST request/response serialization.
//!
//! Monetary amounts use [`rust_decimal::Decimal`], which serializes as
//! a JSON number with exact decimal precision.

pub mod booking_dto;
pub mod payout_dto;
pub mod reward_dto;

pub use booking_dto::*;
pub use payout_dto::*;
pub use reward_dto::*;
