//! Payments processor integration: transfer client and webhook
//! verification.

pub mod client;
pub mod webhook;

pub use client::{
    MockBehavior, MockProcessor, ProcessorClient, StripeConnectClient, TransferError,
    TransferRequest,
};
pub use webhook::{AccountObject, ProcessorEvent, SIGNATURE_HEADER, SignatureVerifier};
