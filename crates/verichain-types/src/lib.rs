//! Common types for the VeriChain attestation service.
//!
//! Request and response bodies, ledger records, the wire codec for
//! arbitrary-precision integers and the redacting secret holder all live
//! here so every crate agrees on one set of definitions.

/// API response types and the HTTP error mapping.
pub mod api;
/// Ledger-facing calls, envelopes and receipts.
pub mod ledger;
/// Inbound request bodies and their validated forms.
pub mod request;
/// Zeroizing holder for caller-supplied private keys.
pub mod secret_string;
/// Utility functions for hex and display formatting.
pub mod utils;
/// Codec for tagged big integers on the JSON wire.
pub mod wire;

pub use api::*;
pub use ledger::*;
pub use request::*;
pub use secret_string::SecretString;
pub use utils::{truncate_id, with_0x_prefix, without_0x_prefix};
pub use wire::{ToWire, WireError, WireValue};
