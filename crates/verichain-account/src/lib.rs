//! Cryptographic operations for the attestation service.
//!
//! This crate holds the two places where key material is handled: checking a
//! caller's detached signature over their payload, and signing the ledger
//! transaction with the caller-supplied account key. Neither keeps state
//! between requests.

use alloy::primitives::Address;
use thiserror::Error;

pub mod signer;
pub mod verifier;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use signer::{derive_address, TransactionSigner};
pub use verifier::{decode_base64, PublicKey, SignatureScheme, SignatureVerifier};

/// Errors that can occur while interpreting keys or signatures.
///
/// A well-formed signature that does not match is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
	/// The public key could not be decoded or uses an unsupported algorithm.
	#[error("Malformed public key: {0}")]
	MalformedKey(String),
	/// The signature bytes are not structurally valid for the key's scheme.
	#[error("Malformed signature: {0}")]
	MalformedSignature(String),
}

/// Errors that can occur while producing a signed ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
	/// The private key is not a valid 32-byte secp256k1 scalar.
	#[error("Invalid private key: {0}")]
	InvalidPrivateKey(String),
	/// The key does not control the account the call was built for.
	#[error("Private key controls {derived}, not {expected}")]
	AddressMismatch { expected: Address, derived: Address },
	/// A fee value does not fit the transaction envelope.
	#[error("Fee out of range: {0}")]
	FeeOutOfRange(String),
	/// The signer itself failed.
	#[error("Signer error: {0}")]
	Signer(String),
}
