//! Ledger access for the attestation service.
//!
//! This crate owns everything that talks to the remote ledger: the contract
//! call-data builder and the JSON-RPC client that prices, broadcasts and
//! confirms transactions. The pipeline only sees the [`LedgerClient`] trait,
//! so tests can substitute an in-memory ledger.

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use thiserror::Error;
use verichain_types::{Receipt, SignedTransaction, UnsignedCall};

pub mod contract;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

pub use contract::{BuildError, TransactionBuilder, MAX_CALL_DATA_SIZE};

/// Errors that can occur while talking to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
	/// The node refused to estimate gas, usually because the call reverts.
	#[error("Gas estimation failed: {reason}")]
	EstimationFailed { reason: String },
	/// A read-only call reverted.
	#[error("Call failed: {reason}")]
	CallFailed { reason: String },
	/// The node could not be reached or returned a transport-level error.
	#[error("Network unavailable: {0}")]
	NetworkUnavailable(String),
	/// The node rejected the signed transaction on broadcast.
	#[error("Submission failed: {0}")]
	SubmissionFailed(String),
	/// The transaction was broadcast but no receipt was observed in time.
	#[error("Receipt unavailable: {0}")]
	ReceiptUnavailable(String),
}

/// Trait defining the operations the pipeline needs from a ledger.
///
/// Implementations must be safe to share across request tasks. None of the
/// methods retry; each call is one round trip (or, for `submit`, one
/// broadcast followed by receipt polling).
#[async_trait]
pub trait LedgerClient: Send + Sync {
	/// Chain id bound into signatures for replay protection.
	fn chain_id(&self) -> u64;

	/// Estimates the gas needed to execute `call`.
	async fn estimate_gas(&self, call: &UnsignedCall) -> Result<U256, LedgerError>;

	/// Returns the current gas price in wei.
	async fn gas_price(&self) -> Result<U256, LedgerError>;

	/// Returns the next nonce for `address`, counting pending transactions.
	async fn nonce(&self, address: &Address) -> Result<u64, LedgerError>;

	/// Executes `call` without creating a transaction and returns its output.
	async fn call(&self, call: &UnsignedCall) -> Result<Bytes, LedgerError>;

	/// Broadcasts a signed envelope and waits for its receipt.
	///
	/// The envelope is consumed: a transaction is handed to the ledger once.
	async fn submit(&self, tx: SignedTransaction) -> Result<Receipt, LedgerError>;
}
