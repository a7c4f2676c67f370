//! Ledger-facing types for the attestation pipeline.
//!
//! These types describe calls, fees, signed envelopes and receipts exchanged
//! with the remote ledger. All of them are request-scoped.

use crate::utils::{with_0x_prefix, without_0x_prefix};
use crate::wire::tagged;
use alloy::primitives::{Address, Bytes, U256};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Ledger transaction hash.
///
/// Stored as raw bytes so receipts from nodes that return shortened or
/// non-standard hashes still round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionHash(pub Vec<u8>);

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&with_0x_prefix(&hex::encode(&self.0)))
	}
}

impl Serialize for TransactionHash {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl FromStr for TransactionHash {
	type Err = hex::FromHexError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		hex::decode(without_0x_prefix(s)).map(TransactionHash)
	}
}

/// A contract invocation that has not been priced or signed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedCall {
	/// The pinned contract address.
	pub to: Address,
	/// The account the call is made on behalf of.
	pub from: Address,
	/// ABI-encoded selector and arguments.
	pub input: Bytes,
}

/// Fee bounds for a transaction.
///
/// Both values are full-width integers; narrowing to the envelope's native
/// widths happens only at signing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeParameters {
	pub gas_limit: U256,
	pub gas_price: U256,
}

/// A signed, encoded transaction envelope.
///
/// Not `Clone`: an envelope is handed to the ledger by value and can be
/// submitted at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct SignedTransaction {
	/// Hash of the signed envelope.
	pub hash: TransactionHash,
	/// EIP-2718 encoded bytes sent with `eth_sendRawTransaction`.
	pub raw: Bytes,
}

/// Block in which a transaction was included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockNumber {
	Mined(U256),
	Pending,
}

impl fmt::Display for BlockNumber {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			BlockNumber::Mined(n) => write!(f, "{}", n),
			BlockNumber::Pending => f.write_str("pending"),
		}
	}
}

impl Serialize for BlockNumber {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			BlockNumber::Mined(n) => tagged::serialize(n, serializer),
			BlockNumber::Pending => serializer.serialize_str("pending"),
		}
	}
}

/// Execution status reported by a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
	Failure = 0,
	Success = 1,
}

impl ReceiptStatus {
	pub fn code(self) -> u8 {
		self as u8
	}
}

impl Serialize for ReceiptStatus {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		tagged::serialize_decimal(&self.code().to_string(), serializer)
	}
}

impl From<bool> for ReceiptStatus {
	fn from(success: bool) -> Self {
		if success {
			ReceiptStatus::Success
		} else {
			ReceiptStatus::Failure
		}
	}
}

impl TryFrom<u64> for ReceiptStatus {
	type Error = String;

	fn try_from(code: u64) -> Result<Self, Self::Error> {
		match code {
			0 => Ok(ReceiptStatus::Failure),
			1 => Ok(ReceiptStatus::Success),
			other => Err(format!("invalid receipt status {}", other)),
		}
	}
}

/// Confirmation record for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
	/// Missing only when the node returned a malformed receipt.
	pub transaction_hash: Option<TransactionHash>,
	pub block_number: BlockNumber,
	pub status: ReceiptStatus,
	#[serde(with = "tagged::option")]
	pub gas_used: Option<U256>,
	#[serde(with = "tagged::option")]
	pub effective_gas_price: Option<U256>,
}

impl Receipt {
	/// Creates a receipt with only the fields the pipeline inspects.
	pub fn new(
		transaction_hash: Option<TransactionHash>,
		block_number: BlockNumber,
		status: ReceiptStatus,
	) -> Self {
		Self {
			transaction_hash,
			block_number,
			status,
			gas_used: None,
			effective_gas_price: None,
		}
	}

	pub fn is_success(&self) -> bool {
		self.status == ReceiptStatus::Success
	}
}

/// One entry of a caller's append-only record set on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
	/// Position in the caller's record set.
	pub index: u64,
	pub data: String,
	pub signature: String,
	pub public_key: String,
	/// Ledger timestamp at which the entry was written.
	#[serde(with = "tagged")]
	pub timestamp: U256,
}
