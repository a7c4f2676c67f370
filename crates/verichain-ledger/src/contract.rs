//! Call-data construction for the record-keeping contract.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use thiserror::Error;
use verichain_types::{BlockRecord, UnsignedCall};

sol! {
	/// Per-account append-only record set.
	interface IVerificationLedger {
		struct Block {
			string data;
			string signature;
			string publicKey;
			uint256 timestamp;
		}

		function addBlock(string data, string signature, string publicKey) external;
		function getBlocks() external view returns (Block[] memory);
		function updateBlock(uint256 index, string newData) external;
	}
}

/// Largest call-data accepted by ledger nodes' transaction pools.
pub const MAX_CALL_DATA_SIZE: usize = 128 * 1024;

/// Errors that can occur while building or decoding contract calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
	/// The call cannot be represented as a ledger transaction.
	#[error("Encoding error: {0}")]
	Encoding(String),
	/// Returned data does not match the contract interface.
	#[error("Decoding error: {0}")]
	Decoding(String),
}

/// Builds calls against one pinned contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionBuilder {
	contract: Address,
}

impl TransactionBuilder {
	pub fn new(contract: Address) -> Self {
		Self { contract }
	}

	pub fn contract(&self) -> Address {
		self.contract
	}

	/// `addBlock(data, signature, publicKey)` on behalf of `from`.
	///
	/// The arguments are stored as given; signature and key stay in the
	/// caller's base64 form.
	pub fn record_verification(
		&self,
		from: Address,
		data: &str,
		signature: &str,
		public_key: &str,
	) -> Result<UnsignedCall, BuildError> {
		let input = IVerificationLedger::addBlockCall {
			data: data.to_string(),
			signature: signature.to_string(),
			publicKey: public_key.to_string(),
		}
		.abi_encode();
		self.unsigned(from, input)
	}

	/// `updateBlock(index, newData)` on behalf of `from`.
	pub fn update_block(
		&self,
		from: Address,
		index: u64,
		new_data: &str,
	) -> Result<UnsignedCall, BuildError> {
		let input = IVerificationLedger::updateBlockCall {
			index: U256::from(index),
			newData: new_data.to_string(),
		}
		.abi_encode();
		self.unsigned(from, input)
	}

	/// `getBlocks()` as seen by `from`.
	pub fn get_blocks(&self, from: Address) -> Result<UnsignedCall, BuildError> {
		self.unsigned(from, IVerificationLedger::getBlocksCall {}.abi_encode())
	}

	/// Decodes the output of a `getBlocks()` call into indexed records.
	pub fn decode_blocks(output: &[u8]) -> Result<Vec<BlockRecord>, BuildError> {
		let blocks = IVerificationLedger::getBlocksCall::abi_decode_returns(output)
			.map_err(|e| BuildError::Decoding(e.to_string()))?;

		Ok(blocks
			.into_iter()
			.enumerate()
			.map(|(index, block)| BlockRecord {
				index: index as u64,
				data: block.data,
				signature: block.signature,
				public_key: block.publicKey,
				timestamp: block.timestamp,
			})
			.collect())
	}

	fn unsigned(&self, from: Address, input: Vec<u8>) -> Result<UnsignedCall, BuildError> {
		if input.len() > MAX_CALL_DATA_SIZE {
			return Err(BuildError::Encoding(format!(
				"call data is {} bytes (max: {} bytes)",
				input.len(),
				MAX_CALL_DATA_SIZE
			)));
		}
		Ok(UnsignedCall {
			to: self.contract,
			from,
			input: Bytes::from(input),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::sol_types::SolValue;

	const CONTRACT: &str = "0x192b8B54b3c86f1Bd45804DC8AaD50ee9627604F";
	const USER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

	fn builder() -> TransactionBuilder {
		TransactionBuilder::new(CONTRACT.parse().unwrap())
	}

	#[test]
	fn test_record_verification_encodes_arguments() {
		let from: Address = USER.parse().unwrap();
		let call = builder()
			.record_verification(from, "hello", "c2lnbmF0dXJl", "cHVibGljS2V5")
			.unwrap();

		assert_eq!(call.to, builder().contract());
		assert_eq!(call.from, from);
		assert_eq!(&call.input[..4], IVerificationLedger::addBlockCall::SELECTOR.as_slice());

		let decoded = IVerificationLedger::addBlockCall::abi_decode(&call.input).unwrap();
		assert_eq!(decoded.data, "hello");
		assert_eq!(decoded.signature, "c2lnbmF0dXJl");
		assert_eq!(decoded.publicKey, "cHVibGljS2V5");
	}

	#[test]
	fn test_builder_is_deterministic() {
		let from: Address = USER.parse().unwrap();
		let a = builder().update_block(from, 3, "new").unwrap();
		let b = builder().update_block(from, 3, "new").unwrap();
		assert_eq!(a, b);

		let decoded = IVerificationLedger::updateBlockCall::abi_decode(&a.input).unwrap();
		assert_eq!(decoded.index, U256::from(3u64));
		assert_eq!(decoded.newData, "new");
	}

	#[test]
	fn test_oversized_call_is_encoding_error() {
		let from: Address = USER.parse().unwrap();
		let data = "x".repeat(MAX_CALL_DATA_SIZE);
		let result = builder().record_verification(from, &data, "sig", "key");
		assert!(matches!(result, Err(BuildError::Encoding(_))));
	}

	#[test]
	fn test_decode_blocks_assigns_indices() {
		let blocks = vec![
			IVerificationLedger::Block {
				data: "first".to_string(),
				signature: "s1".to_string(),
				publicKey: "k1".to_string(),
				timestamp: U256::from(1_700_000_000u64),
			},
			IVerificationLedger::Block {
				data: "second".to_string(),
				signature: "s2".to_string(),
				publicKey: "k2".to_string(),
				timestamp: U256::from(1_700_000_100u64),
			},
		];
		let output = (blocks,).abi_encode_params();

		let records = TransactionBuilder::decode_blocks(&output).unwrap();
		assert_eq!(records.len(), 2);
		assert_eq!(records[1].index, 1);
		assert_eq!(records[1].data, "second");
		assert_eq!(records[0].public_key, "k1");
		assert_eq!(records[0].timestamp, U256::from(1_700_000_000u64));
	}

	#[test]
	fn test_decode_empty_output_is_error() {
		assert!(matches!(
			TransactionBuilder::decode_blocks(&[]),
			Err(BuildError::Decoding(_))
		));
	}
}
