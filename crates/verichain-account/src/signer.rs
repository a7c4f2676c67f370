//! Ledger transaction signing with a caller-supplied key.
//!
//! Produces EIP-155 legacy envelopes: a single gas price, chain id bound
//! into the signature. The key is parsed, used and dropped inside one call.

use crate::SigningError;
use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, TxKind, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use verichain_types::{
	FeeParameters, SecretString, SignedTransaction, TransactionHash, UnsignedCall,
};

/// Parses a hex private key, with or without `0x`.
fn parse_key(private_key: &SecretString) -> Result<PrivateKeySigner, SigningError> {
	private_key.with_exposed(|key| {
		key.trim()
			.parse::<PrivateKeySigner>()
			// The parser's message can echo input; keep it generic.
			.map_err(|_| {
				SigningError::InvalidPrivateKey("expected 32 bytes of hex".to_string())
			})
	})
}

/// Returns the account address controlled by `private_key`.
pub fn derive_address(private_key: &SecretString) -> Result<Address, SigningError> {
	parse_key(private_key).map(|signer| signer.address())
}

/// Signs unsigned calls into submit-ready envelopes.
pub struct TransactionSigner;

impl TransactionSigner {
	/// Signs `call` with the given fee, nonce and chain id.
	///
	/// The key must control `call.from`; otherwise the ledger would attribute
	/// the record to a different account than the one estimated against.
	pub fn sign(
		call: &UnsignedCall,
		fee: &FeeParameters,
		nonce: u64,
		chain_id: u64,
		private_key: &SecretString,
	) -> Result<SignedTransaction, SigningError> {
		let signer = parse_key(private_key)?;
		let derived = signer.address();
		if derived != call.from {
			return Err(SigningError::AddressMismatch {
				expected: call.from,
				derived,
			});
		}

		let gas_limit = u64::try_from(fee.gas_limit).map_err(|_| {
			SigningError::FeeOutOfRange(format!("gas limit {} exceeds u64", fee.gas_limit))
		})?;
		let gas_price = u128::try_from(fee.gas_price).map_err(|_| {
			SigningError::FeeOutOfRange(format!("gas price {} exceeds u128", fee.gas_price))
		})?;

		let tx = TxLegacy {
			chain_id: Some(chain_id),
			nonce,
			gas_price,
			gas_limit,
			to: TxKind::Call(call.to),
			value: U256::ZERO,
			input: call.input.clone(),
		};

		let signature = signer
			.sign_hash_sync(&tx.signature_hash())
			.map_err(|e| SigningError::Signer(e.to_string()))?;
		let signed = tx.into_signed(signature);
		let hash = *signed.hash();
		let envelope = TxEnvelope::from(signed);

		tracing::debug!(
			from = %derived,
			nonce,
			chain_id,
			tx_hash = %hash,
			"Signed ledger transaction"
		);

		Ok(SignedTransaction {
			hash: TransactionHash(hash.to_vec()),
			raw: envelope.encoded_2718().into(),
		})
	}
}
