//! Ledger client over Ethereum JSON-RPC.
//!
//! This module provides the production [`LedgerClient`], built on an Alloy
//! `RootProvider` over HTTP. The provider carries no wallet or fillers: fees,
//! nonces and signatures are computed by the pipeline and only the raw
//! envelope is broadcast.

use crate::{LedgerClient, LedgerError};
use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{TransactionInput, TransactionReceipt, TransactionRequest};
use alloy::transports::TransportError;
use async_trait::async_trait;
use std::time::Duration;
use verichain_config::LedgerConfig;
use verichain_types::{
	BlockNumber, Receipt, ReceiptStatus, SignedTransaction, TransactionHash, UnsignedCall,
};

/// Alloy-based EVM ledger client.
pub struct AlloyLedger {
	provider: RootProvider,
	chain_id: u64,
	poll_interval: Duration,
	confirmation_timeout: Duration,
	min_confirmations: u64,
}

impl AlloyLedger {
	/// Connects to the configured RPC endpoint.
	///
	/// When the configuration pins a chain id it is used as is and no request
	/// is made; otherwise the id is fetched from the node once.
	pub async fn connect(config: &LedgerConfig) -> Result<Self, LedgerError> {
		let url = config.rpc_url.trim().parse().map_err(|e| {
			LedgerError::NetworkUnavailable(format!("Invalid RPC URL: {}", e))
		})?;
		let provider = RootProvider::new_http(url);

		let chain_id = match config.chain_id {
			Some(id) => id,
			None => tokio::time::timeout(config.rpc_timeout(), provider.get_chain_id())
				.await
				.map_err(|_| {
					LedgerError::NetworkUnavailable("Timed out fetching chain id".to_string())
				})?
				.map_err(|e| {
					LedgerError::NetworkUnavailable(format!("Failed to get chain id: {}", e))
				})?,
		};

		tracing::info!(chain_id, "Connected to ledger");

		Ok(Self {
			provider,
			chain_id,
			poll_interval: config.poll_interval(),
			confirmation_timeout: config.confirmation_timeout(),
			min_confirmations: config.min_confirmations.max(1),
		})
	}

	fn request(call: &UnsignedCall) -> TransactionRequest {
		TransactionRequest::default()
			.from(call.from)
			.to(call.to)
			.input(TransactionInput::new(call.input.clone()))
	}

	/// Polls for the receipt of `hash` until it has enough confirmations.
	async fn wait_for_confirmation(&self, hash: B256) -> Result<TransactionReceipt, LedgerError> {
		let start_time = tokio::time::Instant::now();

		tracing::info!(
			tx_hash = %hash,
			confirmations = self.min_confirmations,
			timeout_secs = self.confirmation_timeout.as_secs(),
			"Waiting for confirmation"
		);

		loop {
			if start_time.elapsed() > self.confirmation_timeout {
				return Err(LedgerError::ReceiptUnavailable(format!(
					"No receipt for {} after {} seconds",
					hash,
					self.confirmation_timeout.as_secs()
				)));
			}

			let receipt = match self.provider.get_transaction_receipt(hash).await {
				Ok(Some(receipt)) => receipt,
				Ok(None) => {
					// Not mined yet
					tokio::time::sleep(self.poll_interval).await;
					continue;
				},
				Err(e) => {
					tracing::warn!(tx_hash = %hash, error = %e, "Receipt poll failed, retrying");
					tokio::time::sleep(self.poll_interval).await;
					continue;
				},
			};

			let Some(tx_block) = receipt.block_number() else {
				tokio::time::sleep(self.poll_interval).await;
				continue;
			};

			if self.min_confirmations == 1 {
				return Ok(receipt);
			}

			let current_block = match self.provider.get_block_number().await {
				Ok(block) => block,
				Err(e) => {
					tracing::warn!(error = %e, "Block number poll failed, retrying");
					tokio::time::sleep(self.poll_interval).await;
					continue;
				},
			};
			// The inclusion block counts as the first confirmation.
			let confirmations = current_block.saturating_sub(tx_block) + 1;
			if confirmations >= self.min_confirmations {
				return Ok(receipt);
			}

			tracing::debug!(
				"Waiting for {} more confirmations...",
				self.min_confirmations - confirmations
			);
			tokio::time::sleep(self.poll_interval).await;
		}
	}
}

/// Best description of a failed call: the decoded revert reason if the node
/// returned revert data, otherwise the node's error message.
fn failure_reason(err: &TransportError) -> String {
	match err.as_error_resp() {
		Some(payload) => payload
			.as_revert_data()
			.and_then(|data| alloy::sol_types::decode_revert_reason(&data))
			.unwrap_or_else(|| payload.message.to_string()),
		None => err.to_string(),
	}
}

fn convert_receipt(receipt: &TransactionReceipt) -> Receipt {
	let hash = receipt.transaction_hash();
	Receipt {
		transaction_hash: (hash != B256::ZERO).then(|| TransactionHash(hash.to_vec())),
		block_number: receipt
			.block_number()
			.map(|n| BlockNumber::Mined(U256::from(n)))
			.unwrap_or(BlockNumber::Pending),
		status: ReceiptStatus::from(receipt.status()),
		gas_used: Some(U256::from(receipt.gas_used())),
		effective_gas_price: Some(U256::from(receipt.effective_gas_price())),
	}
}

#[async_trait]
impl LedgerClient for AlloyLedger {
	fn chain_id(&self) -> u64 {
		self.chain_id
	}

	async fn estimate_gas(&self, call: &UnsignedCall) -> Result<U256, LedgerError> {
		match self.provider.estimate_gas(Self::request(call)).await {
			Ok(gas) => Ok(U256::from(gas)),
			// A JSON-RPC error object means the node evaluated the call.
			Err(e) if e.as_error_resp().is_some() => Err(LedgerError::EstimationFailed {
				reason: failure_reason(&e),
			}),
			Err(e) => Err(LedgerError::NetworkUnavailable(format!(
				"Failed to estimate gas: {}",
				e
			))),
		}
	}

	async fn gas_price(&self) -> Result<U256, LedgerError> {
		let gas_price = self
			.provider
			.get_gas_price()
			.await
			.map_err(|e| LedgerError::NetworkUnavailable(format!("Failed to get gas price: {}", e)))?;

		Ok(U256::from(gas_price))
	}

	async fn nonce(&self, address: &Address) -> Result<u64, LedgerError> {
		self.provider
			.get_transaction_count(*address)
			.pending()
			.await
			.map_err(|e| LedgerError::NetworkUnavailable(format!("Failed to get nonce: {}", e)))
	}

	async fn call(&self, call: &UnsignedCall) -> Result<Bytes, LedgerError> {
		match self.provider.call(Self::request(call)).await {
			Ok(output) => Ok(output),
			Err(e) if e.as_error_resp().is_some() => Err(LedgerError::CallFailed {
				reason: failure_reason(&e),
			}),
			Err(e) => Err(LedgerError::NetworkUnavailable(format!(
				"Failed to call contract: {}",
				e
			))),
		}
	}

	async fn submit(&self, tx: SignedTransaction) -> Result<Receipt, LedgerError> {
		let pending_tx = self
			.provider
			.send_raw_transaction(&tx.raw)
			.await
			.map_err(|e| LedgerError::SubmissionFailed(failure_reason(&e)))?;

		let tx_hash = *pending_tx.tx_hash();
		tracing::info!(tx_hash = %tx_hash, chain_id = self.chain_id, "Submitted transaction");

		let receipt = self.wait_for_confirmation(tx_hash).await?;
		Ok(convert_receipt(&receipt))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use verichain_config::Config;

	const CONFIG: &str = r#"
[service]
id = "ledger-test"

[ledger]
rpc_url = "http://127.0.0.1:1"
contract_address = "0x192b8B54b3c86f1Bd45804DC8AaD50ee9627604F"
chain_id = 31337
rpc_timeout_seconds = 1
"#;

	#[tokio::test]
	async fn test_connect_with_pinned_chain_id_makes_no_request() {
		let config: Config = CONFIG.parse().unwrap();
		let ledger = AlloyLedger::connect(&config.ledger).await.unwrap();
		assert_eq!(ledger.chain_id(), 31337);
		assert_eq!(ledger.min_confirmations, 1);
	}

	#[tokio::test]
	async fn test_unreachable_node_is_network_error() {
		let config: Config = CONFIG.parse().unwrap();
		let ledger = AlloyLedger::connect(&config.ledger).await.unwrap();

		let result = ledger.gas_price().await;
		assert!(matches!(result, Err(LedgerError::NetworkUnavailable(_))));

		let call = UnsignedCall {
			to: Address::ZERO,
			from: Address::ZERO,
			input: Bytes::new(),
		};
		let result = ledger.estimate_gas(&call).await;
		assert!(matches!(result, Err(LedgerError::NetworkUnavailable(_))));
	}

	#[tokio::test]
	async fn test_receipt_poll_errors_retry_until_timeout() {
		let config: Config = CONFIG.parse().unwrap();
		let mut ledger = AlloyLedger::connect(&config.ledger).await.unwrap();
		ledger.poll_interval = Duration::from_millis(50);
		ledger.confirmation_timeout = Duration::from_millis(400);

		let started = std::time::Instant::now();
		let result = ledger.wait_for_confirmation(B256::repeat_byte(0xab)).await;

		// Every poll fails to connect; the loop keeps going until the deadline.
		assert!(started.elapsed() >= Duration::from_millis(400));
		match result {
			Err(LedgerError::ReceiptUnavailable(message)) => {
				assert!(message.starts_with("No receipt for"), "{}", message)
			},
			other => panic!("expected a confirmation timeout, got {:?}", other.map(|_| ())),
		}
	}
}
