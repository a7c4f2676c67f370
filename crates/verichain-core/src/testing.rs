//! In-memory ledger for pipeline and router tests.
//!
//! Every operation returns a canned result and bumps a counter, so tests can
//! assert both the outcome of a run and which ledger calls it made.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolValue;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use verichain_ledger::contract::IVerificationLedger;
use verichain_ledger::{LedgerClient, LedgerError};
use verichain_types::{
	BlockNumber, Receipt, ReceiptStatus, SignedTransaction, UnsignedCall,
};

pub use verichain_account::testing::*;

/// Contract address the mock pretends to host.
pub const MOCK_CONTRACT: &str = "0x192b8B54b3c86f1Bd45804DC8AaD50ee9627604F";
pub const MOCK_CHAIN_ID: u64 = 31337;

/// Ledger operations, for counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerOp {
	EstimateGas,
	GasPrice,
	Nonce,
	Call,
	Submit,
}

/// Receipt `{ status 1, hash 0xdead, block 42 }`.
pub fn confirmed_receipt() -> Receipt {
	let mut receipt = Receipt::new(
		Some("0xdead".parse().expect("valid hex")),
		BlockNumber::Mined(U256::from(42u64)),
		ReceiptStatus::Success,
	);
	receipt.gas_used = Some(U256::from(21_000u64));
	receipt.effective_gas_price = Some(U256::from(1_000_000_000u64));
	receipt
}

/// ABI-encodes `getBlocks()` output for `(data, signature, publicKey, timestamp)` entries.
pub fn encode_blocks(blocks: &[(&str, &str, &str, u64)]) -> Bytes {
	let blocks: Vec<IVerificationLedger::Block> = blocks
		.iter()
		.map(|(data, signature, public_key, timestamp)| IVerificationLedger::Block {
			data: data.to_string(),
			signature: signature.to_string(),
			publicKey: public_key.to_string(),
			timestamp: U256::from(*timestamp),
		})
		.collect();
	Bytes::from((blocks,).abi_encode_params())
}

/// Canned-response ledger.
pub struct MockLedger {
	chain_id: u64,
	estimate: Result<U256, LedgerError>,
	gas_price: Result<U256, LedgerError>,
	nonce: Result<u64, LedgerError>,
	call: Result<Bytes, LedgerError>,
	submit: Result<Receipt, LedgerError>,
	delays: HashMap<LedgerOp, Duration>,
	counts: HashMap<LedgerOp, AtomicUsize>,
	submitted: Mutex<Vec<Bytes>>,
}

impl Default for MockLedger {
	fn default() -> Self {
		Self::new()
	}
}

impl MockLedger {
	/// Estimate 21000, price 1 gwei, nonce 0, no blocks, confirmed receipt.
	pub fn new() -> Self {
		let counts = [
			LedgerOp::EstimateGas,
			LedgerOp::GasPrice,
			LedgerOp::Nonce,
			LedgerOp::Call,
			LedgerOp::Submit,
		]
		.into_iter()
		.map(|op| (op, AtomicUsize::new(0)))
		.collect();

		Self {
			chain_id: MOCK_CHAIN_ID,
			estimate: Ok(U256::from(21_000u64)),
			gas_price: Ok(U256::from(1_000_000_000u64)),
			nonce: Ok(0),
			call: Ok(encode_blocks(&[])),
			submit: Ok(confirmed_receipt()),
			delays: HashMap::new(),
			counts,
			submitted: Mutex::new(Vec::new()),
		}
	}

	pub fn with_estimate(mut self, result: Result<U256, LedgerError>) -> Self {
		self.estimate = result;
		self
	}

	pub fn with_gas_price(mut self, result: Result<U256, LedgerError>) -> Self {
		self.gas_price = result;
		self
	}

	pub fn with_nonce(mut self, result: Result<u64, LedgerError>) -> Self {
		self.nonce = result;
		self
	}

	pub fn with_call(mut self, result: Result<Bytes, LedgerError>) -> Self {
		self.call = result;
		self
	}

	pub fn with_blocks(self, blocks: &[(&str, &str, &str, u64)]) -> Self {
		self.with_call(Ok(encode_blocks(blocks)))
	}

	pub fn with_submit(mut self, result: Result<Receipt, LedgerError>) -> Self {
		self.submit = result;
		self
	}

	/// Makes `op` sleep for `delay` before answering.
	pub fn with_delay(mut self, op: LedgerOp, delay: Duration) -> Self {
		self.delays.insert(op, delay);
		self
	}

	pub fn count(&self, op: LedgerOp) -> usize {
		self.counts
			.get(&op)
			.map(|c| c.load(Ordering::SeqCst))
			.unwrap_or(0)
	}

	pub fn total_calls(&self) -> usize {
		self.counts.values().map(|c| c.load(Ordering::SeqCst)).sum()
	}

	/// Raw envelopes handed to `submit`, in order.
	pub async fn submitted(&self) -> Vec<Bytes> {
		self.submitted.lock().await.clone()
	}

	async fn enter(&self, op: LedgerOp) {
		if let Some(counter) = self.counts.get(&op) {
			counter.fetch_add(1, Ordering::SeqCst);
		}
		if let Some(delay) = self.delays.get(&op) {
			tokio::time::sleep(*delay).await;
		}
	}
}

#[async_trait]
impl LedgerClient for MockLedger {
	fn chain_id(&self) -> u64 {
		self.chain_id
	}

	async fn estimate_gas(&self, _call: &UnsignedCall) -> Result<U256, LedgerError> {
		self.enter(LedgerOp::EstimateGas).await;
		self.estimate.clone()
	}

	async fn gas_price(&self) -> Result<U256, LedgerError> {
		self.enter(LedgerOp::GasPrice).await;
		self.gas_price.clone()
	}

	async fn nonce(&self, _address: &Address) -> Result<u64, LedgerError> {
		self.enter(LedgerOp::Nonce).await;
		self.nonce.clone()
	}

	async fn call(&self, _call: &UnsignedCall) -> Result<Bytes, LedgerError> {
		self.enter(LedgerOp::Call).await;
		self.call.clone()
	}

	async fn submit(&self, tx: SignedTransaction) -> Result<Receipt, LedgerError> {
		self.submitted.lock().await.push(tx.raw);
		self.enter(LedgerOp::Submit).await;
		self.submit.clone()
	}
}
