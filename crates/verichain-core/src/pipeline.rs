//! The verification pipeline.
//!
//! One invocation handles one request from validation to a terminal state.
//! Steps run strictly in sequence, every ledger call is made at most once,
//! and nothing is retried: a failure ends the run and is reported as a
//! [`PipelineError`].

use crate::state::{FailureReason, PipelineError, PipelineState, StateTracker};
use alloy::primitives::Address;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use verichain_account::{SignatureVerifier, TransactionSigner};
use verichain_config::{ConfigError, LedgerConfig};
use verichain_ledger::{LedgerClient, LedgerError, TransactionBuilder};
use verichain_types::{
	truncate_id, BlockRecord, FeeParameters, GetBlocksRequest, GetBlocksSubmission, Receipt, SecretString,
	UnsignedCall, UpdateBlockRequest, UpdateBlockSubmission, VerificationRequest,
	VerificationSubmission,
};

/// Immutable settings shared by every run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
	pub builder: TransactionBuilder,
	/// Bound for each ledger round trip other than `submit`.
	pub rpc_timeout: Duration,
	/// How long `submit` may wait for a receipt.
	pub confirmation_timeout: Duration,
}

impl PipelineSettings {
	pub fn from_config(config: &LedgerConfig) -> Result<Self, ConfigError> {
		Ok(Self {
			builder: TransactionBuilder::new(config.contract_address()?),
			rpc_timeout: config.rpc_timeout(),
			confirmation_timeout: config.confirmation_timeout(),
		})
	}
}

/// Outcome of a successful record update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
	/// Index of the record that was overwritten.
	pub index: u64,
	pub receipt: Receipt,
}

/// Runs verification, lookup and update requests against a ledger.
#[derive(Clone)]
pub struct VerificationPipeline {
	ledger: Arc<dyn LedgerClient>,
	settings: Arc<PipelineSettings>,
}

impl VerificationPipeline {
	pub fn new(ledger: Arc<dyn LedgerClient>, settings: PipelineSettings) -> Self {
		Self {
			ledger,
			settings: Arc::new(settings),
		}
	}

	pub fn chain_id(&self) -> u64 {
		self.ledger.chain_id()
	}

	pub fn contract(&self) -> Address {
		self.settings.builder.contract()
	}

	/// Verifies a payload signature and records it on the ledger.
	///
	/// Returns the receipt of the confirmed transaction. A mined but
	/// reverted transaction is reported as `FailureReason::OnChainRejected`.
	#[instrument(skip_all, fields(user = tracing::field::Empty))]
	pub async fn verify(&self, submission: VerificationSubmission) -> Result<Receipt, PipelineError> {
		let mut tracker = StateTracker::new();
		let result = self.run_verify(&mut tracker, submission).await;
		log_outcome(result.as_ref());
		result
	}

	async fn run_verify(
		&self,
		tracker: &mut StateTracker,
		submission: VerificationSubmission,
	) -> Result<Receipt, PipelineError> {
		let VerificationRequest {
			data,
			public_key,
			signature,
			user_address,
			private_key,
		} = VerificationRequest::try_from(submission).map_err(|e| tracker.fail(e.into()))?;
		tracker.advance(PipelineState::Validated)?;
		tracing::Span::current().record("user", tracing::field::display(user_address));

		match SignatureVerifier::verify_encoded(&data, &public_key, &signature) {
			Ok(true) => {},
			Ok(false) => {
				return Err(tracker.fail(FailureReason::SignatureInvalid(
					"signature does not match the data and public key".to_string(),
				)))
			},
			Err(e) => return Err(tracker.fail(FailureReason::SignatureInvalid(e.to_string()))),
		}
		tracker.advance(PipelineState::SignatureVerified)?;

		let call = self
			.settings
			.builder
			.record_verification(user_address, &data, &signature, &public_key)
			.map_err(|e| tracker.fail(e.into()))?;

		self.execute(tracker, call, private_key).await
	}

	/// Lists the records held by an account.
	#[instrument(skip_all, fields(user = tracing::field::Empty))]
	pub async fn get_blocks(
		&self,
		submission: GetBlocksSubmission,
	) -> Result<Vec<BlockRecord>, PipelineError> {
		let mut tracker = StateTracker::new();
		let request =
			GetBlocksRequest::try_from(submission).map_err(|e| tracker.fail(e.into()))?;
		tracker.advance(PipelineState::Validated)?;
		tracing::Span::current().record("user", tracing::field::display(request.user_address));

		let result = self.load_blocks(&mut tracker, request.user_address).await;
		match &result {
			Ok(blocks) => tracing::info!(count = blocks.len(), "Fetched blocks"),
			Err(e) => tracing::error!(failed_at = %e.failed_at, error = %e.reason, "Block lookup failed"),
		}
		result
	}

	/// Overwrites the data of the caller's most recent record.
	///
	/// The target index is read and then written without a lock, so two
	/// concurrent updates for one account may target the same record.
	#[instrument(skip_all, fields(user = tracing::field::Empty))]
	pub async fn update_block(
		&self,
		submission: UpdateBlockSubmission,
	) -> Result<UpdateOutcome, PipelineError> {
		let mut tracker = StateTracker::new();
		let result = self.run_update(&mut tracker, submission).await;
		log_outcome(result.as_ref().map(|outcome| &outcome.receipt));
		result
	}

	async fn run_update(
		&self,
		tracker: &mut StateTracker,
		submission: UpdateBlockSubmission,
	) -> Result<UpdateOutcome, PipelineError> {
		let UpdateBlockRequest {
			user_address,
			private_key,
			new_data,
		} = UpdateBlockRequest::try_from(submission).map_err(|e| tracker.fail(e.into()))?;
		tracker.advance(PipelineState::Validated)?;
		tracing::Span::current().record("user", tracing::field::display(user_address));

		let blocks = self.load_blocks(tracker, user_address).await?;
		let Some(index) = blocks.last().map(|block| block.index) else {
			return Err(tracker.fail(FailureReason::NoBlocks));
		};
		tracing::debug!(index, "Updating most recent block");

		let call = self
			.settings
			.builder
			.update_block(user_address, index, &new_data)
			.map_err(|e| tracker.fail(e.into()))?;

		let receipt = self
			.execute(tracker, call, private_key)
			.await
			.map_err(|mut err| {
				if let FailureReason::OnChainRejected { record_index, .. } = &mut err.reason {
					*record_index = Some(index);
				}
				err
			})?;
		Ok(UpdateOutcome { index, receipt })
	}

	async fn load_blocks(
		&self,
		tracker: &mut StateTracker,
		user: Address,
	) -> Result<Vec<BlockRecord>, PipelineError> {
		let call = self
			.settings
			.builder
			.get_blocks(user)
			.map_err(|e| tracker.fail(e.into()))?;
		let output = self
			.bounded("eth_call", self.ledger.call(&call))
			.await
			.map_err(|e| tracker.fail(e.into()))?;
		let blocks = TransactionBuilder::decode_blocks(&output).map_err(|e| tracker.fail(e.into()))?;
		tracker.advance(PipelineState::BlocksLoaded)?;
		Ok(blocks)
	}

	/// Prices, signs, submits and confirms `call`.
	///
	/// Shared by verification and update runs; the tracker must be in
	/// `SignatureVerified` or `BlocksLoaded`.
	async fn execute(
		&self,
		tracker: &mut StateTracker,
		call: UnsignedCall,
		private_key: SecretString,
	) -> Result<Receipt, PipelineError> {
		let gas_limit = self
			.bounded("estimate_gas", self.ledger.estimate_gas(&call))
			.await
			.map_err(|e| tracker.fail(e.into()))?;
		tracker.advance(PipelineState::GasEstimated)?;

		let gas_price = self
			.bounded("gas_price", self.ledger.gas_price())
			.await
			.map_err(|e| tracker.fail(e.into()))?;
		let nonce = self
			.bounded("nonce", self.ledger.nonce(&call.from))
			.await
			.map_err(|e| tracker.fail(e.into()))?;
		let fee = FeeParameters {
			gas_limit,
			gas_price,
		};
		tracing::debug!(%gas_limit, %gas_price, nonce, "Priced transaction");

		let signed =
			TransactionSigner::sign(&call, &fee, nonce, self.ledger.chain_id(), &private_key)
				.map_err(|e| tracker.fail(e.into()))?;
		drop(private_key);
		tracker.advance(PipelineState::Signed)?;
		tracing::debug!(tx_hash = %truncate_id(&signed.hash.to_string()), "Submitting transaction");

		let budget = self.settings.confirmation_timeout + self.settings.rpc_timeout;
		let receipt = match tokio::time::timeout(budget, self.ledger.submit(signed)).await {
			Ok(Ok(receipt)) => receipt,
			Ok(Err(LedgerError::SubmissionFailed(msg))) => {
				return Err(tracker.fail(FailureReason::SubmissionFailed(msg)))
			},
			Ok(Err(e)) => {
				tracker.advance(PipelineState::Submitted)?;
				return Err(tracker.fail(e.into()));
			},
			Err(_) => {
				return Err(tracker.fail(FailureReason::ReceiptMissing(format!(
					"no receipt within {} seconds",
					budget.as_secs()
				))))
			},
		};
		tracker.advance(PipelineState::Submitted)?;

		if receipt.transaction_hash.is_none() {
			return Err(tracker.fail(FailureReason::ReceiptMissing(
				"receipt has no transaction hash".to_string(),
			)));
		}
		if !receipt.is_success() {
			return Err(tracker.fail(FailureReason::OnChainRejected {
				receipt,
				record_index: None,
			}));
		}
		tracker.advance(PipelineState::Confirmed)?;
		Ok(receipt)
	}

	/// Runs one ledger round trip under the RPC timeout.
	async fn bounded<T>(
		&self,
		operation: &str,
		fut: impl Future<Output = Result<T, LedgerError>>,
	) -> Result<T, LedgerError> {
		let timeout = self.settings.rpc_timeout;
		tokio::time::timeout(timeout, fut).await.map_err(|_| {
			LedgerError::NetworkUnavailable(format!(
				"{} timed out after {} seconds",
				operation,
				timeout.as_secs()
			))
		})?
	}
}

fn log_outcome(result: Result<&Receipt, &PipelineError>) {
	match result {
		Ok(receipt) => {
			tracing::info!(
				tx_hash = %receipt.transaction_hash.as_ref().map(ToString::to_string).unwrap_or_default(),
				block = %receipt.block_number,
				"Transaction confirmed"
			);
		},
		Err(PipelineError {
			reason: FailureReason::OnChainRejected { receipt, .. },
			..
		}) => {
			tracing::warn!(
				tx_hash = %receipt.transaction_hash.as_ref().map(ToString::to_string).unwrap_or_default(),
				block = %receipt.block_number,
				"Transaction rejected on-chain"
			);
		},
		Err(e) => {
			tracing::error!(
				failed_at = %e.failed_at,
				retry_safe = e.is_retry_safe(),
				error = %e.reason,
				"Pipeline failed"
			);
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::*;
	use alloy::consensus::{Transaction as _, TxEnvelope};
	use alloy::eips::eip2718::Decodable2718;
	use alloy::primitives::U256;
	use alloy::sol_types::SolCall;
	use verichain_ledger::contract::IVerificationLedger;
	use verichain_types::{BlockNumber, ReceiptStatus};

	fn settings() -> PipelineSettings {
		PipelineSettings {
			builder: TransactionBuilder::new(MOCK_CONTRACT.parse().unwrap()),
			rpc_timeout: Duration::from_secs(30),
			confirmation_timeout: Duration::from_secs(180),
		}
	}

	fn pipeline(ledger: &Arc<MockLedger>) -> VerificationPipeline {
		VerificationPipeline::new(ledger.clone(), settings())
	}

	fn submission(data: &str) -> VerificationSubmission {
		let id = EcdsaIdentity::from_seed(7);
		VerificationSubmission {
			data: Some(data.to_string()),
			public_key: Some(id.public_key_base64()),
			signature: Some(id.sign_der_base64(data)),
			user_address: Some(TEST_ADDRESS.to_string()),
			private_key: Some(TEST_PRIVATE_KEY.into()),
		}
	}

	fn update_submission() -> UpdateBlockSubmission {
		UpdateBlockSubmission {
			user_address: Some(TEST_ADDRESS.to_string()),
			private_key: Some(TEST_PRIVATE_KEY.into()),
			new_data: Some("updated".to_string()),
		}
	}

	#[tokio::test]
	async fn test_verify_confirms() {
		let ledger = Arc::new(MockLedger::new());
		let receipt = pipeline(&ledger).verify(submission("hello")).await.unwrap();

		assert_eq!(receipt.transaction_hash.unwrap().to_string(), "0xdead");
		assert_eq!(receipt.block_number, BlockNumber::Mined(U256::from(42u64)));
		for op in [
			LedgerOp::EstimateGas,
			LedgerOp::GasPrice,
			LedgerOp::Nonce,
			LedgerOp::Submit,
		] {
			assert_eq!(ledger.count(op), 1, "{:?}", op);
		}
		assert_eq!(ledger.count(LedgerOp::Call), 0);
	}

	#[tokio::test]
	async fn test_submitted_envelope_records_submission() {
		let ledger = Arc::new(MockLedger::new().with_nonce(Ok(5)));
		pipeline(&ledger).verify(submission("hello")).await.unwrap();

		let submitted = ledger.submitted().await;
		assert_eq!(submitted.len(), 1);
		let envelope = TxEnvelope::decode_2718(&mut submitted[0].as_ref()).unwrap();
		assert_eq!(envelope.nonce(), 5);
		assert_eq!(envelope.chain_id(), Some(MOCK_CHAIN_ID));
		assert_eq!(envelope.gas_limit(), 21_000);
		assert_eq!(envelope.gas_price(), Some(1_000_000_000));

		let call = IVerificationLedger::addBlockCall::abi_decode(envelope.input()).unwrap();
		assert_eq!(call.data, "hello");
	}

	#[tokio::test]
	async fn test_missing_field_makes_no_ledger_calls() {
		let ledger = Arc::new(MockLedger::new());
		let mut raw = submission("hello");
		raw.signature = None;

		let err = pipeline(&ledger).verify(raw).await.unwrap_err();
		assert_eq!(err.failed_at, PipelineState::Received);
		assert_eq!(err.reason, FailureReason::MissingFields(vec!["signature"]));
		assert_eq!(ledger.total_calls(), 0);
	}

	#[tokio::test]
	async fn test_malformed_address_is_invalid_field() {
		let ledger = Arc::new(MockLedger::new());
		let mut raw = submission("hello");
		raw.user_address = Some("0x1".to_string());

		let err = pipeline(&ledger).verify(raw).await.unwrap_err();
		assert!(matches!(err.reason, FailureReason::InvalidField(_)));
		assert_eq!(ledger.total_calls(), 0);
	}

	#[tokio::test]
	async fn test_malformed_public_key_skips_estimation() {
		let ledger = Arc::new(MockLedger::new());
		let mut raw = submission("hello");
		raw.public_key = Some("bm90IGEga2V5".to_string());

		let err = pipeline(&ledger).verify(raw).await.unwrap_err();
		assert_eq!(err.failed_at, PipelineState::Validated);
		assert!(matches!(err.reason, FailureReason::SignatureInvalid(_)));
		assert_eq!(ledger.count(LedgerOp::EstimateGas), 0);
	}

	#[tokio::test]
	async fn test_tampered_data_fails_verification() {
		let ledger = Arc::new(MockLedger::new());
		let mut raw = submission("hello");
		raw.data = Some("hellp".to_string());

		let err = pipeline(&ledger).verify(raw).await.unwrap_err();
		assert!(matches!(err.reason, FailureReason::SignatureInvalid(_)));
		assert!(err.is_retry_safe());
		assert_eq!(ledger.total_calls(), 0);
	}

	#[tokio::test]
	async fn test_estimation_revert() {
		let ledger = Arc::new(MockLedger::new().with_estimate(Err(
			LedgerError::EstimationFailed {
				reason: "Block limit reached".to_string(),
			},
		)));

		let err = pipeline(&ledger).verify(submission("hello")).await.unwrap_err();
		assert_eq!(err.failed_at, PipelineState::SignatureVerified);
		assert_eq!(
			err.reason,
			FailureReason::EstimationFailed("Block limit reached".to_string())
		);
		assert!(err.is_retry_safe());
		assert_eq!(ledger.count(LedgerOp::Submit), 0);
	}

	#[tokio::test]
	async fn test_gas_price_unavailable() {
		let ledger = Arc::new(
			MockLedger::new()
				.with_gas_price(Err(LedgerError::NetworkUnavailable("connection refused".into()))),
		);

		let err = pipeline(&ledger).verify(submission("hello")).await.unwrap_err();
		assert_eq!(err.failed_at, PipelineState::GasEstimated);
		assert!(matches!(err.reason, FailureReason::NetworkUnavailable(_)));
		assert_eq!(ledger.count(LedgerOp::Nonce), 0);
	}

	#[tokio::test]
	async fn test_on_chain_rejection() {
		let rejected = Receipt::new(
			Some("0x0abc".parse().unwrap()),
			BlockNumber::Mined(U256::from(43u64)),
			ReceiptStatus::Failure,
		);
		let ledger = Arc::new(MockLedger::new().with_submit(Ok(rejected.clone())));

		let err = pipeline(&ledger).verify(submission("hello")).await.unwrap_err();
		assert_eq!(err.failed_at, PipelineState::Submitted);
		assert_eq!(
			err.reason,
			FailureReason::OnChainRejected {
				receipt: rejected,
				record_index: None
			}
		);
		assert!(!err.is_retry_safe());
	}

	#[tokio::test]
	async fn test_confirmed_hash_is_echoed() {
		let confirmed = Receipt::new(
			Some("0x0abc".parse().unwrap()),
			BlockNumber::Mined(U256::from(7u64)),
			ReceiptStatus::Success,
		);
		let ledger = Arc::new(MockLedger::new().with_submit(Ok(confirmed)));

		let receipt = pipeline(&ledger).verify(submission("hello")).await.unwrap();
		assert_eq!(receipt.transaction_hash.unwrap().to_string(), "0x0abc");
	}

	#[tokio::test]
	async fn test_receipt_without_hash() {
		let receipt = Receipt::new(
			None,
			BlockNumber::Mined(U256::from(7u64)),
			ReceiptStatus::Success,
		);
		let ledger = Arc::new(MockLedger::new().with_submit(Ok(receipt)));

		let err = pipeline(&ledger).verify(submission("hello")).await.unwrap_err();
		assert!(matches!(err.reason, FailureReason::ReceiptMissing(_)));
		assert!(!err.is_retry_safe());
	}

	#[tokio::test]
	async fn test_broadcast_failure() {
		let ledger = Arc::new(
			MockLedger::new().with_submit(Err(LedgerError::SubmissionFailed("nonce too low".into()))),
		);

		let err = pipeline(&ledger).verify(submission("hello")).await.unwrap_err();
		assert_eq!(err.failed_at, PipelineState::Signed);
		assert_eq!(
			err.reason,
			FailureReason::SubmissionFailed("nonce too low".to_string())
		);
	}

	#[tokio::test]
	async fn test_wrong_key_fails_signing() {
		let ledger = Arc::new(MockLedger::new());
		let mut raw = submission("hello");
		raw.user_address = Some("0x70997970C51812dc3A010C7d01b50e0d17dc79C8".to_string());

		let err = pipeline(&ledger).verify(raw).await.unwrap_err();
		assert_eq!(err.failed_at, PipelineState::GasEstimated);
		assert!(matches!(err.reason, FailureReason::SigningFailed(_)));
		assert_eq!(ledger.count(LedgerOp::Submit), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_estimation_timeout() {
		let ledger = Arc::new(
			MockLedger::new().with_delay(LedgerOp::EstimateGas, Duration::from_secs(31)),
		);

		let err = pipeline(&ledger).verify(submission("hello")).await.unwrap_err();
		assert_eq!(err.failed_at, PipelineState::SignatureVerified);
		assert!(matches!(err.reason, FailureReason::NetworkUnavailable(_)));
		assert_eq!(ledger.count(LedgerOp::GasPrice), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_confirmation_timeout() {
		let ledger =
			Arc::new(MockLedger::new().with_delay(LedgerOp::Submit, Duration::from_secs(600)));

		let err = pipeline(&ledger).verify(submission("hello")).await.unwrap_err();
		assert_eq!(err.failed_at, PipelineState::Signed);
		assert!(matches!(err.reason, FailureReason::ReceiptMissing(_)));
		assert!(!err.is_retry_safe());
	}

	#[tokio::test]
	async fn test_get_blocks() {
		let ledger = Arc::new(MockLedger::new().with_blocks(&[
			("first", "s1", "k1", 1_700_000_000),
			("second", "s2", "k2", 1_700_000_100),
		]));

		let blocks = pipeline(&ledger)
			.get_blocks(GetBlocksSubmission {
				user_address: Some(TEST_ADDRESS.to_string()),
			})
			.await
			.unwrap();
		assert_eq!(blocks.len(), 2);
		assert_eq!(blocks[1].data, "second");
		assert_eq!(ledger.count(LedgerOp::Call), 1);
		assert_eq!(ledger.count(LedgerOp::EstimateGas), 0);
	}

	#[tokio::test]
	async fn test_get_blocks_call_revert() {
		let ledger = Arc::new(MockLedger::new().with_call(Err(LedgerError::CallFailed {
			reason: "execution reverted".into(),
		})));

		let err = pipeline(&ledger)
			.get_blocks(GetBlocksSubmission {
				user_address: Some(TEST_ADDRESS.to_string()),
			})
			.await
			.unwrap_err();
		assert_eq!(err.reason, FailureReason::CallFailed("execution reverted".into()));
	}

	#[tokio::test]
	async fn test_update_targets_last_block() {
		let ledger = Arc::new(MockLedger::new().with_blocks(&[
			("a", "s", "k", 1),
			("b", "s", "k", 2),
			("c", "s", "k", 3),
		]));

		let outcome = pipeline(&ledger).update_block(update_submission()).await.unwrap();
		assert_eq!(outcome.index, 2);

		let submitted = ledger.submitted().await;
		let envelope = TxEnvelope::decode_2718(&mut submitted[0].as_ref()).unwrap();
		let call = IVerificationLedger::updateBlockCall::abi_decode(envelope.input()).unwrap();
		assert_eq!(call.index, U256::from(2u64));
		assert_eq!(call.newData, "updated");
	}

	#[tokio::test]
	async fn test_update_rejection_carries_target_index() {
		let mut rejected = confirmed_receipt();
		rejected.status = ReceiptStatus::Failure;
		let ledger = Arc::new(
			MockLedger::new()
				.with_blocks(&[("a", "s", "k", 1), ("b", "s", "k", 2)])
				.with_submit(Ok(rejected.clone())),
		);

		let err = pipeline(&ledger).update_block(update_submission()).await.unwrap_err();
		assert_eq!(err.failed_at, PipelineState::Submitted);
		assert_eq!(
			err.reason,
			FailureReason::OnChainRejected {
				receipt: rejected,
				record_index: Some(1)
			}
		);
	}

	#[tokio::test]
	async fn test_update_without_blocks() {
		let ledger = Arc::new(MockLedger::new());

		let err = pipeline(&ledger).update_block(update_submission()).await.unwrap_err();
		assert_eq!(err.failed_at, PipelineState::BlocksLoaded);
		assert_eq!(err.reason, FailureReason::NoBlocks);
		assert_eq!(ledger.count(LedgerOp::EstimateGas), 0);
	}

	#[tokio::test]
	async fn test_update_missing_new_data() {
		let ledger = Arc::new(MockLedger::new());
		let mut raw = update_submission();
		raw.new_data = Some("   ".to_string());

		let err = pipeline(&ledger).update_block(raw).await.unwrap_err();
		assert_eq!(err.reason, FailureReason::MissingFields(vec!["newData"]));
		assert_eq!(ledger.total_calls(), 0);
	}
}
