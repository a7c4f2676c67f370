//! Pipeline state machine.
//!
//! A run moves strictly forward through the states below and ends either in
//! `Confirmed` or in `Failed`. Record updates take the `BlocksLoaded` branch
//! in place of signature verification:
//!
//! ```text
//! Received -> Validated -> SignatureVerified -> GasEstimated -> Signed -> Submitted -> Confirmed
//!                      \-> BlocksLoaded ------/
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use verichain_account::SigningError;
use verichain_ledger::{BuildError, LedgerError};
use verichain_types::{Receipt, RequestError};

/// Position of a run in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
	Received,
	Validated,
	SignatureVerified,
	BlocksLoaded,
	GasEstimated,
	Signed,
	Submitted,
	Confirmed,
	Failed,
}

impl PipelineState {
	pub fn is_terminal(self) -> bool {
		matches!(self, PipelineState::Confirmed | PipelineState::Failed)
	}
}

impl fmt::Display for PipelineState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
	#[error("Missing required fields: {}", .0.join(", "))]
	MissingFields(Vec<&'static str>),
	#[error("{0}")]
	InvalidField(String),
	#[error("Signature verification failed: {0}")]
	SignatureInvalid(String),
	#[error("{0}")]
	Encoding(String),
	#[error("{0}")]
	EstimationFailed(String),
	#[error("{0}")]
	CallFailed(String),
	#[error("{0}")]
	NetworkUnavailable(String),
	#[error("{0}")]
	SigningFailed(String),
	#[error("{0}")]
	SubmissionFailed(String),
	#[error("{0}")]
	ReceiptMissing(String),
	/// Mined with status 0. `record_index` is set for update runs.
	#[error("Transaction rejected on-chain")]
	OnChainRejected {
		receipt: Receipt,
		record_index: Option<u64>,
	},
	#[error("No blocks found for the user")]
	NoBlocks,
	#[error("Internal error: {0}")]
	Internal(String),
}

impl FailureReason {
	/// True when nothing can have reached the ledger's mempool, so the
	/// caller may resubmit the same request without risking a duplicate.
	pub fn is_retry_safe(&self) -> bool {
		!matches!(
			self,
			FailureReason::SubmissionFailed(_)
				| FailureReason::ReceiptMissing(_)
				| FailureReason::OnChainRejected { .. }
		)
	}
}

impl From<RequestError> for FailureReason {
	fn from(err: RequestError) -> Self {
		match err {
			RequestError::MissingFields(fields) => FailureReason::MissingFields(fields),
			invalid @ RequestError::InvalidField { .. } => {
				FailureReason::InvalidField(invalid.to_string())
			},
		}
	}
}

impl From<BuildError> for FailureReason {
	fn from(err: BuildError) -> Self {
		FailureReason::Encoding(err.to_string())
	}
}

impl From<SigningError> for FailureReason {
	fn from(err: SigningError) -> Self {
		FailureReason::SigningFailed(err.to_string())
	}
}

impl From<LedgerError> for FailureReason {
	fn from(err: LedgerError) -> Self {
		match err {
			LedgerError::EstimationFailed { reason } => FailureReason::EstimationFailed(reason),
			LedgerError::CallFailed { reason } => FailureReason::CallFailed(reason),
			LedgerError::NetworkUnavailable(msg) => FailureReason::NetworkUnavailable(msg),
			LedgerError::SubmissionFailed(msg) => FailureReason::SubmissionFailed(msg),
			LedgerError::ReceiptUnavailable(msg) => FailureReason::ReceiptMissing(msg),
		}
	}
}

/// A failed run: the last state reached and the reason it stopped there.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Pipeline failed after {failed_at}: {reason}")]
pub struct PipelineError {
	pub failed_at: PipelineState,
	pub reason: FailureReason,
}

impl PipelineError {
	pub fn is_retry_safe(&self) -> bool {
		self.reason.is_retry_safe()
	}
}

#[derive(Debug, Error)]
#[error("Invalid state transition from {from} to {to}")]
struct InvalidTransition {
	from: PipelineState,
	to: PipelineState,
}

/// Records the path of one run and enforces the transition table.
#[derive(Debug)]
pub struct StateTracker {
	path: Vec<PipelineState>,
}

impl Default for StateTracker {
	fn default() -> Self {
		Self::new()
	}
}

impl StateTracker {
	pub fn new() -> Self {
		Self {
			path: vec![PipelineState::Received],
		}
	}

	pub fn current(&self) -> PipelineState {
		self.path
			.last()
			.copied()
			.unwrap_or(PipelineState::Received)
	}

	pub fn path(&self) -> &[PipelineState] {
		&self.path
	}

	/// Moves to `to`, failing the run if the transition is not allowed.
	pub fn advance(&mut self, to: PipelineState) -> Result<(), PipelineError> {
		let from = self.current();
		if to == PipelineState::Failed || !Self::is_valid_transition(from, to) {
			let err = InvalidTransition { from, to };
			return Err(self.fail(FailureReason::Internal(err.to_string())));
		}
		tracing::debug!(from = %from, to = %to, "Pipeline transition");
		self.path.push(to);
		Ok(())
	}

	/// Ends the run in `Failed` and returns the error describing it.
	pub fn fail(&mut self, reason: FailureReason) -> PipelineError {
		let failed_at = self.current();
		if failed_at != PipelineState::Failed {
			self.path.push(PipelineState::Failed);
		}
		PipelineError { failed_at, reason }
	}

	fn is_valid_transition(from: PipelineState, to: PipelineState) -> bool {
		use PipelineState::*;

		// Static transition table - each state maps to allowed next states
		static TRANSITIONS: LazyLock<HashMap<PipelineState, HashSet<PipelineState>>> =
			LazyLock::new(|| {
				let mut m = HashMap::new();
				m.insert(Received, HashSet::from([Validated, Failed]));
				m.insert(
					Validated,
					HashSet::from([SignatureVerified, BlocksLoaded, Failed]),
				);
				m.insert(SignatureVerified, HashSet::from([GasEstimated, Failed]));
				m.insert(BlocksLoaded, HashSet::from([GasEstimated, Failed]));
				m.insert(GasEstimated, HashSet::from([Signed, Failed]));
				m.insert(Signed, HashSet::from([Submitted, Failed]));
				m.insert(Submitted, HashSet::from([Confirmed, Failed]));
				m.insert(Confirmed, HashSet::new()); // terminal
				m.insert(Failed, HashSet::new()); // terminal
				m
			});

		TRANSITIONS.get(&from).is_some_and(|set| set.contains(&to))
	}
}
