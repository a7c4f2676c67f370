//! Request orchestration for the attestation service.
//!
//! The [`VerificationPipeline`] turns a caller's submission into a confirmed
//! ledger transaction, moving through the states in [`state`]. It depends on
//! the ledger only through `Arc<dyn LedgerClient>`.

pub mod pipeline;
pub mod state;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use pipeline::{PipelineSettings, UpdateOutcome, VerificationPipeline};
pub use state::{FailureReason, PipelineError, PipelineState, StateTracker};
