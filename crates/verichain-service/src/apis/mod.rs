//! Endpoint handlers and the mapping from pipeline failures to responses.

pub mod blocks;
pub mod verify;

use crate::server::AppState;
use crate::wire::WireJson;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::future::Future;
use tracing::Instrument;
use verichain_core::{FailureReason, PipelineError};
use verichain_types::{
	APIError, HealthResponse, VerificationResponse, MSG_INVALID_FIELD, MSG_MISSING_FIELDS,
	MSG_NO_BLOCKS, MSG_PROCESSING_FAILED, MSG_REJECTED, MSG_SIGNATURE_FAILED,
	MSG_SIGNING_FAILED,
};

/// Runs a pipeline invocation on its own task.
///
/// The task runs to a terminal state even if the client goes away and the
/// handler future is dropped. A failed run is rendered with `on_failure`.
pub(crate) async fn run_detached<T, F>(
	run: F,
	on_failure: fn(PipelineError) -> Response,
) -> Result<T, Response>
where
	T: Send + 'static,
	F: Future<Output = Result<T, PipelineError>> + Send + 'static,
{
	match tokio::spawn(run.in_current_span()).await {
		Ok(Ok(value)) => Ok(value),
		Ok(Err(e)) => Err(on_failure(e)),
		Err(e) => {
			tracing::error!(error = %e, "Pipeline task did not complete");
			Err(APIError::internal(MSG_PROCESSING_FAILED, e).into_response())
		},
	}
}

/// Maps a failed run to its HTTP response.
pub(crate) fn failure_response(err: PipelineError) -> Response {
	match err.reason {
		FailureReason::MissingFields(_) => APIError::bad_request(MSG_MISSING_FIELDS).into_response(),
		FailureReason::InvalidField(detail) => {
			APIError::bad_request_with(MSG_INVALID_FIELD, detail).into_response()
		},
		FailureReason::SignatureInvalid(_) => {
			APIError::bad_request(MSG_SIGNATURE_FAILED).into_response()
		},
		FailureReason::SigningFailed(detail) => {
			APIError::bad_request_with(MSG_SIGNING_FAILED, detail).into_response()
		},
		FailureReason::NoBlocks => APIError::bad_request(MSG_NO_BLOCKS).into_response(),
		FailureReason::OnChainRejected { receipt, .. } => (
			StatusCode::OK,
			WireJson(VerificationResponse::from_receipt(&receipt, MSG_REJECTED)),
		)
			.into_response(),
		other => APIError::internal(MSG_PROCESSING_FAILED, other).into_response(),
	}
}

/// Handles GET /health.
pub async fn health(State(state): State<AppState>) -> WireJson<HealthResponse> {
	WireJson(HealthResponse::new(
		state.pipeline.chain_id(),
		state.pipeline.contract().to_string(),
	))
}

/// Fallback for unknown routes.
pub async fn not_found() -> APIError {
	APIError::not_found()
}
