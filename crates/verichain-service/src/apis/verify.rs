//! Signature verification endpoint.

use super::{failure_response, run_detached};
use crate::server::AppState;
use crate::wire::WireJson;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use verichain_types::{VerificationResponse, VerificationSubmission, MSG_VERIFIED};

/// Handles POST /api/blockchain/verify-signature.
///
/// Verifies the caller's signature over `data` and, if it holds, records
/// the data, signature and public key on the ledger.
pub async fn verify_signature(
	State(state): State<AppState>,
	WireJson(submission): WireJson<VerificationSubmission>,
) -> Response {
	let pipeline = state.pipeline.clone();
	match run_detached(async move { pipeline.verify(submission).await }, failure_response).await {
		Ok(receipt) => {
			WireJson(VerificationResponse::from_receipt(&receipt, MSG_VERIFIED)).into_response()
		},
		Err(response) => response,
	}
}
