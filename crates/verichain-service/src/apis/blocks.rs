//! Record listing and update endpoints.

use super::{failure_response, run_detached};
use crate::server::AppState;
use crate::wire::WireJson;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use verichain_core::{FailureReason, PipelineError};
use verichain_types::{
	APIError, BlocksResponse, GetBlocksSubmission, UpdateBlockResponse, UpdateBlockSubmission,
	MSG_BLOCKS_FETCHED, MSG_BLOCK_UPDATED, MSG_REJECTED, MSG_UPDATE_FIELDS_REQUIRED,
	MSG_USER_ADDRESS_REQUIRED,
};

/// Handles POST /api/blockchain/get-blocks.
pub async fn get_blocks(
	State(state): State<AppState>,
	WireJson(submission): WireJson<GetBlocksSubmission>,
) -> Response {
	let pipeline = state.pipeline.clone();
	match run_detached(
		async move { pipeline.get_blocks(submission).await },
		get_blocks_failure,
	)
	.await
	{
		Ok(blocks) => WireJson(BlocksResponse::new(MSG_BLOCKS_FETCHED, blocks)).into_response(),
		Err(response) => response,
	}
}

/// Handles POST /api/blockchain/update-block.
///
/// Overwrites the data of the caller's most recent record.
pub async fn update_block(
	State(state): State<AppState>,
	WireJson(submission): WireJson<UpdateBlockSubmission>,
) -> Response {
	let pipeline = state.pipeline.clone();
	match run_detached(
		async move { pipeline.update_block(submission).await },
		update_block_failure,
	)
	.await
	{
		Ok(outcome) => WireJson(UpdateBlockResponse {
			success: true,
			message: MSG_BLOCK_UPDATED.to_string(),
			index: outcome.index,
			receipt: outcome.receipt,
		})
		.into_response(),
		Err(response) => response,
	}
}

fn get_blocks_failure(err: PipelineError) -> Response {
	match err.reason {
		FailureReason::MissingFields(_) => {
			APIError::bad_request(MSG_USER_ADDRESS_REQUIRED).into_response()
		},
		_ => failure_response(err),
	}
}

fn update_block_failure(err: PipelineError) -> Response {
	match err.reason {
		FailureReason::MissingFields(_) => {
			APIError::bad_request(MSG_UPDATE_FIELDS_REQUIRED).into_response()
		},
		FailureReason::OnChainRejected {
			receipt,
			record_index: Some(index),
		} => WireJson(UpdateBlockResponse {
			success: false,
			message: MSG_REJECTED.to_string(),
			index,
			receipt,
		})
		.into_response(),
		_ => failure_response(err),
	}
}
