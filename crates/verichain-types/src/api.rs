//! API types for the attestation HTTP endpoints.
//!
//! Response bodies derive `Serialize`; the HTTP layer turns them into wire
//! trees with [`ToWire`](crate::wire::ToWire), which tags ledger integers.

use crate::ledger::{BlockRecord, Receipt};
use serde::Serialize;
use std::fmt;

/// Message returned when required request fields are absent.
pub const MSG_MISSING_FIELDS: &str = "All fields are required";
/// Message returned when a record listing has no account to look up.
pub const MSG_USER_ADDRESS_REQUIRED: &str = "User address is required";
/// Message returned when an update request is incomplete.
pub const MSG_UPDATE_FIELDS_REQUIRED: &str =
	"All fields are required: userAddress, privateKey, and newData";
/// Message returned when signature verification does not pass.
pub const MSG_SIGNATURE_FAILED: &str = "Digital signature verification failed";
/// Message returned when a confirmed transaction was rejected by the ledger.
pub const MSG_REJECTED: &str = "Transaction rejected on-chain";
/// Message returned for failures after signature verification.
pub const MSG_PROCESSING_FAILED: &str = "Transaction processing failed";
/// Message returned when the caller has no records to update.
pub const MSG_NO_BLOCKS: &str = "No blocks found for the user";
/// Message returned when a present field cannot be interpreted.
pub const MSG_INVALID_FIELD: &str = "Invalid request field";
/// Message returned when the ledger transaction cannot be signed.
pub const MSG_SIGNING_FAILED: &str = "Transaction signing failed";
/// Message returned when the body is not JSON or carries a bad integer tag.
pub const MSG_MALFORMED_BODY: &str = "Malformed request body";
/// Message returned for unknown routes.
pub const MSG_NOT_FOUND: &str = "API endpoint not found";
pub const MSG_VERIFIED: &str = "Verification successful";
pub const MSG_BLOCKS_FETCHED: &str = "Blocks fetched successfully";
pub const MSG_BLOCK_UPDATED: &str = "Block updated successfully";

/// Outcome of a verification run that reached the ledger.
///
/// Used both for confirmed transactions and for transactions that were
/// mined but rejected; `success` tells the two apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResponse {
	pub success: bool,
	pub message: String,
	pub transaction_hash: String,
	/// Decimal block number, or `pending`.
	pub block_number: String,
	/// `1` for success, `0` for failure.
	pub status: String,
}

impl VerificationResponse {
	/// Builds the response body for a receipt with a transaction hash.
	pub fn from_receipt(receipt: &Receipt, message: impl Into<String>) -> Self {
		Self {
			success: receipt.is_success(),
			message: message.into(),
			transaction_hash: receipt
				.transaction_hash
				.as_ref()
				.map(ToString::to_string)
				.unwrap_or_default(),
			block_number: receipt.block_number.to_string(),
			status: receipt.status.code().to_string(),
		}
	}
}

/// Records held by one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlocksResponse {
	pub success: bool,
	pub message: String,
	pub blocks: Vec<BlockRecord>,
}

impl BlocksResponse {
	pub fn new(message: impl Into<String>, blocks: Vec<BlockRecord>) -> Self {
		Self {
			success: true,
			message: message.into(),
			blocks,
		}
	}
}

/// Outcome of an update run that reached the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateBlockResponse {
	pub success: bool,
	pub message: String,
	/// Index of the record that was targeted.
	pub index: u64,
	pub receipt: Receipt,
}

/// Liveness report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
	pub status: &'static str,
	pub chain_id: u64,
	pub contract: String,
}

impl HealthResponse {
	pub fn new(chain_id: u64, contract: impl Into<String>) -> Self {
		Self {
			status: "ok",
			chain_id,
			contract: contract.into(),
		}
	}
}

/// API error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
	pub success: bool,
	/// Human-readable description.
	pub message: String,
	/// One-line detail of the underlying failure, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// Structured API error with HTTP status mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum APIError {
	/// Invalid input; nothing was sent to the ledger (400).
	BadRequest {
		message: String,
		error: Option<String>,
	},
	/// Unknown route (404).
	NotFound { message: String },
	/// Ledger or processing failure (500).
	InternalServerError {
		message: String,
		error: Option<String>,
	},
}

impl APIError {
	pub fn bad_request(message: impl Into<String>) -> Self {
		APIError::BadRequest {
			message: message.into(),
			error: None,
		}
	}

	pub fn bad_request_with(message: impl Into<String>, error: impl fmt::Display) -> Self {
		APIError::BadRequest {
			message: message.into(),
			error: Some(error.to_string()),
		}
	}

	pub fn not_found() -> Self {
		APIError::NotFound {
			message: MSG_NOT_FOUND.to_string(),
		}
	}

	pub fn internal(message: impl Into<String>, error: impl fmt::Display) -> Self {
		APIError::InternalServerError {
			message: message.into(),
			error: Some(error.to_string()),
		}
	}

	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			APIError::BadRequest { message, error }
			| APIError::InternalServerError { message, error } => ErrorResponse {
				success: false,
				message: message.clone(),
				error: error.clone(),
			},
			APIError::NotFound { message } => ErrorResponse {
				success: false,
				message: message.clone(),
				error: None,
			},
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let response = self.to_error_response();
		match response.error {
			Some(error) => write!(f, "{} ({}): {}", response.message, self.status_code(), error),
			None => write!(f, "{} ({})", response.message, self.status_code()),
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use crate::wire::{encode, ToWire};
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		match self.to_error_response().to_wire() {
			Ok(body) => (status, Json(encode(&body))).into_response(),
			// Only reachable if the body stops being plain strings.
			Err(_) => status.into_response(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ledger::{BlockNumber, ReceiptStatus};
	use crate::wire::{encode, ToWire};
	use alloy::primitives::U256;
	use serde_json::json;

	#[test]
	fn test_verification_response_from_receipt() {
		let receipt = Receipt::new(
			Some("0xdead".parse().unwrap()),
			BlockNumber::Mined(U256::from(42u64)),
			ReceiptStatus::Success,
		);
		let response = VerificationResponse::from_receipt(&receipt, "Verification successful");

		assert_eq!(
			encode(&response.to_wire().unwrap()),
			json!({
				"success": true,
				"message": "Verification successful",
				"transactionHash": "0xdead",
				"blockNumber": "42",
				"status": "1",
			})
		);
	}

	#[test]
	fn test_rejected_receipt_is_not_success() {
		let receipt = Receipt::new(
			Some("0x0abc".parse().unwrap()),
			BlockNumber::Pending,
			ReceiptStatus::Failure,
		);
		let response = VerificationResponse::from_receipt(&receipt, MSG_REJECTED);
		assert!(!response.success);
		assert_eq!(response.block_number, "pending");
		assert_eq!(response.status, "0");
	}

	#[test]
	fn test_error_response_omits_absent_detail() {
		let body = encode(&APIError::bad_request(MSG_MISSING_FIELDS).to_error_response().to_wire().unwrap());
		assert_eq!(
			body,
			json!({ "success": false, "message": "All fields are required" })
		);

		let err = APIError::internal(MSG_PROCESSING_FAILED, "execution reverted");
		assert_eq!(err.status_code(), 500);
		assert_eq!(
			encode(&err.to_error_response().to_wire().unwrap())["error"],
			json!("execution reverted")
		);
	}

	#[test]
	fn test_blocks_response_tags_timestamps() {
		let response = BlocksResponse::new(
			MSG_BLOCKS_FETCHED,
			vec![BlockRecord {
				index: 0,
				data: "hello".to_string(),
				signature: "c2ln".to_string(),
				public_key: "a2V5".to_string(),
				timestamp: U256::from(1_700_000_000u64),
			}],
		);
		let body = encode(&response.to_wire().unwrap());
		assert_eq!(body["success"], json!(true));
		assert_eq!(body["blocks"][0]["index"], json!(0));
		assert_eq!(body["blocks"][0]["timestamp"], json!({ "$bigint": "1700000000" }));
		assert_eq!(body["blocks"][0]["publicKey"], json!("a2V5"));
	}

	#[test]
	fn test_update_response_nests_tagged_receipt() {
		let receipt = Receipt::new(
			Some("0xbeef".parse().unwrap()),
			BlockNumber::Mined(U256::from(7u64)),
			ReceiptStatus::Failure,
		);
		let response = UpdateBlockResponse {
			success: false,
			message: MSG_REJECTED.to_string(),
			index: 3,
			receipt,
		};

		assert_eq!(
			encode(&response.to_wire().unwrap()),
			json!({
				"success": false,
				"message": "Transaction rejected on-chain",
				"index": 3,
				"receipt": {
					"transactionHash": "0xbeef",
					"blockNumber": { "$bigint": "7" },
					"status": { "$bigint": "0" },
					"gasUsed": null,
					"effectiveGasPrice": null,
				},
			})
		);
	}

	#[test]
	fn test_health_response_shape() {
		assert_eq!(
			encode(&HealthResponse::new(31337, "0xabc").to_wire().unwrap()),
			json!({ "status": "ok", "chainId": 31337, "contract": "0xabc" })
		);
	}
}
