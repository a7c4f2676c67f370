//! Inbound request types and their validated forms.
//!
//! Each endpoint deserializes into a `*Submission` whose fields are all
//! optional, then converts it with `TryFrom` into a request whose fields are
//! guaranteed present and well-formed. Nothing downstream sees raw JSON.

use crate::SecretString;
use alloy::primitives::Address;
use serde::Deserialize;
use thiserror::Error;

/// Errors produced while validating an inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
	/// One or more required fields were absent or empty.
	#[error("Missing required fields: {}", .0.join(", "))]
	MissingFields(Vec<&'static str>),
	/// A field was present but could not be interpreted.
	#[error("Invalid field '{field}': {message}")]
	InvalidField {
		field: &'static str,
		message: String,
	},
}

/// Raw body of `POST /verify-signature`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSubmission {
	pub data: Option<String>,
	pub public_key: Option<String>,
	pub signature: Option<String>,
	pub user_address: Option<String>,
	pub private_key: Option<SecretString>,
}

/// A verification request with every field present.
///
/// `public_key` and `signature` keep the caller's base64 text; that text is
/// both what gets decoded for verification and what gets recorded on-chain.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
	pub data: String,
	pub public_key: String,
	pub signature: String,
	pub user_address: Address,
	pub private_key: SecretString,
}

impl TryFrom<VerificationSubmission> for VerificationRequest {
	type Error = RequestError;

	fn try_from(raw: VerificationSubmission) -> Result<Self, Self::Error> {
		let mut missing = Vec::new();
		let data = take_text(raw.data, "data", &mut missing);
		let public_key = take_text(raw.public_key, "publicKey", &mut missing);
		let signature = take_text(raw.signature, "signature", &mut missing);
		let user_address = take_text(raw.user_address, "userAddress", &mut missing);
		let private_key = take_secret(raw.private_key, "privateKey", &mut missing);

		match (data, public_key, signature, user_address, private_key) {
			(Some(data), Some(public_key), Some(signature), Some(user_address), Some(private_key))
				if missing.is_empty() =>
			{
				Ok(Self {
					data,
					public_key,
					signature,
					user_address: parse_address("userAddress", &user_address)?,
					private_key,
				})
			},
			_ => Err(RequestError::MissingFields(missing)),
		}
	}
}

/// Raw body of `POST /get-blocks`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetBlocksSubmission {
	pub user_address: Option<String>,
}

/// A record-set lookup for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetBlocksRequest {
	pub user_address: Address,
}

impl TryFrom<GetBlocksSubmission> for GetBlocksRequest {
	type Error = RequestError;

	fn try_from(raw: GetBlocksSubmission) -> Result<Self, Self::Error> {
		let mut missing = Vec::new();
		match take_text(raw.user_address, "userAddress", &mut missing) {
			Some(address) => Ok(Self {
				user_address: parse_address("userAddress", &address)?,
			}),
			None => Err(RequestError::MissingFields(missing)),
		}
	}
}

/// Raw body of `POST /update-block`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBlockSubmission {
	pub user_address: Option<String>,
	pub private_key: Option<SecretString>,
	pub new_data: Option<String>,
}

/// A request to overwrite the caller's most recent record.
#[derive(Debug, Clone)]
pub struct UpdateBlockRequest {
	pub user_address: Address,
	pub private_key: SecretString,
	pub new_data: String,
}

impl TryFrom<UpdateBlockSubmission> for UpdateBlockRequest {
	type Error = RequestError;

	fn try_from(raw: UpdateBlockSubmission) -> Result<Self, Self::Error> {
		let mut missing = Vec::new();
		let user_address = take_text(raw.user_address, "userAddress", &mut missing);
		let private_key = take_secret(raw.private_key, "privateKey", &mut missing);
		let new_data = take_text(raw.new_data, "newData", &mut missing);

		match (user_address, private_key, new_data) {
			(Some(user_address), Some(private_key), Some(new_data)) if missing.is_empty() => {
				Ok(Self {
					user_address: parse_address("userAddress", &user_address)?,
					private_key,
					new_data,
				})
			},
			_ => Err(RequestError::MissingFields(missing)),
		}
	}
}

fn take_text(
	value: Option<String>,
	field: &'static str,
	missing: &mut Vec<&'static str>,
) -> Option<String> {
	match value {
		Some(v) if !v.trim().is_empty() => Some(v),
		_ => {
			missing.push(field);
			None
		},
	}
}

fn take_secret(
	value: Option<SecretString>,
	field: &'static str,
	missing: &mut Vec<&'static str>,
) -> Option<SecretString> {
	match value {
		Some(v) if !v.is_blank() => Some(v),
		_ => {
			missing.push(field);
			None
		},
	}
}

/// Parses a 20-byte account address, accepting any letter case.
pub fn parse_address(field: &'static str, value: &str) -> Result<Address, RequestError> {
	value
		.trim()
		.parse::<Address>()
		.map_err(|e| RequestError::InvalidField {
			field,
			message: e.to_string(),
		})
}
