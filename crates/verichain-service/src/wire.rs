//! Wire codec at the HTTP boundary.
//!
//! [`WireJson`] is both an extractor and a responder. Inbound bodies have
//! their `$bigint` tags decoded before typed deserialization; outbound bodies
//! are tagged from their [`ToWire`] form. Handlers never see tagged JSON.

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::response::{IntoResponse, Json, Response};
use serde::de::DeserializeOwned;
use verichain_types::{wire, APIError, ToWire, MSG_MALFORMED_BODY, MSG_PROCESSING_FAILED};

/// JSON body passed through the wire codec.
#[derive(Debug)]
pub struct WireJson<T>(pub T);

impl<S, T> FromRequest<S> for WireJson<T>
where
	T: DeserializeOwned,
	S: Send + Sync,
{
	type Rejection = Response;

	async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
		// Size limits are enforced here by `DefaultBodyLimit`.
		let bytes = Bytes::from_request(req, state)
			.await
			.map_err(IntoResponse::into_response)?;
		decode_body(&bytes)
			.map(WireJson)
			.map_err(IntoResponse::into_response)
	}
}

impl<T: ToWire> IntoResponse for WireJson<T> {
	fn into_response(self) -> Response {
		match self.0.to_wire() {
			Ok(value) => Json(wire::encode(&value)).into_response(),
			Err(e) => {
				tracing::error!(error = %e, "Failed to encode response body");
				APIError::internal(MSG_PROCESSING_FAILED, e).into_response()
			},
		}
	}
}

/// Decodes a request body into `T`.
///
/// An empty body is read as `{}` so that it reports missing fields rather
/// than a syntax error.
pub fn decode_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, APIError> {
	let value: serde_json::Value = if bytes.iter().all(u8::is_ascii_whitespace) {
		serde_json::Value::Object(Default::default())
	} else {
		serde_json::from_slice(bytes).map_err(|e| APIError::bad_request_with(MSG_MALFORMED_BODY, e))?
	};

	let plain = wire::decode(value)
		.map_err(|e| APIError::bad_request_with(MSG_MALFORMED_BODY, e))?
		.into_plain();

	serde_json::from_value(plain).map_err(|e| APIError::bad_request_with(MSG_MALFORMED_BODY, e))
}
