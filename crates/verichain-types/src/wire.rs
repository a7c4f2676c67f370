//! Wire codec for arbitrary-precision integers.
//!
//! JSON numbers cannot carry 256-bit ledger quantities (gas, wei, block numbers)
//! without precision loss, so the HTTP surface tags them as
//! `{ "$bigint": "<decimal>" }`. Integers are signed and unbounded on the wire;
//! only the payload's syntax is checked here.
//!
//! Response types derive `Serialize` and mark integer fields with
//! [`tagged`]. [`ToWire`] runs the serialized tree back through [`decode`],
//! so every outbound body passes the same validation as inbound ones.

use alloy::primitives::U256;
use num_bigint::{BigInt, Sign};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Object key that marks a tagged integer.
pub const BIGINT_TAG: &str = "$bigint";

/// Errors produced by the wire codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
	/// A `$bigint` object whose shape or payload is not a valid integer.
	#[error("Malformed wire value at {path}: {message}")]
	MalformedWireValue { path: String, message: String },
	/// A value that has no JSON representation.
	#[error("Value cannot be written to the wire: {0}")]
	Unrepresentable(String),
}

/// JSON value tree extended with a lossless integer variant.
///
/// Object key order carries no meaning, so objects are kept sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireValue {
	Null,
	Bool(bool),
	Number(Number),
	String(String),
	BigInt(BigInt),
	Array(Vec<WireValue>),
	Object(BTreeMap<String, WireValue>),
}

/// Conversion of a response body into its wire tree.
pub trait ToWire {
	fn to_wire(&self) -> Result<WireValue, WireError>;
}

impl<T: Serialize + ?Sized> ToWire for T {
	fn to_wire(&self) -> Result<WireValue, WireError> {
		let value =
			serde_json::to_value(self).map_err(|e| WireError::Unrepresentable(e.to_string()))?;
		decode(value)
	}
}

impl WireValue {
	/// Builds an object from `(key, value)` pairs.
	pub fn object<K, I>(entries: I) -> Self
	where
		K: Into<String>,
		I: IntoIterator<Item = (K, WireValue)>,
	{
		WireValue::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
	}

	/// Wraps plain JSON without interpreting `$bigint` tags.
	pub fn from_plain(value: Value) -> Self {
		match value {
			Value::Null => WireValue::Null,
			Value::Bool(b) => WireValue::Bool(b),
			Value::Number(n) => WireValue::Number(n),
			Value::String(s) => WireValue::String(s),
			Value::Array(items) => {
				WireValue::Array(items.into_iter().map(WireValue::from_plain).collect())
			},
			Value::Object(map) => WireValue::Object(
				map.into_iter()
					.map(|(k, v)| (k, WireValue::from_plain(v)))
					.collect(),
			),
		}
	}

	/// Lowers the tree to plain JSON, rendering integers as decimal strings.
	///
	/// Typed request structs deserialize from this form.
	pub fn into_plain(self) -> Value {
		match self {
			WireValue::Null => Value::Null,
			WireValue::Bool(b) => Value::Bool(b),
			WireValue::Number(n) => Value::Number(n),
			WireValue::String(s) => Value::String(s),
			WireValue::BigInt(n) => Value::String(n.to_string()),
			WireValue::Array(items) => {
				Value::Array(items.into_iter().map(WireValue::into_plain).collect())
			},
			WireValue::Object(map) => Value::Object(
				map.into_iter()
					.map(|(k, v)| (k, v.into_plain()))
					.collect::<Map<_, _>>(),
			),
		}
	}
}

impl From<&str> for WireValue {
	fn from(s: &str) -> Self {
		WireValue::String(s.to_string())
	}
}

impl From<BigInt> for WireValue {
	fn from(n: BigInt) -> Self {
		WireValue::BigInt(n)
	}
}

impl From<U256> for WireValue {
	fn from(n: U256) -> Self {
		WireValue::BigInt(BigInt::from_bytes_be(Sign::Plus, &n.to_be_bytes::<32>()))
	}
}

/// Serde helpers that write ledger integers in tagged form.
///
/// Use with `#[serde(with = "crate::wire::tagged")]` on `U256` fields and
/// `tagged::option` on `Option<U256>` fields.
pub mod tagged {
	use super::BIGINT_TAG;
	use alloy::primitives::U256;
	use serde::ser::{SerializeMap, Serializer};

	pub fn serialize<S: Serializer>(n: &U256, serializer: S) -> Result<S::Ok, S::Error> {
		serialize_decimal(&n.to_string(), serializer)
	}

	/// Writes `{ "$bigint": digits }`.
	pub fn serialize_decimal<S: Serializer>(digits: &str, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(1))?;
		map.serialize_entry(BIGINT_TAG, digits)?;
		map.end()
	}

	pub mod option {
		use alloy::primitives::U256;
		use serde::ser::Serializer;

		pub fn serialize<S: Serializer>(n: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error> {
			match n {
				Some(n) => super::serialize(n, serializer),
				None => serializer.serialize_none(),
			}
		}
	}
}

/// Encodes a wire tree into transport JSON.
pub fn encode(value: &WireValue) -> Value {
	match value {
		WireValue::Null => Value::Null,
		WireValue::Bool(b) => Value::Bool(*b),
		WireValue::Number(n) => Value::Number(n.clone()),
		WireValue::String(s) => Value::String(s.clone()),
		WireValue::BigInt(n) => {
			let mut tagged = Map::with_capacity(1);
			tagged.insert(BIGINT_TAG.to_string(), Value::String(n.to_string()));
			Value::Object(tagged)
		},
		WireValue::Array(items) => Value::Array(items.iter().map(encode).collect()),
		WireValue::Object(map) => Value::Object(
			map.iter()
				.map(|(k, v)| (k.clone(), encode(v)))
				.collect::<Map<_, _>>(),
		),
	}
}

/// Decodes transport JSON, turning every tagged object back into an integer.
pub fn decode(value: Value) -> Result<WireValue, WireError> {
	decode_at(value, &mut String::from("$"))
}

fn decode_at(value: Value, path: &mut String) -> Result<WireValue, WireError> {
	match value {
		Value::Array(items) => {
			let mut decoded = Vec::with_capacity(items.len());
			for (i, item) in items.into_iter().enumerate() {
				let len = path.len();
				path.push_str(&format!("[{}]", i));
				decoded.push(decode_at(item, path)?);
				path.truncate(len);
			}
			Ok(WireValue::Array(decoded))
		},
		Value::Object(map) if map.contains_key(BIGINT_TAG) => decode_tagged(map, path),
		Value::Object(map) => {
			let mut decoded = BTreeMap::new();
			for (key, item) in map {
				let len = path.len();
				path.push('.');
				path.push_str(&key);
				let item = decode_at(item, path)?;
				path.truncate(len);
				decoded.insert(key, item);
			}
			Ok(WireValue::Object(decoded))
		},
		other => Ok(WireValue::from_plain(other)),
	}
}

fn decode_tagged(map: Map<String, Value>, path: &str) -> Result<WireValue, WireError> {
	let malformed = |message: String| WireError::MalformedWireValue {
		path: path.to_string(),
		message,
	};

	if map.len() != 1 {
		return Err(malformed(format!(
			"tagged integer must have exactly one key, found {}",
			map.len()
		)));
	}

	let digits = match map.get(BIGINT_TAG) {
		Some(Value::String(s)) => s,
		Some(other) => {
			return Err(malformed(format!(
				"tagged integer payload must be a string, got {}",
				other
			)))
		},
		None => return Err(malformed("missing tagged integer payload".to_string())),
	};

	parse_integer(digits).map(WireValue::BigInt).map_err(malformed)
}

/// Parses a decimal integer with an optional sign. Magnitude is unbounded.
fn parse_integer(text: &str) -> Result<BigInt, String> {
	let magnitude = text
		.strip_prefix('-')
		.or_else(|| text.strip_prefix('+'))
		.unwrap_or(text);
	if magnitude.is_empty() || !magnitude.bytes().all(|b| b.is_ascii_digit()) {
		return Err(format!("'{}' is not a decimal integer", text));
	}
	text.parse::<BigInt>()
		.map_err(|e| format!("'{}' is not a decimal integer: {}", text, e))
}
