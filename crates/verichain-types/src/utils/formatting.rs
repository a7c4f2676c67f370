//! String formatting utilities.
//!
//! Hex prefix handling and truncation of long identifiers for log lines.

/// Shortens a hex identifier for display, keeping the first 10 characters.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(10) {
		Some((cut, _)) => format!("{}..", &id[..cut]),
		None => id.to_string(),
	}
}

/// Adds "0x" prefix to a hex string if it doesn't already have one.
pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.starts_with("0x") || hex_str.starts_with("0X") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}

/// Removes "0x" or "0X" prefix from a hex string if present.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_prefix_helpers() {
		assert_eq!(with_0x_prefix("dead"), "0xdead");
		assert_eq!(with_0x_prefix("0Xdead"), "0Xdead");
		assert_eq!(without_0x_prefix("0xdead"), "dead");
		assert_eq!(without_0x_prefix("dead"), "dead");
	}

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("0xdead"), "0xdead");
		assert_eq!(
			truncate_id("0x5fbdb2315678afecb367f032d93f642f64180aa3"),
			"0x5fbdb231.."
		);
	}
}
