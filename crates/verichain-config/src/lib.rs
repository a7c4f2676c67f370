//! Configuration module for the VeriChain attestation service.
//!
//! Configuration is a single TOML file read once at startup. Values may
//! reference environment variables as `${VAR}` or `${VAR:-default}`, which is
//! how the RPC endpoint, contract address and listening port are normally
//! supplied. The resulting [`Config`] is immutable for the life of the process.

use alloy::primitives::Address;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only; the default rendering echoes the input.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this service instance.
	pub service: ServiceConfig,
	/// Remote ledger connection.
	pub ledger: LedgerConfig,
	/// HTTP API server.
	#[serde(default)]
	pub api: ApiConfig,
}

/// Configuration specific to the service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Identifier used in logs.
	pub id: String,
}

/// Connection to the ledger and the pinned contract.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
	/// HTTP JSON-RPC endpoint.
	pub rpc_url: String,
	/// Address of the record-keeping contract.
	pub contract_address: String,
	/// Chain id used for replay protection. Fetched from the node when absent.
	pub chain_id: Option<u64>,
	/// Upper bound for a single RPC round trip.
	#[serde(default = "default_rpc_timeout_seconds")]
	pub rpc_timeout_seconds: u64,
	/// How long to wait for a submitted transaction's receipt.
	#[serde(default = "default_confirmation_timeout_seconds")]
	pub confirmation_timeout_seconds: u64,
	/// Delay between receipt polls.
	#[serde(default = "default_poll_interval_seconds")]
	pub poll_interval_seconds: u64,
	/// Blocks (including the inclusion block) to observe before a receipt counts.
	#[serde(default = "default_min_confirmations")]
	pub min_confirmations: u64,
}

fn default_rpc_timeout_seconds() -> u64 {
	30
}

fn default_confirmation_timeout_seconds() -> u64 {
	180
}

fn default_poll_interval_seconds() -> u64 {
	4
}

fn default_min_confirmations() -> u64 {
	1
}

impl LedgerConfig {
	/// Parses the pinned contract address.
	pub fn contract_address(&self) -> Result<Address, ConfigError> {
		verichain_types::parse_address("contract_address", &self.contract_address)
			.map_err(|e| ConfigError::Validation(e.to_string()))
	}

	pub fn rpc_timeout(&self) -> Duration {
		Duration::from_secs(self.rpc_timeout_seconds)
	}

	pub fn confirmation_timeout(&self) -> Duration {
		Duration::from_secs(self.confirmation_timeout_seconds)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_secs(self.poll_interval_seconds)
	}
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Maximum request body size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// CORS configuration. Permissive when absent.
	pub cors: Option<CorsConfig>,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			host: default_api_host(),
			port: default_api_port(),
			max_request_size: default_max_request_size(),
			cors: None,
		}
	}
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Allowed origins for CORS.
	pub allowed_origins: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	5000
}

fn default_max_request_size() -> usize {
	10 * 1024 * 1024 // 10MB
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to bound regex work.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;

	for cap in re.captures_iter(input) {
		let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};

		let value = match std::env::var(name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last..whole.start()]);
		result.push_str(&value);
		last = whole.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, resolving environment variables.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let content = tokio::fs::read_to_string(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				e.kind(),
				format!("Cannot read {}: {}", path.display(), e),
			))
		})?;
		tracing::debug!(path = %path.display(), "Read configuration file");
		content.parse()
	}

	/// Validates the configuration.
	///
	/// Checks the service id, the RPC URL scheme, the contract address,
	/// timing bounds and the listening port.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		let rpc_url = self.ledger.rpc_url.trim();
		if !(rpc_url.starts_with("http://") || rpc_url.starts_with("https://")) {
			return Err(ConfigError::Validation(format!(
				"Ledger rpc_url must be an http(s) URL, got '{}'",
				rpc_url
			)));
		}

		self.ledger.contract_address()?;

		if self.ledger.chain_id == Some(0) {
			return Err(ConfigError::Validation("Ledger chain_id cannot be 0".into()));
		}
		if self.ledger.rpc_timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"rpc_timeout_seconds must be greater than 0".into(),
			));
		}
		if self.ledger.confirmation_timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"confirmation_timeout_seconds must be greater than 0".into(),
			));
		}
		if self.ledger.poll_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"poll_interval_seconds must be greater than 0".into(),
			));
		}
		if self.ledger.poll_interval_seconds > self.ledger.confirmation_timeout_seconds {
			return Err(ConfigError::Validation(
				"poll_interval_seconds cannot exceed confirmation_timeout_seconds".into(),
			));
		}
		if !(1..=100).contains(&self.ledger.min_confirmations) {
			return Err(ConfigError::Validation(
				"min_confirmations must be between 1 and 100".into(),
			));
		}

		if self.api.port == 0 {
			return Err(ConfigError::Validation("API port cannot be 0".into()));
		}
		if self.api.max_request_size == 0 {
			return Err(ConfigError::Validation(
				"API max_request_size must be greater than 0".into(),
			));
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved first and the result is validated.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	const MINIMAL: &str = r#"
[service]
id = "verichain-test"

[ledger]
rpc_url = "http://localhost:8545"
contract_address = "0x192b8B54b3c86f1Bd45804DC8AaD50ee9627604F"
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("VC_TEST_HOST", "localhost");
		std::env::set_var("VC_TEST_PORT", "8545");

		let input = "url = \"http://${VC_TEST_HOST}:${VC_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "url = \"http://localhost:8545\"");

		std::env::remove_var("VC_TEST_HOST");
		std::env::remove_var("VC_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "port = ${VC_MISSING_PORT:-5000}";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "port = 5000");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("rpc_url = \"${VC_MISSING_RPC}\"");
		assert!(result.unwrap_err().to_string().contains("VC_MISSING_RPC"));
	}

	#[test]
	fn test_defaults_applied() {
		let config: Config = MINIMAL.parse().unwrap();
		assert_eq!(config.service.id, "verichain-test");
		assert_eq!(config.ledger.rpc_timeout(), Duration::from_secs(30));
		assert_eq!(config.ledger.confirmation_timeout(), Duration::from_secs(180));
		assert_eq!(config.ledger.min_confirmations, 1);
		assert_eq!(config.ledger.chain_id, None);
		assert_eq!(config.api.port, 5000);
		assert_eq!(config.api.max_request_size, 10 * 1024 * 1024);
		assert_eq!(
			config.ledger.contract_address().unwrap(),
			"0x192b8b54b3c86f1bd45804dc8aad50ee9627604f"
				.parse::<Address>()
				.unwrap()
		);
	}

	#[test]
	fn test_config_with_env_vars() {
		std::env::set_var("VC_TEST_CONTRACT", "0x192b8B54b3c86f1Bd45804DC8AaD50ee9627604F");

		let config_str = r#"
[service]
id = "verichain"

[ledger]
rpc_url = "${VC_TEST_RPC:-https://rpc.sepolia.org}"
contract_address = "${VC_TEST_CONTRACT}"
chain_id = 11155111

[api]
host = "0.0.0.0"
port = ${VC_TEST_API_PORT:-5050}

[api.cors]
allowed_origins = ["http://localhost:5173"]
"#;

		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.ledger.rpc_url, "https://rpc.sepolia.org");
		assert_eq!(config.ledger.chain_id, Some(11155111));
		assert_eq!(config.api.port, 5050);
		assert_eq!(config.api.cors.unwrap().allowed_origins.len(), 1);

		std::env::remove_var("VC_TEST_CONTRACT");
	}

	#[test]
	fn test_invalid_values_rejected() {
		let cases = [
			(MINIMAL.replace("verichain-test", " "), "Service ID"),
			(
				MINIMAL.replace("http://localhost:8545", "ws://localhost:8546"),
				"rpc_url",
			),
			(
				MINIMAL.replace("0x192b8B54b3c86f1Bd45804DC8AaD50ee9627604F", "0x1234"),
				"contract_address",
			),
			(
				format!("{}min_confirmations = 0\n", MINIMAL),
				"min_confirmations",
			),
			(
				format!("{}rpc_timeout_seconds = 0\n", MINIMAL),
				"rpc_timeout_seconds",
			),
			(
				format!(
					"{}poll_interval_seconds = 10\nconfirmation_timeout_seconds = 5\n",
					MINIMAL
				),
				"poll_interval_seconds",
			),
		];

		for (input, expected) in cases {
			let err = input.parse::<Config>().unwrap_err();
			assert!(
				matches!(err, ConfigError::Validation(ref msg) if msg.contains(expected)),
				"expected validation error mentioning {}, got {}",
				expected,
				err
			);
		}
	}

	#[test]
	fn test_parse_error_has_no_input_dump() {
		let err = "[service\nid = 1".parse::<Config>().unwrap_err();
		assert!(matches!(err, ConfigError::Parse(_)));
	}

	#[tokio::test]
	async fn test_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(MINIMAL.as_bytes()).unwrap();

		let config = Config::from_file(file.path()).await.unwrap();
		assert_eq!(config.service.id, "verichain-test");

		let missing = Config::from_file("/nonexistent/verichain.toml").await;
		assert!(matches!(missing, Err(ConfigError::Io(_))));
	}
}
