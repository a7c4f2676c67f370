//! Main entry point for the VeriChain attestation service.
//!
//! This binary verifies caller signatures over submitted data and records
//! verified data on a ledger contract, exposing the pipeline over HTTP.

use clap::Parser;
use server::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use verichain_config::Config;
use verichain_core::{PipelineSettings, VerificationPipeline};
use verichain_ledger::implementations::evm::alloy::AlloyLedger;

mod apis;
mod server;
mod wire;

/// Command-line arguments for the attestation service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, env = "VERICHAIN_CONFIG", default_value = "config/verichain.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started verichain");

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let state = build_state(&config).await?;
	tracing::info!(
		chain_id = state.pipeline.chain_id(),
		contract = %state.pipeline.contract(),
		"Connected to ledger"
	);

	server::start_server(&config.api, state).await?;

	tracing::info!("Stopped verichain");
	Ok(())
}

/// Connects to the ledger and assembles the shared pipeline.
async fn build_state(config: &Config) -> Result<AppState, Box<dyn std::error::Error>> {
	let settings = PipelineSettings::from_config(&config.ledger)?;
	let ledger = AlloyLedger::connect(&config.ledger).await?;

	Ok(AppState {
		pipeline: VerificationPipeline::new(Arc::new(ledger), settings),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_args_defaults() {
		let args = Args::try_parse_from(["verichain"]).unwrap();
		assert_eq!(args.log_level, "info");
		// VERICHAIN_CONFIG may be set in the environment running the tests.
		if std::env::var_os("VERICHAIN_CONFIG").is_none() {
			assert_eq!(args.config, PathBuf::from("config/verichain.toml"));
		}
	}

	#[test]
	fn test_args_overrides() {
		let args =
			Args::try_parse_from(["verichain", "-c", "/etc/verichain.toml", "--log-level", "debug"])
				.unwrap();
		assert_eq!(args.config, PathBuf::from("/etc/verichain.toml"));
		assert_eq!(args.log_level, "debug");
	}

	#[tokio::test]
	async fn test_build_state_with_pinned_chain() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"
[service]
id = "verichain-test"

[ledger]
rpc_url = "http://127.0.0.1:1"
contract_address = "0x192b8B54b3c86f1Bd45804DC8AaD50ee9627604F"
chain_id = 31337

[api]
port = 5000
"#
		)
		.unwrap();

		let config = Config::from_file(file.path()).await.unwrap();
		let state = build_state(&config).await.unwrap();

		assert_eq!(state.pipeline.chain_id(), 31337);
		assert_eq!(
			state.pipeline.contract().to_string(),
			"0x192b8B54b3c86f1Bd45804DC8AaD50ee9627604F"
		);
	}
}
