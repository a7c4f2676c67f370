//! HTTP server for the VeriChain API.
//!
//! Routes are nested under `/api/blockchain`; `/health` sits at the root.
//! Every body passes through the wire codec in [`crate::wire`].

use crate::apis;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use verichain_config::{ApiConfig, CorsConfig};
use verichain_core::VerificationPipeline;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub pipeline: VerificationPipeline,
}

/// Builds the router with all routes and middleware.
pub fn build_router(state: AppState, api_config: &ApiConfig) -> Router {
	let cors = match &api_config.cors {
		Some(cors) => cors_layer(cors),
		None => CorsLayer::permissive(),
	};

	Router::new()
		.route("/health", get(apis::health))
		.nest(
			"/api/blockchain",
			Router::new()
				.route("/verify-signature", post(apis::verify::verify_signature))
				.route("/get-blocks", post(apis::blocks::get_blocks))
				.route("/update-block", post(apis::blocks::update_block)),
		)
		.fallback(apis::not_found)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(cors)
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(state)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
	let origins: Vec<HeaderValue> = config
		.allowed_origins
		.iter()
		.filter_map(|origin| match origin.parse() {
			Ok(value) => Some(value),
			Err(_) => {
				tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
				None
			},
		})
		.collect();

	CorsLayer::new()
		.allow_origin(AllowOrigin::list(origins))
		.allow_methods([Method::GET, Method::POST, Method::OPTIONS])
		.allow_headers([header::CONTENT_TYPE])
}

/// Starts the HTTP server for the API.
///
/// Runs until the process receives Ctrl-C. In-flight pipeline tasks are
/// detached from their connections and finish on their own.
pub async fn start_server(
	api_config: &ApiConfig,
	state: AppState,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = build_router(state, api_config);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("VeriChain API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!("Failed to listen for shutdown signal: {}", e);
			}
		})
		.await?;

	Ok(())
}
