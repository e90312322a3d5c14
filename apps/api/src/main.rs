//! Fleetgate API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use fleetgate_application::SystemClock;
use fleetgate_core::AppError;
use tracing::info;

use crate::api_config::ApiConfig;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    api_config::init_tracing();

    let config = ApiConfig::load()?;
    let app_state = api_services::build_app_state(&config, Arc::new(SystemClock))?;

    if config.warm_on_startup {
        // Detached; failures are logged by the warmer.
        let _warming = app_state.cache_warmer.warm_on_startup(config.warming);
    }

    let app = api_router::build_router(app_state, config.frontend_url.as_str())?;
    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "fleetgate-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
