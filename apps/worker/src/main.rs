//! Fleetgate operations worker: cache warming and rate-limit monitoring.

#![forbid(unsafe_code)]

mod cli;
mod commands;

use std::sync::Arc;

use clap::Parser;
use fleetgate_application::{Clock, RateLimitPolicies, SystemClock};
use fleetgate_core::AppError;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let connector = commands::build_store_connector(&cli.store, clock.clone());

    match cli.command {
        Command::Warm(args) => {
            let fleet = commands::load_fleet(cli.store.fleet_seed_path.as_deref())?;
            let metrics = commands::run_warm(connector, fleet, clock, args.options()).await?;
            let summary = serde_json::to_string_pretty(&metrics).map_err(|error| {
                AppError::Internal(format!("failed to encode warming metrics: {error}"))
            })?;
            println!("{summary}");
            Ok(())
        }
        Command::Monitor(args) => {
            let policies = RateLimitPolicies::scaled(cli.store.rate_limit_multiplier)?;
            commands::run_monitor(connector, clock, policies, &args).await
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();
}
