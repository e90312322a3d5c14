use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use fleetgate_application::{RetryPolicy, WarmingOptions};
use fleetgate_infrastructure::RedisStoreSettings;

/// Fleetgate operations: cache warming and rate-limit monitoring.
#[derive(Debug, Parser)]
#[command(name = "fleetgate-worker", version)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    Redis,
    Memory,
}

/// Store connection settings, shared with the API through the environment.
#[derive(Debug, Args)]
pub struct StoreArgs {
    #[arg(long, global = true, value_enum, env = "STORE_BACKEND", default_value = "redis")]
    pub store_backend: StoreBackend,

    #[arg(long, global = true, env = "STORE_URL", hide_env_values = true)]
    pub store_url: Option<String>,

    #[arg(long, global = true, env = "STORE_TOKEN", hide_env_values = true)]
    pub store_token: Option<String>,

    #[arg(
        long,
        global = true,
        env = "STORE_REQUIRE_TLS",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub store_require_tls: bool,

    #[arg(long, global = true, env = "STORE_COMMAND_TIMEOUT_MS", default_value_t = 1_000)]
    pub store_command_timeout_ms: u64,

    #[arg(long, global = true, env = "STORE_CONNECT_TIMEOUT_MS", default_value_t = 3_000)]
    pub store_connect_timeout_ms: u64,

    #[arg(long, global = true, env = "STORE_RETRY_MAX_ATTEMPTS", default_value_t = 5)]
    pub store_retry_max_attempts: u32,

    #[arg(long, global = true, env = "STORE_RETRY_INITIAL_DELAY_MS", default_value_t = 500)]
    pub store_retry_initial_delay_ms: u64,

    #[arg(long, global = true, env = "STORE_RETRY_MAX_DELAY_MS", default_value_t = 30_000)]
    pub store_retry_max_delay_ms: u64,

    #[arg(long, global = true, env = "RATE_LIMIT_MULTIPLIER", default_value_t = 1.0)]
    pub rate_limit_multiplier: f64,

    /// JSON fleet seed; the demo fleet is used when absent.
    #[arg(long, global = true, env = "FLEET_SEED_PATH")]
    pub fleet_seed_path: Option<String>,
}

impl StoreArgs {
    pub fn redis_settings(&self) -> RedisStoreSettings {
        RedisStoreSettings {
            url: self.store_url.clone(),
            token: self.store_token.clone(),
            require_tls: self.store_require_tls,
            command_timeout: Duration::from_millis(self.store_command_timeout_ms),
            connect_timeout: Duration::from_millis(self.store_connect_timeout_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.store_retry_max_attempts,
            Duration::from_millis(self.store_retry_initial_delay_ms),
            Duration::from_millis(self.store_retry_max_delay_ms),
        )
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs one cache warming pass and prints its metrics as JSON.
    Warm(WarmArgs),
    /// Prints remaining quota per policy for the given identifiers.
    Monitor(MonitorArgs),
}

#[derive(Debug, Args)]
pub struct WarmArgs {
    /// Popular cars to warm.
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Days of availability per car, today included.
    #[arg(long, default_value_t = 7)]
    pub days: u32,

    #[arg(long, default_value_t = 5)]
    pub concurrency: usize,

    #[arg(long, default_value_t = 20)]
    pub batch_size: usize,
}

impl WarmArgs {
    pub fn options(&self) -> WarmingOptions {
        WarmingOptions {
            popular_limit: self.limit,
            days_ahead: self.days,
            max_concurrency: self.concurrency,
            batch_size: self.batch_size,
            startup_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Identifier (client IP or user id) to report on; repeatable.
    #[arg(long = "identifier", required = true)]
    pub identifiers: Vec<String>,

    #[arg(long, default_value_t = 60)]
    pub interval_secs: u64,

    /// Stops after this many reports; runs until interrupted when absent.
    #[arg(long)]
    pub iterations: Option<u64>,
}
