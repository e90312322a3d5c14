use std::env;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use fleetgate_application::{RetryPolicy, WarmingOptions};
use fleetgate_core::AppError;
use fleetgate_infrastructure::RedisStoreSettings;
use tracing_subscriber::EnvFilter;

/// Backing store selected by `STORE_BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("expected 'redis' or 'memory', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_host: String,
    pub api_port: u16,
    pub frontend_url: String,
    pub store_backend: StoreBackend,
    pub store: RedisStoreSettings,
    pub retry_policy: RetryPolicy,
    pub rate_limit_multiplier: f64,
    pub violation_capacity: usize,
    pub jwt_secret: String,
    pub warm_on_startup: bool,
    pub warming: WarmingOptions,
    pub fleet_seed_path: Option<String>,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let jwt_secret = required_non_empty_env("AUTH_JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            return Err(AppError::Validation(
                "AUTH_JWT_SECRET must be at least 32 characters".to_owned(),
            ));
        }

        let store = RedisStoreSettings {
            url: optional_env("STORE_URL"),
            token: optional_env("STORE_TOKEN"),
            require_tls: setting("STORE_REQUIRE_TLS", true)?,
            command_timeout: Duration::from_millis(setting("STORE_COMMAND_TIMEOUT_MS", 1_000)?),
            connect_timeout: Duration::from_millis(setting("STORE_CONNECT_TIMEOUT_MS", 3_000)?),
        };

        let retry_policy = RetryPolicy::new(
            setting("STORE_RETRY_MAX_ATTEMPTS", 5)?,
            Duration::from_millis(setting("STORE_RETRY_INITIAL_DELAY_MS", 500)?),
            Duration::from_millis(setting("STORE_RETRY_MAX_DELAY_MS", 30_000)?),
        );

        let rate_limit_multiplier: f64 = setting("RATE_LIMIT_MULTIPLIER", 1.0)?;
        if !rate_limit_multiplier.is_finite() || rate_limit_multiplier <= 0.0 {
            return Err(AppError::Validation(format!(
                "RATE_LIMIT_MULTIPLIER must be a positive number, got {rate_limit_multiplier}"
            )));
        }

        let warming = WarmingOptions {
            popular_limit: setting("CACHE_WARM_POPULAR_LIMIT", 10)?,
            days_ahead: setting("CACHE_WARM_DAYS_AHEAD", 7)?,
            max_concurrency: setting("CACHE_WARM_MAX_CONCURRENCY", 5)?,
            batch_size: setting("CACHE_WARM_BATCH_SIZE", 20)?,
            startup_delay: Duration::from_millis(setting("CACHE_WARM_STARTUP_DELAY_MS", 5_000)?),
        };

        Ok(Self {
            api_host: env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned()),
            api_port: setting("API_PORT", 3001)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_owned()),
            store_backend: setting("STORE_BACKEND", StoreBackend::Redis)?,
            store,
            retry_policy,
            rate_limit_multiplier,
            violation_capacity: setting("RATE_LIMIT_VIOLATION_CAPACITY", 1_000)?,
            jwt_secret,
            warm_on_startup: setting("CACHE_WARM_ON_STARTUP", true)?,
            warming,
            fleet_seed_path: optional_env("FLEET_SEED_PATH"),
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn setting<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_setting(name, optional_env(name), default)
}

fn parse_setting<T>(name: &str, raw: Option<String>, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|error| AppError::Validation(format!("invalid {name} '{raw}': {error}"))),
    }
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    optional_env(name).ok_or_else(|| AppError::Validation(format!("{name} is required")))
}
