//! Builds Redis store clients from connection settings.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleetgate_application::{KeyValueStore, StoreFactory};
use fleetgate_core::{AppError, AppResult};
use redis::aio::ConnectionManager;
use tracing::{info, warn};
use url::Url;

use crate::redis_key_value_store::RedisKeyValueStore;

const PLACEHOLDER_MARKERS: [&str; 2] = ["placeholder", "changeme"];

/// Connection settings for the shared Redis-compatible store.
#[derive(Clone)]
pub struct RedisStoreSettings {
    /// Connection URL, e.g. `rediss://eu1-example.upstash.io:6379`.
    pub url: Option<String>,
    /// Access token sent as the connection password.
    pub token: Option<String>,
    /// Rejects plaintext `redis://` URLs.
    pub require_tls: bool,
    /// Upper bound for each command.
    pub command_timeout: Duration,
    /// Upper bound for connecting and the first ping.
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for RedisStoreSettings {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RedisStoreSettings")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("require_tls", &self.require_tls)
            .field("command_timeout", &self.command_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl RedisStoreSettings {
    /// Resolves the URL to dial, or the reason the store stays disabled.
    pub fn resolve_url(&self) -> Result<Url, String> {
        let url = configured(self.url.as_deref()).ok_or("store url is missing or a placeholder")?;
        let token =
            configured(self.token.as_deref()).ok_or("store token is missing or a placeholder")?;

        let mut parsed =
            Url::parse(url).map_err(|error| format!("store url is not a valid url: {error}"))?;
        match parsed.scheme() {
            "rediss" => {}
            "redis" if !self.require_tls => {}
            "redis" => return Err("store url must use the rediss scheme".to_owned()),
            other => return Err(format!("unsupported store url scheme '{other}'")),
        }

        if parsed.password().is_none() && parsed.set_password(Some(token)).is_err() {
            return Err("store url cannot carry credentials".to_owned());
        }

        Ok(parsed)
    }
}

fn configured(value: Option<&str>) -> Option<&str> {
    let value = value?.trim();
    let lowered = value.to_ascii_lowercase();
    let placeholder = value.is_empty()
        || lowered.starts_with("your")
        || PLACEHOLDER_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker));

    (!placeholder).then_some(value)
}

/// Store factory dialing Redis.
#[derive(Debug, Clone)]
pub struct RedisStoreFactory {
    settings: RedisStoreSettings,
}

impl RedisStoreFactory {
    /// Creates a factory from settings.
    #[must_use]
    pub fn new(settings: RedisStoreSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl StoreFactory for RedisStoreFactory {
    async fn connect(&self) -> AppResult<Option<Arc<dyn KeyValueStore>>> {
        let url = match self.settings.resolve_url() {
            Ok(url) => url,
            Err(reason) => {
                warn!(reason = %reason, "redis store disabled");
                return Ok(None);
            }
        };
        let host = url.host_str().unwrap_or("unknown").to_owned();

        let client = match redis::Client::open(url.as_str()) {
            Ok(client) => client,
            Err(error) => {
                warn!(host = %host, error = %error, "redis store disabled: invalid connection info");
                return Ok(None);
            }
        };

        let connect_timeout = self.settings.connect_timeout;
        let connection = tokio::time::timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                AppError::Store(format!(
                    "redis connect to {host} timed out after {}ms",
                    connect_timeout.as_millis()
                ))
            })?
            .map_err(|error| AppError::Store(format!("failed to connect to redis at {host}: {error}")))?;

        let store = RedisKeyValueStore::new(connection, self.settings.command_timeout);
        tokio::time::timeout(connect_timeout, store.ping())
            .await
            .map_err(|_| AppError::Store(format!("redis ping to {host} timed out")))??;

        info!(host = %host, "redis store connected");
        Ok(Some(Arc::new(store)))
    }
}
