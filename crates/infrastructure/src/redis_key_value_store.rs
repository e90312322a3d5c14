//! Redis-backed key-value store.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use fleetgate_application::{KeyValueStore, ScanPage, WindowHit};
use fleetgate_core::{AppError, AppResult};
use redis::aio::ConnectionManager;
use redis::{RedisResult, Script};

const RECORD_WINDOW_HIT_SCRIPT: &str = r#"
local key = KEYS[1]
local window_start = ARGV[1]
local score = tonumber(ARGV[2])
local member = ARGV[3]
local ttl = tonumber(ARGV[4])

redis.call('ZREMRANGEBYSCORE', key, '-inf', '(' .. window_start)
redis.call('ZADD', key, score, member)
local count = redis.call('ZCARD', key)
redis.call('EXPIRE', key, ttl)
return count
"#;

/// Redis implementation of the key-value store port.
///
/// Every command is bounded by `command_timeout`; timeouts surface as
/// `AppError::Store` like any other store failure.
#[derive(Clone)]
pub struct RedisKeyValueStore {
    connection: ConnectionManager,
    command_timeout: Duration,
}

impl RedisKeyValueStore {
    /// Wraps an established connection manager.
    #[must_use]
    pub fn new(connection: ConnectionManager, command_timeout: Duration) -> Self {
        Self {
            connection,
            command_timeout,
        }
    }

    async fn bounded<T, F>(&self, operation: &str, command: F) -> AppResult<T>
    where
        F: Future<Output = RedisResult<T>> + Send,
    {
        match tokio::time::timeout(self.command_timeout, command).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(AppError::Store(format!(
                "redis {operation} failed: {error}"
            ))),
            Err(_) => Err(AppError::Store(format!(
                "redis {operation} timed out after {}ms",
                self.command_timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn ping(&self) -> AppResult<()> {
        let mut connection = self.connection.clone();
        let reply: String = self
            .bounded("PING", async move {
                redis::cmd("PING").query_async(&mut connection).await
            })
            .await?;

        if reply != "PONG" {
            return Err(AppError::Store(format!(
                "unexpected redis ping response: {reply}"
            )));
        }

        Ok(())
    }

    async fn record_window_hit(&self, hit: &WindowHit) -> AppResult<u64> {
        let mut connection = self.connection.clone();
        let script = Script::new(RECORD_WINDOW_HIT_SCRIPT);

        self.bounded("window hit", async move {
            script
                .key(hit.key.as_str())
                .arg(hit.window_start_ms)
                .arg(hit.entry.timestamp_ms)
                .arg(hit.entry.member.as_str())
                .arg(hit.ttl_seconds)
                .invoke_async(&mut connection)
                .await
        })
        .await
    }

    async fn count_window(&self, key: &str, window_start_ms: i64) -> AppResult<u64> {
        let mut connection = self.connection.clone();
        let (count,): (u64,) = self
            .bounded("window count", async move {
                redis::pipe()
                    .atomic()
                    .cmd("ZREMRANGEBYSCORE")
                    .arg(key)
                    .arg("-inf")
                    .arg(format!("({window_start_ms}"))
                    .ignore()
                    .cmd("ZCARD")
                    .arg(key)
                    .query_async(&mut connection)
                    .await
            })
            .await?;

        Ok(count)
    }

    async fn oldest_window_entry(&self, key: &str) -> AppResult<Option<i64>> {
        let mut connection = self.connection.clone();
        let entries: Vec<(String, f64)> = self
            .bounded("ZRANGE", async move {
                redis::cmd("ZRANGE")
                    .arg(key)
                    .arg(0)
                    .arg(0)
                    .arg("WITHSCORES")
                    .query_async(&mut connection)
                    .await
            })
            .await?;

        Ok(entries.first().map(|(_, score)| *score as i64))
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut connection = self.connection.clone();
        self.bounded("GET", async move {
            redis::cmd("GET").arg(key).query_async(&mut connection).await
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> AppResult<()> {
        let mut connection = self.connection.clone();
        let mut command = redis::cmd("SET");
        command.arg(key).arg(value);
        if let Some(ttl_seconds) = ttl_seconds {
            command.arg("EX").arg(ttl_seconds.max(1));
        }

        self.bounded("SET", async move { command.query_async(&mut connection).await })
            .await
    }

    async fn delete(&self, keys: &[String]) -> AppResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut connection = self.connection.clone();
        self.bounded("DEL", async move {
            redis::cmd("DEL").arg(keys).query_async(&mut connection).await
        })
        .await
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> AppResult<ScanPage> {
        let mut connection = self.connection.clone();
        let (next_cursor, keys): (u64, Vec<String>) = self
            .bounded("SCAN", async move {
                redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(pattern)
                    .arg("COUNT")
                    .arg(count)
                    .query_async(&mut connection)
                    .await
            })
            .await?;

        Ok(ScanPage { next_cursor, keys })
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut connection = self.connection.clone();
        self.bounded("EXISTS", async move {
            redis::cmd("EXISTS").arg(key).query_async(&mut connection).await
        })
        .await
    }

    async fn ttl(&self, key: &str) -> AppResult<i64> {
        let mut connection = self.connection.clone();
        self.bounded("TTL", async move {
            redis::cmd("TTL").arg(key).query_async(&mut connection).await
        })
        .await
    }
}
