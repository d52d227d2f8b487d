//! Client configuration.
//!
//! Every knob has a default; only the endpoint URL is required. Values can be
//! built in code with [`ClientConfig::new`] plus struct update syntax, or read
//! from `CHAT_WS_*` environment variables with [`ClientConfig::from_env`].
//! Unparsable numeric variables fall back to their default.

use std::time::Duration;

use crate::backoff;

pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 32_000;
pub const DEFAULT_PING_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_MAX_SEND_RETRIES: u32 = 3;
pub const DEFAULT_MAX_MISSED_PONGS: u32 = 2;
pub const DEFAULT_STATUS_POLL_MS: u64 = 1_000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {var}")]
    MissingVar { var: &'static str },
    #[error("invalid websocket URL `{0}`: expected ws:// or wss://")]
    InvalidUrl(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// WebSocket endpoint, `ws://` or `wss://`.
    pub url: String,
    /// Bearer credential appended to the URL as `token=<token>`, percent-encoded.
    pub token: String,
    /// Connect as soon as the adapter is constructed.
    pub auto_connect: bool,
    /// Base delay of the reconnect backoff.
    pub reconnect_interval: Duration,
    /// Reconnect attempts before the client gives up and reports `error`.
    pub max_reconnect_attempts: u32,
    /// Ceiling of the reconnect backoff.
    pub max_backoff: Duration,
    /// Keep-alive ping period. Zero disables keep-alive.
    pub ping_interval: Duration,
    /// Maximum number of outbound messages held while disconnected.
    pub queue_capacity: usize,
    /// Resend attempts per queued message before it is dropped.
    pub max_send_retries: u32,
    /// Unanswered pings tolerated before the connection is considered dead.
    /// Zero disables the check.
    pub max_missed_pongs: u32,
    /// How often the adapter refreshes its status mirror.
    pub status_poll_interval: Duration,
}

impl ClientConfig {
    /// Config for `url` and `token` with every other field at its default.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            auto_connect: true,
            reconnect_interval: Duration::from_millis(DEFAULT_RECONNECT_INTERVAL_MS),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
            ping_interval: Duration::from_millis(DEFAULT_PING_INTERVAL_MS),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_send_retries: DEFAULT_MAX_SEND_RETRIES,
            max_missed_pongs: DEFAULT_MAX_MISSED_PONGS,
            status_poll_interval: Duration::from_millis(DEFAULT_STATUS_POLL_MS),
        }
    }

    /// Build a validated config from environment variables.
    ///
    /// Required:
    /// - `CHAT_WS_URL`
    ///
    /// Optional:
    /// - `CHAT_WS_TOKEN`: empty when absent
    /// - `CHAT_WS_AUTO_CONNECT`: default `true`
    /// - `CHAT_WS_RECONNECT_INTERVAL_MS`: default 1000
    /// - `CHAT_WS_MAX_RECONNECT_ATTEMPTS`: default 10
    /// - `CHAT_WS_MAX_BACKOFF_MS`: default 32000
    /// - `CHAT_WS_PING_INTERVAL_MS`: default 30000
    /// - `CHAT_WS_QUEUE_CAPACITY`: default 100
    /// - `CHAT_WS_MAX_SEND_RETRIES`: default 3
    /// - `CHAT_WS_MAX_MISSED_PONGS`: default 2
    /// - `CHAT_WS_STATUS_POLL_MS`: default 1000
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the URL is missing or the result fails
    /// [`ClientConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("CHAT_WS_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingVar { var: "CHAT_WS_URL" })?;
        let token = lookup("CHAT_WS_TOKEN").unwrap_or_default();

        let config = Self {
            auto_connect: env_parse(&lookup, "CHAT_WS_AUTO_CONNECT", true),
            reconnect_interval: Duration::from_millis(env_parse(
                &lookup,
                "CHAT_WS_RECONNECT_INTERVAL_MS",
                DEFAULT_RECONNECT_INTERVAL_MS,
            )),
            max_reconnect_attempts: env_parse(&lookup, "CHAT_WS_MAX_RECONNECT_ATTEMPTS", DEFAULT_MAX_RECONNECT_ATTEMPTS),
            max_backoff: Duration::from_millis(env_parse(&lookup, "CHAT_WS_MAX_BACKOFF_MS", DEFAULT_MAX_BACKOFF_MS)),
            ping_interval: Duration::from_millis(env_parse(&lookup, "CHAT_WS_PING_INTERVAL_MS", DEFAULT_PING_INTERVAL_MS)),
            queue_capacity: env_parse(&lookup, "CHAT_WS_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY),
            max_send_retries: env_parse(&lookup, "CHAT_WS_MAX_SEND_RETRIES", DEFAULT_MAX_SEND_RETRIES),
            max_missed_pongs: env_parse(&lookup, "CHAT_WS_MAX_MISSED_PONGS", DEFAULT_MAX_MISSED_PONGS),
            status_poll_interval: Duration::from_millis(env_parse(&lookup, "CHAT_WS_STATUS_POLL_MS", DEFAULT_STATUS_POLL_MS)),
            ..Self::new(url.trim(), token)
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the transport relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] for non-WebSocket URLs and
    /// [`ConfigError::InvalidValue`] for zero capacities or intervals.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ConfigError::InvalidUrl(self.url.clone()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue { field: "queue_capacity", reason: "must be at least 1" });
        }
        if self.reconnect_interval.is_zero() {
            return Err(ConfigError::InvalidValue { field: "reconnect_interval", reason: "must be non-zero" });
        }
        if self.max_backoff < self.reconnect_interval {
            return Err(ConfigError::InvalidValue {
                field: "max_backoff",
                reason: "must not be shorter than reconnect_interval",
            });
        }
        if self.status_poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue { field: "status_poll_interval", reason: "must be non-zero" });
        }
        Ok(())
    }

    /// Endpoint URL with the percent-encoded credential appended as a query
    /// parameter.
    #[must_use]
    pub fn connection_url(&self) -> String {
        if self.token.is_empty() {
            return self.url.clone();
        }
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{separator}token={}", self.url, urlencoding::encode(&self.token))
    }

    /// Backoff delay before reconnect attempt `attempt` (zero-based).
    #[must_use]
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        backoff::reconnect_delay(self.reconnect_interval, attempt, self.max_backoff)
    }
}

fn env_parse<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
