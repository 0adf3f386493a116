use config::{Config, Environment};
use serde::Deserialize;

use crate::utils::error::ServerError;

/// Runtime configuration for the notification server.
///
/// Loaded from environment variables prefixed with `NOTIFY_`
/// (e.g. `NOTIFY_JWT_SECRET`). Every field except the secret has a default.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Port the HTTP listener binds to.
    #[serde(default = "defaults::port")]
    pub port: u16,
    /// Shared secret used to verify bearer tokens.
    pub jwt_secret: String,
    /// Accept a bare token without the `Bearer` scheme marker.
    /// Compatibility flag for clients that predate the strict format;
    /// strict parsing is the default.
    #[serde(default)]
    pub jwt_allow_bare_token: bool,
    /// Requests admitted per client address per window.
    #[serde(default = "defaults::rate_limit_quota")]
    pub rate_limit_quota: i64,
    /// Length of the admission window in seconds.
    #[serde(default = "defaults::rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
    /// Outbound queue capacity per session. A session that falls this far
    /// behind is evicted rather than blocked on.
    #[serde(default = "defaults::send_queue_capacity")]
    pub send_queue_capacity: usize,
    /// Seconds between keepalive pings.
    #[serde(default = "defaults::ping_interval_secs")]
    pub ping_interval_secs: u64,
    /// Seconds of inbound silence before a session is considered dead.
    #[serde(default = "defaults::pong_timeout_secs")]
    pub pong_timeout_secs: u64,
}

mod defaults {
    pub fn port() -> u16 {
        8080
    }
    pub fn rate_limit_quota() -> i64 {
        100
    }
    pub fn rate_limit_window_secs() -> u64 {
        60
    }
    pub fn send_queue_capacity() -> usize {
        256
    }
    pub fn ping_interval_secs() -> u64 {
        54
    }
    pub fn pong_timeout_secs() -> u64 {
        60
    }
}

impl AppConfig {
    /// Loads the configuration from the environment.
    ///
    /// # Errors
    /// Returns `ServerError::Configuration` if a value is missing or cannot
    /// be parsed.
    pub fn from_env() -> Result<Self, ServerError> {
        Config::builder()
            .add_source(Environment::with_prefix("NOTIFY"))
            .build()
            .map_err(|e| ServerError::Configuration(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ServerError::Configuration(e.to_string()))
    }

    /// Validates the configuration settings.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.jwt_secret.is_empty() {
            return Err(ServerError::Configuration(
                "jwt_secret must not be empty".into(),
            ));
        }
        if self.rate_limit_quota <= 0 {
            return Err(ServerError::Configuration(
                "rate_limit_quota must be greater than 0".into(),
            ));
        }
        if self.send_queue_capacity == 0 {
            return Err(ServerError::Configuration(
                "send_queue_capacity must be greater than 0".into(),
            ));
        }
        if self.ping_interval_secs >= self.pong_timeout_secs {
            return Err(ServerError::Configuration(
                "ping_interval_secs must be shorter than pong_timeout_secs".into(),
            ));
        }
        Ok(())
    }
}
