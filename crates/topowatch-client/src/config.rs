//! Configuration for the sync client.
//!
//! All configuration is loaded from environment variables. The client
//! needs the server's base `WebSocket` URL, the session to join, and the
//! timing of its resync, liveness, and reconnect timers.
//!
//! The resync interval bounds staleness: a delta lost in transit is
//! healed no later than one resync interval plus a round trip after it
//! was committed.

use std::time::Duration;

use crate::backoff::{ReconnectPolicy, ReconnectStrategy};
use crate::error::SyncError;

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base `WebSocket` URL of the server (e.g. `ws://localhost:3001`).
    pub server_url: String,
    /// Session to join. Restricted to URL-unreserved characters, see
    /// [`ClientConfig::validate`].
    pub session_id: String,
    /// Interval between `request_graph_state` frames while connected.
    pub resync_interval: Duration,
    /// Interval between client liveness pings.
    pub ping_interval: Duration,
    /// How long to wait for a `pong` before treating the link as dead.
    pub pong_timeout: Duration,
    /// Upper bound on a single connect attempt.
    pub connect_timeout: Duration,
    /// Reconnect delay and attempt cap.
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    /// Build a config with default timers.
    pub fn new(server_url: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            session_id: session_id.into(),
            resync_interval: Duration::from_millis(30_000),
            ping_interval: Duration::from_millis(15_000),
            pong_timeout: Duration::from_millis(5_000),
            connect_timeout: Duration::from_millis(10_000),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Check that the session id can be placed in a URL path as is.
    ///
    /// Only ASCII letters, digits, `-`, `.`, `_` and `~` are accepted.
    /// Anything else would change meaning or fail the handshake on every
    /// attempt.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the id is empty or contains any
    /// other character.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.session_id.is_empty() {
            return Err(SyncError::Config("session id must not be empty".to_owned()));
        }
        if let Some(bad) = self
            .session_id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')))
        {
            return Err(SyncError::Config(format!(
                "session id {:?} contains {bad:?}; use letters, digits, '-', '.', '_' or '~'",
                self.session_id
            )));
        }
        Ok(())
    }

    /// The full socket URL for this session.
    pub fn session_url(&self) -> String {
        format!("{}/ws/{}", self.server_url.trim_end_matches('/'), self.session_id)
    }

    /// Load configuration from environment variables.
    ///
    /// Required variables:
    /// - `TOPOWATCH_URL` -- base `WebSocket` URL of the server
    ///
    /// Optional variables:
    /// - `TOPOWATCH_SESSION` -- session id (default `default`)
    /// - `RESYNC_INTERVAL_MS` -- periodic resync (default 30000)
    /// - `PING_INTERVAL_MS` -- liveness ping (default 15000)
    /// - `PONG_TIMEOUT_MS` -- liveness deadline (default 5000)
    /// - `CONNECT_TIMEOUT_MS` -- connect deadline (default 10000)
    /// - `MAX_RECONNECT_ATTEMPTS` -- reconnect cap (default 5)
    /// - `RECONNECT_BASE_DELAY_MS` -- backoff unit (default 1000)
    /// - `RECONNECT_MAX_DELAY_MS` -- backoff ceiling (default 30000)
    /// - `RECONNECT_STRATEGY` -- `linear` or `exponential` (default `linear`)
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if a variable is missing or invalid,
    /// including a `TOPOWATCH_SESSION` rejected by [`ClientConfig::validate`].
    pub fn from_env() -> Result<Self, SyncError> {
        let server_url = env_var("TOPOWATCH_URL")?;
        let session_id =
            std::env::var("TOPOWATCH_SESSION").unwrap_or_else(|_| "default".to_owned());

        let strategy: ReconnectStrategy = std::env::var("RECONNECT_STRATEGY")
            .unwrap_or_else(|_| "linear".to_owned())
            .parse()
            .map_err(|e| SyncError::Config(format!("invalid RECONNECT_STRATEGY: {e}")))?;

        let max_attempts: u32 = std::env::var("MAX_RECONNECT_ATTEMPTS")
            .unwrap_or_else(|_| "5".to_owned())
            .parse()
            .map_err(|e| SyncError::Config(format!("invalid MAX_RECONNECT_ATTEMPTS: {e}")))?;

        let config = Self {
            server_url,
            session_id,
            resync_interval: millis_var("RESYNC_INTERVAL_MS", 30_000)?,
            ping_interval: millis_var("PING_INTERVAL_MS", 15_000)?,
            pong_timeout: millis_var("PONG_TIMEOUT_MS", 5_000)?,
            connect_timeout: millis_var("CONNECT_TIMEOUT_MS", 10_000)?,
            reconnect: ReconnectPolicy {
                strategy,
                base: millis_var("RECONNECT_BASE_DELAY_MS", 1_000)?,
                max: millis_var("RECONNECT_MAX_DELAY_MS", 30_000)?,
                max_attempts,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

/// Read a required environment variable.
fn env_var(name: &str) -> Result<String, SyncError> {
    std::env::var(name)
        .map_err(|e| SyncError::Config(format!("missing required env var {name}: {e}")))
}

/// Read a non-zero millisecond duration with a default.
fn millis_var(name: &str, default: u64) -> Result<Duration, SyncError> {
    let ms: u64 = std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|e| SyncError::Config(format!("invalid {name}: {e}")))?;
    if ms == 0 {
        return Err(SyncError::Config(format!("{name} must be greater than zero")));
    }
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_session_ids_are_accepted() {
        for id in ["default", "ops", "rack-12.b_east~2"] {
            assert!(ClientConfig::new("ws://localhost:3001", id).validate().is_ok(), "{id}");
        }
    }

    #[test]
    fn session_ids_needing_escapes_are_rejected() {
        for id in ["", "ops team", "a/b", "q?x=1", "frag#1", "caf\u{e9}"] {
            let err = ClientConfig::new("ws://localhost:3001", id).validate();
            assert!(matches!(err, Err(SyncError::Config(_))), "{id:?} accepted");
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = ClientConfig::new("ws://localhost:3001", "default");
        assert_eq!(config.resync_interval, Duration::from_secs(30));
        assert_eq!(config.ping_interval, Duration::from_secs(15));
        assert_eq!(config.pong_timeout, Duration::from_secs(5));
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.strategy, ReconnectStrategy::Linear);
    }

    #[test]
    fn session_url_joins_without_double_slash() {
        let config = ClientConfig::new("ws://localhost:3001/", "ops");
        assert_eq!(config.session_url(), "ws://localhost:3001/ws/ops");
    }
}
