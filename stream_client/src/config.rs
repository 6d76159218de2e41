//! Session configuration and credentials.
use std::fmt;
use std::time::Duration;

/// Default keepalive interval.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);
/// Default linear backoff unit.
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(2);
/// Default ceiling on reconnect attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 300;

/// Tunables for a [`Session`](crate::session::Session).
///
/// The endpoint belongs to the connector, e.g. [`WsConnector::new`](crate::transport::WsConnector::new).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Interval between keepalive frames while connected.
    pub ping_interval: Duration,
    /// Backoff unit; the n-th reconnect waits `n * backoff_unit`.
    pub backoff_unit: Duration,
    /// Failures tolerated before the session terminates.
    pub max_reconnect_attempts: u32,
    /// Optional cap on a single backoff delay. `None` keeps the growth uncapped.
    pub max_backoff: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            max_backoff: None,
        }
    }
}

impl SessionConfig {
    /// Backoff delay after the `attempt`-th failure.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let delay = self.backoff_unit.saturating_mul(attempt);
        match self.max_backoff {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}

/// Credentials sent as upgrade headers. Tokens are obtained elsewhere.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Client code (`x-client-code`).
    pub client_code: String,
    /// API key (`x-api-key`).
    pub api_key: String,
    /// Access token (`Authorization`).
    pub access_token: String,
    /// Feed token (`x-feed-token`).
    pub feed_token: String,
}

impl Credentials {
    /// Creates a credential set.
    pub fn new(
        client_code: impl Into<String>,
        api_key: impl Into<String>,
        access_token: impl Into<String>,
        feed_token: impl Into<String>,
    ) -> Self {
        Self {
            client_code: client_code.into(),
            api_key: api_key.into(),
            access_token: access_token.into(),
            feed_token: feed_token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_code", &self.client_code)
            .field("api_key", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("feed_token", &"<redacted>")
            .finish()
    }
}
