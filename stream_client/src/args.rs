//! Command-line arguments for the stream client.
//!
//! Credentials may come from flags or from the environment so they stay out of shell
//! history.
use clap::Parser;
use stream_client::config::{
    DEFAULT_BACKOFF_UNIT, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_PING_INTERVAL,
};
use stream_client::delivery::DEFAULT_CAPACITY;
use stream_common::SubscriptionMode;
use stream_common::net::FEED_URL;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Feed endpoint (`ws://` or `wss://`).
    #[arg(long, default_value = FEED_URL)]
    pub url: String,

    /// Client code sent as `x-client-code`.
    #[arg(long, env = "SMARTSTREAM_CLIENT_CODE")]
    pub client_code: String,

    /// API key sent as `x-api-key`.
    #[arg(long, env = "SMARTSTREAM_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Access token sent as `Authorization`.
    #[arg(long, env = "SMARTSTREAM_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    /// Feed token sent as `x-feed-token`.
    #[arg(long, env = "SMARTSTREAM_FEED_TOKEN", hide_env_values = true)]
    pub feed_token: String,

    /// Feed mode to subscribe with.
    #[arg(long, value_enum, default_value_t = SubscriptionMode::Ltp)]
    pub mode: SubscriptionMode,

    /// Path to a token list, one `EXCHANGE:TOKEN[,TOKEN...]` entry per line.
    /// The path itself may be wrapped in double quotes; surrounding whitespace is ignored.
    #[arg(long)]
    pub path: String,

    /// Seconds between keepalive pings.
    #[arg(long, default_value_t = DEFAULT_PING_INTERVAL.as_secs())]
    pub ping_interval_secs: u64,

    /// Linear reconnect backoff unit in seconds.
    #[arg(long, default_value_t = DEFAULT_BACKOFF_UNIT.as_secs())]
    pub backoff_secs: u64,

    /// Reconnect attempts before giving up.
    #[arg(long, default_value_t = DEFAULT_MAX_RECONNECT_ATTEMPTS)]
    pub max_retries: u32,

    /// Quotes buffered between the read loop and the printer.
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    pub capacity: usize,

    /// Print quotes as JSON lines instead of a summary.
    #[arg(long)]
    pub json: bool,

    /// Re-read the token list when the file changes and resubscribe with it.
    #[arg(long)]
    pub watch: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use stream_client::SessionConfig;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec![
            "stream_client",
            "--client-code",
            "A123",
            "--api-key",
            "key-1",
            "--access-token",
            "jwt",
            "--feed-token",
            "feed-1",
            "--path",
            "tokens.txt",
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_follow_the_library() {
        let args = parse(&[]);
        let config = SessionConfig::default();
        assert_eq!(args.url, FEED_URL);
        assert_eq!(args.capacity, DEFAULT_CAPACITY);
        assert_eq!(args.ping_interval_secs, config.ping_interval.as_secs());
        assert_eq!(args.backoff_secs, config.backoff_unit.as_secs());
        assert_eq!(args.max_retries, config.max_reconnect_attempts);
        assert_eq!(args.mode, SubscriptionMode::Ltp);
        assert!(!args.watch);
    }

    #[test]
    fn overrides_are_taken_verbatim() {
        let args = parse(&["--capacity", "8", "--backoff-secs", "18446744073709551615", "--watch"]);
        assert_eq!(args.capacity, 8);
        assert_eq!(args.backoff_secs, u64::MAX);
        assert!(args.watch);
    }
}
