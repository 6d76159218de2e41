//! Command-line arguments for the mock feed server.
use clap::Parser;
use stream_common::net::MOCK_BIND_ADDRESS;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Address to accept WebSocket connections on.
    #[arg(long, default_value = MOCK_BIND_ADDRESS)]
    pub bind: String,

    /// Token file (`EXCHANGE:TOKEN[,TOKEN...]` per line) listing the instruments to
    /// simulate. A small NSE set is used when omitted.
    #[arg(long)]
    pub path: Option<String>,

    /// Milliseconds between generator rounds.
    #[arg(long, default_value_t = 500)]
    pub interval_ms: u64,

    /// Seconds without a `ping` after which a client is dropped.
    #[arg(long, default_value_t = 65)]
    pub ping_timeout_secs: u64,
}
