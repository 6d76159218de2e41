//! Stream client — connects to the market-data feed, subscribes to the tokens listed in
//! a file and logs every decoded quote. The session runs on its own read-loop thread
//! and reconnects with linear backoff; this thread only drains the quote channel.
//!
//! Usage example (CLI):
//! ```bash
//! SMARTSTREAM_ACCESS_TOKEN=... SMARTSTREAM_API_KEY=... SMARTSTREAM_FEED_TOKEN=... \
//!     stream_client --client-code A123 --mode snap-quote --path ./tokens.txt
//! ```
//!
//! The token file holds one `EXCHANGE:TOKEN[,TOKEN...]` entry per line, e.g. `NSE:2885`.
//! With `--watch` the file is re-read when it changes and the session resubscribes.
#![warn(missing_docs)]
mod args;
mod token_file;

use crate::args::Args;
use crate::token_file::TokenFile;
use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};
use stream_client::delivery::{self, QuoteReceiver};
use stream_client::{Credentials, Session, SessionConfig, SubscriptionSender, WsConnector};
use stream_common::{Quote, Result, StreamError};

/// How long the printer waits for a quote before re-checking the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Token file to watch and the session input that receives its replacements.
struct Watch {
    tokens: TokenFile,
    updates: SubscriptionSender,
    next_check: Instant,
}

impl Watch {
    fn new(tokens: TokenFile, updates: SubscriptionSender) -> Self {
        Self {
            tokens,
            updates,
            next_check: Instant::now() + POLL_INTERVAL,
        }
    }

    /// Checks the file at most once per `POLL_INTERVAL`.
    fn poll(&mut self) {
        let now = Instant::now();
        if now < self.next_check {
            return;
        }
        self.next_check = now + POLL_INTERVAL;
        match self.tokens.reload_if_changed() {
            Ok(Some(request)) => {
                info!("Token file changed, resubscribing to {} tokens", request.len());
                if self.updates.send(request).is_err() {
                    warn!("Session gone, token file no longer watched");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(
                "Keeping current subscription, {} unreadable: {}",
                self.tokens.path().display(),
                e
            ),
        }
    }
}

/// Drains `quotes` until shutdown is requested or the session drops its sender.
fn start_printer_loop(
    quotes: QuoteReceiver,
    shutdown: Arc<AtomicBool>,
    json: bool,
    mut watch: Option<Watch>,
) -> Result<()> {
    while !shutdown.load(Ordering::Relaxed) {
        if let Some(watch) = watch.as_mut() {
            watch.poll();
        }
        match quotes.recv_timeout(POLL_INTERVAL) {
            Ok(quote) if json => {
                let line = quote.to_json_bytes()?;
                info!("{}", String::from_utf8_lossy(&line));
            }
            Ok(quote) => print_quote(&quote),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!("Printer loop stopping...");
    Ok(())
}

fn print_quote(quote: &Quote) {
    info!(
        "QUOTE: {} seq={} LTP={:.2} LTQ={} Vol={} O={:.2} H={:.2} L={:.2} C={:.2} OI={}",
        quote.token,
        quote.sequence_number,
        quote.last_traded_price,
        quote.last_traded_quantity,
        quote.volume_traded,
        quote.open_price,
        quote.high_price,
        quote.low_price,
        quote.close_price,
        quote.open_interest
    );
}

fn main() -> Result<(), StreamError> {
    init_logger();
    let args = Args::parse();
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down client...");
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| StreamError::Format(format!("Error setting Ctrl+C handler: {}", e)))?;
    }

    let mut tokens = TokenFile::new(normalize_path(&args.path), args.mode);
    let subscription = tokens.load()?;
    info!("Tokens: {:?}", subscription.tokens());

    let config = SessionConfig {
        ping_interval: Duration::from_secs(args.ping_interval_secs),
        backoff_unit: Duration::from_secs(args.backoff_secs),
        max_reconnect_attempts: args.max_retries,
        ..SessionConfig::default()
    };
    let credentials = Credentials::new(
        args.client_code,
        args.api_key,
        args.access_token,
        args.feed_token,
    );

    let (quote_tx, quote_rx) = delivery::channel(args.capacity);
    let session = Session::new(WsConnector::new(&args.url), credentials, subscription, quote_tx)
        .with_config(config);
    let watch = args
        .watch
        .then(|| Watch::new(tokens, session.subscription_sender()));
    let handle = session.spawn();

    info!("Client is running. Press Ctrl+C to exit.");
    start_printer_loop(quote_rx, shutdown, args.json, watch)?;

    if handle.is_finished() {
        match handle.join() {
            Ok(reason) => warn!("Session ended: {:?}", reason),
            Err(_) => error!("Session thread panicked"),
        }
    }
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Normalize a CLI-provided path string by trimming whitespace and matching quotes.
///
/// This allows passing Windows paths in quotes without breaking parsing.
fn normalize_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let no_quotes = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    PathBuf::from(no_quotes)
}
