//! Mock market-data feed.
//!
//! Speaks the same WebSocket protocol as the production stream so the client can be run
//! end to end on one machine. The binary wires together:
//!
//! - an acceptor thread that performs each upgrade on its own thread, rejecting requests
//!   without the four auth headers with `401` and an `x-error-message` header;
//! - `QuoteGenerator`, which random-walks a token universe and broadcasts ticks to every
//!   registered stream over `crossbeam_channel`;
//! - one stream thread per client that applies subscription frames, answers `ping` with
//!   `pong` and forwards the ticks the client asked for as binary frames;
//! - `PingMonitor`, checked once a second, whose timeouts make the main loop stop the
//!   matching stream.
//!
//! Usage example:
//! ```bash
//! stream_server --bind 127.0.0.1:9443 --path ./tokens.txt --interval-ms 250
//! stream_client --url ws://127.0.0.1:9443/smart-stream --client-code A123 ...
//! ```
#![warn(missing_docs)]
mod args;
mod model;
mod stream;

use crate::args::Args;
use crate::model::ping_monitor::PingMonitor;
use crate::model::quote_generator::{QuoteGenerator, default_universe};
use crate::stream::{authorize, handle_client_stream};
use clap::Parser;
use crossbeam_channel::{Sender, bounded, select, unbounded};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use stream_common::subscription::TokenListParser;
use stream_common::{ExchangeType, Result, StreamError, SubscriptionMode, SubscriptionRequest};
use tungstenite::WebSocket;

/// Interval between keepalive checks.
const CHECK_INTERVAL: Duration = Duration::from_secs(1);

type Accepted = (WebSocket<TcpStream>, SocketAddr);

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    let universe = load_universe(args.path.as_deref())?;
    info!("Simulating {} instruments", universe.len());

    let listener = TcpListener::bind(&args.bind)?;
    info!("Mock feed listening on {}", listener.local_addr()?);

    let ping_monitor = Arc::new(Mutex::new(PingMonitor::new(Duration::from_secs(
        args.ping_timeout_secs,
    ))));
    let (stop_tx, stop_rx) = unbounded::<SocketAddr>();
    start_ping_monitor(Arc::clone(&ping_monitor), stop_tx.clone());

    let (session_tx, session_rx) = unbounded::<Accepted>();
    thread::spawn(move || accept_loop(listener, session_tx));

    let subscription_tx =
        QuoteGenerator::new(universe).start(Duration::from_millis(args.interval_ms));
    let mut active_streams: HashMap<SocketAddr, Sender<()>> = HashMap::new();

    loop {
        select! {
            recv(session_rx) -> msg => {
                let (ws, client_addr) = msg.map_err(|_| {
                    StreamError::Connection("acceptor stopped".to_string())
                })?;
                let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
                let (client_data_tx, client_data_rx) = unbounded();

                subscription_tx
                    .send(client_data_tx)
                    .map_err(|e| StreamError::ChannelSend(e.to_string()))?;
                if let Ok(mut monitor) = ping_monitor.lock() {
                    monitor.update_ping(client_addr);
                }
                active_streams.insert(client_addr, shutdown_tx);

                let monitor = Arc::clone(&ping_monitor);
                let closed_tx = stop_tx.clone();
                thread::spawn(move || {
                    if let Err(e) =
                        handle_client_stream(ws, client_addr, client_data_rx, shutdown_rx, monitor)
                    {
                        warn!("Stream for {} ended: {}", client_addr, e);
                    }
                    let _ = closed_tx.send(client_addr);
                });
                info!("Stream created for {} ({} active)", client_addr, active_streams.len());
            },

            recv(stop_rx) -> addr => if let Ok(client_addr) = addr {
                match active_streams.remove(&client_addr) {
                    Some(shutdown_tx) => {
                        let _ = shutdown_tx.try_send(());
                        info!("Stream for {} removed ({} active)", client_addr, active_streams.len());
                    }
                    None => debug!("Stream for {} already removed", client_addr),
                }
            }
        }
    }
}

/// Accepts TCP connections and upgrades each one on its own thread.
fn accept_loop(listener: TcpListener, session_tx: Sender<Accepted>) {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                error!("TCP accept error: {}", e);
                continue;
            }
        };
        let client_addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(e) => {
                error!("Peer address unavailable: {}", e);
                continue;
            }
        };
        let session_tx = session_tx.clone();
        thread::spawn(move || match tungstenite::accept_hdr(stream, authorize) {
            Ok(ws) => {
                info!("Client {} connected", client_addr);
                let _ = session_tx.send((ws, client_addr));
            }
            Err(e) => warn!("Handshake with {} failed: {}", client_addr, e),
        });
    }
}

/// Periodically evicts silent clients and reports them on `stop_tx`.
fn start_ping_monitor(ping_monitor: Arc<Mutex<PingMonitor>>, stop_tx: Sender<SocketAddr>) {
    thread::spawn(move || {
        loop {
            thread::sleep(CHECK_INTERVAL);
            let timed_out_clients = match ping_monitor.lock() {
                Ok(mut monitor) => {
                    let timed_out = monitor.check_timeouts();
                    debug!(
                        "Keepalive check: {} alive, {} timed out",
                        monitor.len(),
                        timed_out.len()
                    );
                    timed_out
                }
                Err(_) => {
                    error!("Ping monitor lock poisoned");
                    return;
                }
            };
            for client_addr in timed_out_clients {
                info!("Client {} timed out", client_addr);
                if stop_tx.send(client_addr).is_err() {
                    return;
                }
            }
        }
    });
}

/// Reads the instrument universe from a token file, or falls back to the default set.
fn load_universe(path: Option<&str>) -> Result<Vec<(ExchangeType, String)>> {
    let Some(path) = path else {
        return Ok(default_universe());
    };
    let file = File::open(path.trim())?;
    let request = SubscriptionRequest::parse_from_file(BufReader::new(file), SubscriptionMode::SnapQuote)?;
    let universe: Vec<(ExchangeType, String)> = request
        .tokens()
        .iter()
        .flat_map(|(exchange, tokens)| tokens.iter().map(|t| (*exchange, t.clone())))
        .collect();
    if universe.is_empty() {
        return Err(StreamError::ParseTokensFile(format!("no tokens in {}", path)));
    }
    Ok(universe)
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
