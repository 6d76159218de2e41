//! Per-client feed streams.
//!
//! A stream owns one accepted WebSocket. It reads client text frames with a short
//! socket timeout so that, between reads, it can forward generator ticks and react to
//! the stop signal sent by the main loop.
use crate::model::ping_monitor::PingMonitor;
use crossbeam_channel::{Receiver, TryRecvError};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stream_common::net::{
    HEADER_API_KEY, HEADER_AUTHORIZATION, HEADER_CLIENT_CODE, HEADER_ERROR_MESSAGE,
    HEADER_FEED_TOKEN, PING, PONG,
};
use stream_common::{
    Action, ExchangeType, Quote, Result, StreamError, SubscriptionMode, SubscriptionRequest,
    decoder,
};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::{HeaderValue, StatusCode};
use tungstenite::{Error as WsError, Message, WebSocket};

/// How long a stream blocks on its socket before checking ticks and stop signals.
pub const READ_TIMEOUT: Duration = Duration::from_millis(50);

const REQUIRED_HEADERS: [&str; 4] = [
    HEADER_AUTHORIZATION,
    HEADER_API_KEY,
    HEADER_CLIENT_CODE,
    HEADER_FEED_TOKEN,
];

/// Returns the first auth header missing or empty on `req`.
pub fn missing_header(req: &Request) -> Option<&'static str> {
    REQUIRED_HEADERS.into_iter().find(|name| {
        req.headers()
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .is_none_or(|v| v.trim().is_empty())
    })
}

/// Handshake callback: lets the upgrade through only with every auth header present.
pub fn authorize(req: &Request, response: Response) -> std::result::Result<Response, ErrorResponse> {
    let Some(name) = missing_header(req) else {
        return Ok(response);
    };
    let message = format!("Missing {} header", name);
    let mut denied = ErrorResponse::new(Some(message.clone()));
    *denied.status_mut() = StatusCode::UNAUTHORIZED;
    if let Ok(value) = HeaderValue::from_str(&message) {
        denied.headers_mut().insert(HEADER_ERROR_MESSAGE, value);
    }
    Err(denied)
}

/// Tokens a client is subscribed to, each at its own mode.
#[derive(Debug, Default)]
pub struct ClientSubscriptions {
    tokens: HashMap<(ExchangeType, String), SubscriptionMode>,
}

impl ClientSubscriptions {
    /// Applies a subscribe or unsubscribe request.
    pub fn apply(&mut self, request: &SubscriptionRequest) {
        for (exchange, tokens) in request.tokens() {
            for token in tokens {
                let key = (*exchange, token.clone());
                match request.action() {
                    Action::Subscribe => {
                        self.tokens.insert(key, request.mode());
                    }
                    Action::Unsubscribe => {
                        self.tokens.remove(&key);
                    }
                }
            }
        }
    }

    /// Mode `quote`'s instrument is subscribed at, if any.
    pub fn mode_for(&self, quote: &Quote) -> Option<SubscriptionMode> {
        let exchange = ExchangeType::from_code(quote.exchange_type as i32)?;
        self.tokens.get(&(exchange, quote.token.clone())).copied()
    }

    /// Number of subscribed tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Encodes `quote` at the client's mode, or `None` when it is not subscribed.
    pub fn frame_for(&self, quote: &Quote) -> Option<Result<Vec<u8>>> {
        let mode = self.mode_for(quote)?;
        let mut tick = quote.clone();
        tick.subscription_mode = mode.code();
        Some(decoder::encode(&tick).map_err(StreamError::from))
    }
}

/// Serves one client until it disconnects, the stop signal fires, or the generator ends.
pub fn handle_client_stream(
    mut ws: WebSocket<TcpStream>,
    client_addr: SocketAddr,
    data_rx: Receiver<Quote>,
    stop_rx: Receiver<()>,
    ping_monitor: Arc<Mutex<PingMonitor>>,
) -> Result<()> {
    ws.get_ref().set_read_timeout(Some(READ_TIMEOUT))?;
    let mut subscriptions = ClientSubscriptions::default();

    let result = loop {
        match stop_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                info!("Closing stream for {}", client_addr);
                let _ = ws.close(None);
                let _ = ws.flush();
                break Ok(());
            }
            Err(TryRecvError::Empty) => {}
        }

        if let Err(e) = forward_ticks(&mut ws, &data_rx, &subscriptions) {
            break Err(e);
        }

        match ws.read() {
            Ok(Message::Text(text)) => {
                let text = text.as_str();
                if text == PING {
                    debug!("Ping from {}", client_addr);
                    if let Ok(mut monitor) = ping_monitor.lock() {
                        monitor.update_ping(client_addr);
                    }
                    if let Err(e) = ws.send(Message::text(PONG.to_string())) {
                        break Err(StreamError::Send(e.to_string()));
                    }
                    continue;
                }
                match SubscriptionRequest::from_json(text) {
                    Ok(request) => {
                        subscriptions.apply(&request);
                        info!(
                            "{} {:?} {} tokens at {}, now {} subscribed",
                            client_addr,
                            request.action(),
                            request.len(),
                            request.mode(),
                            subscriptions.len()
                        );
                    }
                    Err(e) => warn!("Ignoring frame from {}: {}", client_addr, e),
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {} closed the stream", client_addr);
                break Ok(());
            }
            Ok(_) => {}
            Err(WsError::Io(e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => break Ok(()),
            Err(e) => break Err(StreamError::Read(e.to_string())),
        }
    };

    if let Ok(mut monitor) = ping_monitor.lock() {
        monitor.remove(&client_addr);
    }
    result
}

/// Sends every pending tick the client is subscribed to.
fn forward_ticks(
    ws: &mut WebSocket<TcpStream>,
    data_rx: &Receiver<Quote>,
    subscriptions: &ClientSubscriptions,
) -> Result<()> {
    loop {
        let quote = match data_rx.try_recv() {
            Ok(quote) => quote,
            Err(TryRecvError::Empty) => return Ok(()),
            Err(TryRecvError::Disconnected) => {
                return Err(StreamError::Read("tick generator stopped".to_string()));
            }
        };
        let Some(frame) = subscriptions.frame_for(&quote) else {
            continue;
        };
        ws.send(Message::binary(frame?))
            .map_err(|e| StreamError::Send(e.to_string()))?;
    }
}
