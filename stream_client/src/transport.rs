//! Transport seam between the session and the network.
//!
//! The session only needs to dial with credentials, read one frame at a time and send
//! text frames. `Connector` and `Connection` capture exactly that, so the state machine
//! can be exercised with scripted connections in tests while `WsConnector` talks to the
//! real feed through a blocking `tungstenite` socket.
use std::net::TcpStream;

use log::{debug, info};
use stream_common::net::{
    HEADER_API_KEY, HEADER_AUTHORIZATION, HEADER_CLIENT_CODE, HEADER_ERROR_MESSAGE,
    HEADER_FEED_TOKEN,
};
use stream_common::{Result, StreamError};
use tungstenite::client::IntoClientRequest;
use tungstenite::http::{HeaderValue, StatusCode};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::config::Credentials;

/// One inbound frame, reduced to what the read loop cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text frame (acknowledgements, `pong`, error notices).
    Text(String),
    /// Binary tick packet.
    Binary(Vec<u8>),
    /// Ping/pong or raw control frame; already handled by the transport.
    Control,
}

/// An established feed connection.
pub trait Connection {
    /// Blocks until the next frame arrives. A closed peer is an error.
    fn read_frame(&mut self) -> Result<Frame>;
    /// Sends one text frame.
    fn send_text(&mut self, text: &str) -> Result<()>;
    /// Best-effort close.
    fn close(&mut self);
}

/// Dials new connections.
pub trait Connector {
    /// Connection type produced by this connector.
    type Conn: Connection;
    /// Dials the feed and completes the authenticated handshake.
    fn connect(&mut self, credentials: &Credentials) -> Result<Self::Conn>;
}

/// `Connector` for the WebSocket feed.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// Creates a connector for `url` (`ws://` or `wss://`).
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

fn header(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| StreamError::Connection(format!("invalid header value: {}", e)))
}

impl Connector for WsConnector {
    type Conn = WsConnection;

    fn connect(&mut self, credentials: &Credentials) -> Result<WsConnection> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| StreamError::Connection(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert(HEADER_AUTHORIZATION, header(&credentials.access_token)?);
        headers.insert(HEADER_API_KEY, header(&credentials.api_key)?);
        headers.insert(HEADER_CLIENT_CODE, header(&credentials.client_code)?);
        headers.insert(HEADER_FEED_TOKEN, header(&credentials.feed_token)?);

        debug!("Dialing {}", self.url);
        match tungstenite::connect(request) {
            Ok((socket, response)) => {
                info!("Connected to {} ({})", self.url, response.status());
                Ok(WsConnection { socket })
            }
            Err(tungstenite::Error::Http(response)) if response.status() == StatusCode::UNAUTHORIZED => {
                let reason = response
                    .headers()
                    .get(HEADER_ERROR_MESSAGE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("authentication rejected")
                    .to_string();
                Err(StreamError::Unauthorized(reason))
            }
            Err(e) => Err(StreamError::Connection(e.to_string())),
        }
    }
}

/// Blocking WebSocket connection.
pub struct WsConnection {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl Connection for WsConnection {
    fn read_frame(&mut self) -> Result<Frame> {
        match self.socket.read() {
            Ok(Message::Text(text)) => Ok(Frame::Text(text.as_str().to_owned())),
            Ok(Message::Binary(data)) => Ok(Frame::Binary(data.to_vec())),
            Ok(Message::Close(frame)) => Err(StreamError::Read(match frame {
                Some(frame) => format!("closed by peer: {} {}", frame.code, frame.reason.as_str()),
                None => "closed by peer".to_string(),
            })),
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => Ok(Frame::Control),
            Err(e) => Err(StreamError::Read(e.to_string())),
        }
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        self.socket
            .send(Message::text(text.to_owned()))
            .map_err(|e| StreamError::Send(e.to_string()))
    }

    fn close(&mut self) {
        if let Err(e) = self.socket.close(None) {
            debug!("Close failed: {}", e);
        }
    }
}
