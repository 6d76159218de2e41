//! Shared networking constants used by client and server.

/// Production market-data stream endpoint.
pub const FEED_URL: &str = "wss://smartapisocket.angelone.in/smart-stream";

/// Default bind address of the local mock feed server.
pub const MOCK_BIND_ADDRESS: &str = "127.0.0.1:9443";

/// Upgrade header carrying the access token.
pub const HEADER_AUTHORIZATION: &str = "authorization";
/// Upgrade header carrying the API key.
pub const HEADER_API_KEY: &str = "x-api-key";
/// Upgrade header carrying the client code.
pub const HEADER_CLIENT_CODE: &str = "x-client-code";
/// Upgrade header carrying the feed token.
pub const HEADER_FEED_TOKEN: &str = "x-feed-token";
/// Response header the feed uses to explain a rejected handshake.
pub const HEADER_ERROR_MESSAGE: &str = "x-error-message";

/// Keepalive text frame sent by the client.
pub const PING: &str = "ping";
/// Keepalive reply sent by the feed.
pub const PONG: &str = "pong";

/// Builds a plain `ws://` URL for a local feed at `address`.
pub fn local_feed_url(address: &str) -> String {
    format!("ws://{}/smart-stream", address)
}
