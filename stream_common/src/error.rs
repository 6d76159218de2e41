//! Error types shared between the client, the mock server and the collaborators.
//!
//! `StreamError` unifies transport, (de)serialization and reference-data failures so
//! every crate can propagate a single error type. Binary frame failures have their own
//! `DecodeError` because the read loop drops those frames instead of propagating them.
use std::io;

use thiserror::Error;

/// Failure to parse a binary tick frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame is shorter than the minimum length of its declared mode.
    #[error("frame too short for mode {mode}: expected {expected} bytes, got {actual}")]
    TooShort {
        /// Raw mode byte (0 when the frame is empty).
        mode: i8,
        /// Minimum frame length for that mode.
        expected: usize,
        /// Actual frame length.
        actual: usize,
    },

    /// A field holds a value the layout does not allow.
    #[error("malformed field `{field}`: {reason}")]
    MalformedField {
        /// Field name.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },
}

/// Unified error type shared by client and server.
#[derive(Error, Debug)]
pub enum StreamError {
    /// I/O error originating from the standard library, sockets or files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Dial or handshake failure.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Handshake rejected with HTTP 401; carries the server's error message.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Transport read failure, including a close frame from the peer.
    #[error("Read error: {0}")]
    Read(String),

    /// Binary frame could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Write failure for a subscription or keepalive frame.
    #[error("Send error: {0}")]
    Send(String),

    /// Generic formatting/validation error with a human-readable message.
    #[error("Format error: {0}")]
    Format(String),

    /// Error while parsing a token list file.
    #[error("Parse tokens file error: {0}")]
    ParseTokensFile(String),

    /// HTTP request to a REST endpoint failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// REST envelope reported `status: false`.
    #[error("API error {code}: {message}")]
    Envelope {
        /// `errorcode` from the envelope.
        code: String,
        /// `message` from the envelope.
        message: String,
    },

    /// Crossbeam/channel send failed (receiver dropped); contains a short context string.
    #[error("Channel send failed: {0}")]
    ChannelSend(String),

    /// No instrument matches the requested symbol and exchange segment.
    #[error("Instrument not found: {symbol} on {exchange}")]
    InstrumentNotFound {
        /// Trading symbol.
        symbol: String,
        /// Exchange segment (e.g. `NSE`).
        exchange: String,
    },
}
