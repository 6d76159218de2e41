//!
//! Wire-level types shared by the stream client and the mock feed server.
//!
//! This crate aggregates:
//! - `error` — `StreamError` used across the workspace and the frame-level `DecodeError`.
//! - `result` — handy `Result<T, StreamError>` alias.
//! - `quote` — decoded tick model (`Quote`, `BestFiveData`, `SubscriptionMode`).
//! - `decoder` — binary frame decoder and its inverse encoder.
//! - `subscription` — subscription requests, exchange codes and token-file parsing.
//! - `net` — endpoint, header and keepalive constants.
//! - `clock` — monotonic clock abstraction.
#![warn(missing_docs)]
pub mod clock;
pub mod decoder;
pub mod error;
pub mod net;
pub mod quote;
pub mod result;
pub mod subscription;

pub use error::{DecodeError, StreamError};
pub use quote::{BestFiveData, BidAskPacket, Quote, SubscriptionMode};
pub use result::Result;
pub use subscription::{Action, ExchangeType, SubscriptionRequest};
