//!
//! Push-based market-data streaming client.
//!
//! This crate aggregates:
//! - `session` — the connection state machine and its blocking read loop.
//! - `transport` — `Connector`/`Connection` seam and the WebSocket implementation.
//! - `delivery` — bounded quote channel between the read loop and the consumer.
//! - `config` — credentials and session tunables.
//! - `history` — historical candle retrieval.
//! - `instruments` — file-backed instrument reference data.
#![warn(missing_docs)]
pub mod config;
pub mod delivery;
pub mod history;
pub mod instruments;
pub mod session;
pub mod transport;

pub use config::{Credentials, SessionConfig};
pub use session::{Session, SessionState, SubscriptionSender, Termination};
pub use transport::{Connection, Connector, Frame, WsConnector};
