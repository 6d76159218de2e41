//! Server-side state shared by the stream threads.
//!
//! - `ping_monitor` — keepalive tracker used to drop silent clients.
//! - `quote_generator` — random-walk tick source and its broadcast thread.

pub mod ping_monitor;
pub mod quote_generator;
