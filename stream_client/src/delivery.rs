//! Ordered handoff of decoded quotes from the read loop to the consumer.
//!
//! The channel is bounded: when it is full the session's read loop blocks in `send`,
//! which pushes backpressure onto the socket and delays keepalives and reconnects.
//! A capacity of zero gives a rendezvous channel where every send waits for a `recv`.
use crossbeam_channel::{Receiver, Sender, bounded};
use stream_common::Quote;

/// Producer half held by the session.
pub type QuoteSender = Sender<Quote>;
/// Consumer half drained by caller code.
pub type QuoteReceiver = Receiver<Quote>;

/// Default buffer size between the read loop and the consumer.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Creates a bounded quote channel.
pub fn channel(capacity: usize) -> (QuoteSender, QuoteReceiver) {
    bounded(capacity)
}
