//! Keepalive tracker for connected feed clients.
//!
//! Clients are keyed by the peer address of their WebSocket connection. A client is
//! registered when its handshake completes and refreshed on every `ping` text frame;
//! `check_timeouts` evicts and returns everyone whose last ping is older than the
//! configured timeout.
//!
//! The monitor is not synchronized. The server shares it behind `Arc<Mutex<_>>`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Tracks the last keepalive of each client.
pub struct PingMonitor {
    clients: HashMap<SocketAddr, Instant>,
    timeout: Duration,
}

impl PingMonitor {
    /// Monitor that expires clients silent for longer than `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            timeout,
        }
    }

    /// Records a keepalive from `addr` now.
    pub fn update_ping(&mut self, addr: SocketAddr) {
        self.update_ping_at(addr, Instant::now());
    }

    /// Records a keepalive from `addr` at `now`.
    pub fn update_ping_at(&mut self, addr: SocketAddr, now: Instant) {
        self.clients.insert(addr, now);
    }

    /// Forgets `addr`, e.g. after its connection closed.
    pub fn remove(&mut self, addr: &SocketAddr) {
        self.clients.remove(addr);
    }

    /// Evicts and returns clients that timed out as of now.
    pub fn check_timeouts(&mut self) -> Vec<SocketAddr> {
        self.check_timeouts_at(Instant::now())
    }

    /// Evicts and returns clients whose last ping is older than the timeout at `now`.
    pub fn check_timeouts_at(&mut self, now: Instant) -> Vec<SocketAddr> {
        let timeout = self.timeout;
        let mut timed_out = Vec::new();

        self.clients.retain(|addr, last_ping| {
            if now.saturating_duration_since(*last_ping) > timeout {
                timed_out.push(*addr);
                false
            } else {
                true
            }
        });
        timed_out
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }
}
