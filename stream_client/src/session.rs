//! Streaming session state machine.
//!
//! A `Session` owns one feed connection at a time together with the subscription it
//! replays, the keepalive schedule and the reconnect bookkeeping. It is driven by a
//! single thread: [`Session::step`] performs one transition, [`Session::run`] loops
//! until the session terminates.
//!
//! States:
//! - `Disconnected` — initial; the first step moves to `Connecting`.
//! - `Connecting` — dial and handshake. Success stores the new connection, schedules
//!   the first ping and sends the current subscription.
//! - `Connected` — send a `ping` when due, then block on one frame read. Binary frames
//!   are decoded and sent to the delivery channel; text frames are only logged.
//! - `ReconnectWait` — sleep until the backoff deadline, then dial again.
//! - `Terminated` — retries exhausted or the consumer hung up; nothing more happens.
//!
//! Any dial failure, 401 rejection or read failure moves to `ReconnectWait` and bumps
//! the reconnect counter; the deadline is `now + count * backoff_unit`. The counter is
//! never reset, and a failure that would push it past the configured maximum
//! terminates the session instead.
//!
//! The delivery channel's `send` blocks while the consumer is behind. Reads, pings and
//! reconnects all wait on it, so a slow consumer slows the whole loop.
//!
//! Once the loop runs on its own thread, replacement subscriptions arrive through the
//! [`SubscriptionSender`] from [`Session::subscription_sender`]. They are picked up at
//! the start of each step, so on a live connection a replacement goes out after the
//! blocking read in progress returns.
use std::mem;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, error, info, trace, warn};
use stream_common::SubscriptionRequest;
use stream_common::clock::{Clock, SystemClock};
use stream_common::decoder;
use stream_common::net::PING;

use crate::config::{Credentials, SessionConfig};
use crate::delivery::QuoteSender;
use crate::transport::{Connection, Connector, Frame};

/// Deadline used when a configured delay does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Sends replacement subscriptions to a running session.
pub type SubscriptionSender = Sender<SubscriptionRequest>;

fn deadline(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not yet started.
    Disconnected,
    /// About to dial.
    Connecting,
    /// Connection established and subscription sent.
    Connected,
    /// Waiting for the backoff deadline.
    ReconnectWait,
    /// Stopped for good.
    Terminated,
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The reconnect counter hit its ceiling and another failure occurred.
    RetriesExhausted {
        /// Reconnects attempted over the session's lifetime.
        attempts: u32,
    },
    /// The delivery channel's receiver was dropped.
    ConsumerGone,
}

enum Phase<T> {
    Disconnected,
    Connecting,
    Connected(T),
    ReconnectWait,
    Terminated(Termination),
}

enum Poll {
    Continue,
    Failed,
    ConsumerGone,
}

/// Push-based market-data session.
pub struct Session<C: Connector, K: Clock = SystemClock> {
    connector: C,
    clock: K,
    credentials: Credentials,
    config: SessionConfig,
    subscription: SubscriptionRequest,
    sender: QuoteSender,
    phase: Phase<C::Conn>,
    updates_tx: SubscriptionSender,
    updates_rx: Receiver<SubscriptionRequest>,
    reconnect_count: u32,
    next_reconnect_time: Instant,
    next_ping_time: Instant,
}

impl<C: Connector> Session<C, SystemClock> {
    /// Creates a disconnected session with the default configuration.
    pub fn new(
        connector: C,
        credentials: Credentials,
        subscription: SubscriptionRequest,
        sender: QuoteSender,
    ) -> Self {
        let config = SessionConfig::default();
        let now = SystemClock.now();
        let (updates_tx, updates_rx) = unbounded();
        Self {
            connector,
            clock: SystemClock,
            credentials,
            next_ping_time: deadline(now, config.ping_interval),
            config,
            subscription,
            sender,
            phase: Phase::Disconnected,
            updates_tx,
            updates_rx,
            reconnect_count: 0,
            next_reconnect_time: now,
        }
    }
}

impl<C: Connector, K: Clock> Session<C, K> {
    /// Replaces the configuration. Takes effect from the next scheduled action.
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Swaps the time source and restarts the schedule from its current instant.
    pub fn with_clock<K2: Clock>(self, clock: K2) -> Session<C, K2> {
        let now = clock.now();
        Session {
            connector: self.connector,
            clock,
            credentials: self.credentials,
            next_ping_time: deadline(now, self.config.ping_interval),
            config: self.config,
            subscription: self.subscription,
            sender: self.sender,
            phase: self.phase,
            updates_tx: self.updates_tx,
            updates_rx: self.updates_rx,
            reconnect_count: self.reconnect_count,
            next_reconnect_time: now,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Disconnected => SessionState::Disconnected,
            Phase::Connecting => SessionState::Connecting,
            Phase::Connected(_) => SessionState::Connected,
            Phase::ReconnectWait => SessionState::ReconnectWait,
            Phase::Terminated(_) => SessionState::Terminated,
        }
    }

    /// Reason for termination, once terminated.
    pub fn termination(&self) -> Option<Termination> {
        match self.phase {
            Phase::Terminated(reason) => Some(reason),
            _ => None,
        }
    }

    /// Reconnects attempted so far.
    pub fn reconnect_count(&self) -> u32 {
        self.reconnect_count
    }

    /// Earliest instant of the next dial while in `ReconnectWait`.
    pub fn next_reconnect_time(&self) -> Instant {
        self.next_reconnect_time
    }

    /// Instant the next keepalive is due while connected.
    pub fn next_ping_time(&self) -> Instant {
        self.next_ping_time
    }

    /// Subscription replayed on every connect.
    pub fn subscription(&self) -> &SubscriptionRequest {
        &self.subscription
    }

    /// Active configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Channel for replacing the subscription after the session has been moved onto
    /// its own thread. Each request received is handled like [`Session::subscribe`].
    pub fn subscription_sender(&self) -> SubscriptionSender {
        self.updates_tx.clone()
    }

    /// Replaces the subscription and, when connected, sends it right away.
    ///
    /// The session keeps only the latest request and replays it after every reconnect.
    pub fn subscribe(&mut self, request: SubscriptionRequest) {
        self.subscription = request;
        self.send_subscription();
    }

    /// Performs one state transition and returns the resulting state.
    pub fn step(&mut self) -> SessionState {
        self.apply_pending_subscriptions();
        match self.phase {
            Phase::Disconnected => self.phase = Phase::Connecting,
            Phase::Connecting => self.connect(),
            Phase::Connected(_) => match self.poll() {
                Poll::Continue => {}
                Poll::Failed => self.fail(),
                Poll::ConsumerGone => self.terminate(Termination::ConsumerGone),
            },
            Phase::ReconnectWait => {
                let now = self.clock.now();
                if now >= self.next_reconnect_time {
                    self.phase = Phase::Connecting;
                } else {
                    self.clock.sleep(self.next_reconnect_time - now);
                }
            }
            Phase::Terminated(_) => {}
        }
        self.state()
    }

    /// Drives the session until it terminates.
    pub fn run(&mut self) -> Termination {
        loop {
            if let Phase::Terminated(reason) = self.phase {
                return reason;
            }
            self.step();
        }
    }

    fn apply_pending_subscriptions(&mut self) {
        if let Phase::Terminated(_) = self.phase {
            return;
        }
        while let Ok(request) = self.updates_rx.try_recv() {
            debug!("Replacing subscription");
            self.subscribe(request);
        }
    }

    fn connect(&mut self) {
        match self.connector.connect(&self.credentials) {
            Ok(connection) => {
                info!(
                    "Session connected (reconnects so far: {})",
                    self.reconnect_count
                );
                self.phase = Phase::Connected(connection);
                self.next_ping_time = deadline(self.clock.now(), self.config.ping_interval);
                self.send_subscription();
            }
            Err(e) => {
                warn!("Connect failed: {}", e);
                self.fail();
            }
        }
    }

    fn send_subscription(&mut self) {
        let Phase::Connected(connection) = &mut self.phase else {
            return;
        };
        let text = match self.subscription.to_json() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode subscription: {}", e);
                return;
            }
        };
        match connection.send_text(&text) {
            Ok(()) => info!(
                "Subscription sent: {} tokens in {} mode",
                self.subscription.len(),
                self.subscription.mode()
            ),
            Err(e) => error!("Failed to send subscription: {}", e),
        }
    }

    fn poll(&mut self) -> Poll {
        let Phase::Connected(connection) = &mut self.phase else {
            return Poll::Continue;
        };

        let now = self.clock.now();
        if now >= self.next_ping_time {
            match connection.send_text(PING) {
                Ok(()) => debug!("Ping sent"),
                Err(e) => warn!("Ping failed: {}", e),
            }
            self.next_ping_time = deadline(now, self.config.ping_interval);
        }

        match connection.read_frame() {
            Ok(Frame::Text(text)) => {
                debug!("Text frame: {}", text);
                Poll::Continue
            }
            Ok(Frame::Binary(data)) => match decoder::decode(&data) {
                Ok(quote) => {
                    trace!("Quote {} ltp={}", quote.token, quote.last_traded_price);
                    match self.sender.send(quote) {
                        Ok(()) => Poll::Continue,
                        Err(_) => Poll::ConsumerGone,
                    }
                }
                Err(e) => {
                    warn!("Dropping undecodable frame ({} bytes): {}", data.len(), e);
                    Poll::Continue
                }
            },
            Ok(Frame::Control) => Poll::Continue,
            Err(e) => {
                warn!("Read failed: {}", e);
                Poll::Failed
            }
        }
    }

    fn close_connection(&mut self) {
        if let Phase::Connected(mut connection) = mem::replace(&mut self.phase, Phase::Connecting) {
            connection.close();
        }
    }

    fn fail(&mut self) {
        self.close_connection();
        if self.reconnect_count >= self.config.max_reconnect_attempts {
            error!(
                "Giving up after {} reconnect attempts",
                self.reconnect_count
            );
            self.phase = Phase::Terminated(Termination::RetriesExhausted {
                attempts: self.reconnect_count,
            });
            return;
        }
        self.reconnect_count += 1;
        let delay = self.config.backoff(self.reconnect_count);
        self.next_reconnect_time = deadline(self.clock.now(), delay);
        self.phase = Phase::ReconnectWait;
        warn!(
            "Reconnect {}/{} in {:?}",
            self.reconnect_count, self.config.max_reconnect_attempts, delay
        );
    }

    fn terminate(&mut self, reason: Termination) {
        self.close_connection();
        info!("Session terminated: {:?}", reason);
        self.phase = Phase::Terminated(reason);
    }
}

impl<C, K> Session<C, K>
where
    C: Connector + Send + 'static,
    C::Conn: Send,
    K: Clock + Send + 'static,
{
    /// Moves the session onto its own read-loop thread.
    pub fn spawn(mut self) -> JoinHandle<Termination> {
        thread::spawn(move || self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::time::Duration;
    use stream_common::{ExchangeType, Quote, StreamError, SubscriptionMode};

    #[derive(Clone)]
    struct ManualClock {
        now: Rc<Cell<Instant>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Rc::new(Cell::new(Instant::now())),
            }
        }

        fn advance(&self, by: Duration) {
            self.now.set(self.now.get() + by);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.now.get()
        }

        fn sleep(&self, duration: Duration) {
            self.advance(duration);
        }
    }

    type SentLog = Rc<RefCell<Vec<String>>>;

    struct ScriptedConnection {
        inbound: VecDeque<stream_common::Result<Frame>>,
        sent: SentLog,
        clock: ManualClock,
        read_cost: Duration,
        fail_sends: bool,
        closed: Rc<Cell<bool>>,
    }

    impl ScriptedConnection {
        fn new(clock: &ManualClock, frames: Vec<Frame>) -> Self {
            Self {
                inbound: frames.into_iter().map(Ok).collect(),
                sent: SentLog::default(),
                clock: clock.clone(),
                read_cost: Duration::ZERO,
                fail_sends: false,
                closed: Rc::new(Cell::new(false)),
            }
        }
    }

    impl Connection for ScriptedConnection {
        fn read_frame(&mut self) -> stream_common::Result<Frame> {
            self.clock.advance(self.read_cost);
            self.inbound
                .pop_front()
                .unwrap_or_else(|| Err(StreamError::Read("eof".to_string())))
        }

        fn send_text(&mut self, text: &str) -> stream_common::Result<()> {
            if self.fail_sends {
                return Err(StreamError::Send("broken pipe".to_string()));
            }
            self.sent.borrow_mut().push(text.to_string());
            Ok(())
        }

        fn close(&mut self) {
            self.closed.set(true);
        }
    }

    #[derive(Default)]
    struct ScriptedConnector {
        outcomes: VecDeque<stream_common::Result<ScriptedConnection>>,
        dials: Rc<Cell<usize>>,
    }

    impl Connector for ScriptedConnector {
        type Conn = ScriptedConnection;

        fn connect(&mut self, _: &Credentials) -> stream_common::Result<ScriptedConnection> {
            self.dials.set(self.dials.get() + 1);
            self.outcomes
                .pop_front()
                .unwrap_or_else(|| Err(StreamError::Connection("refused".to_string())))
        }
    }

    fn credentials() -> Credentials {
        Credentials::new("A123", "key", "token", "feed")
    }

    fn request() -> SubscriptionRequest {
        SubscriptionRequest::subscribe(SubscriptionMode::Ltp).with_tokens(ExchangeType::Nse, ["2885"])
    }

    fn config(max_reconnect_attempts: u32) -> SessionConfig {
        SessionConfig {
            max_reconnect_attempts,
            ..SessionConfig::default()
        }
    }

    fn ltp_frame(token: &str, raw_ltp: i64) -> Frame {
        let quote = Quote {
            subscription_mode: 1,
            exchange_type: 1,
            token: token.to_string(),
            last_traded_price: raw_ltp as f64 / 100.0,
            ..Quote::default()
        };
        Frame::Binary(decoder::encode(&quote).unwrap())
    }

    fn session(
        connector: ScriptedConnector,
        clock: &ManualClock,
        max_reconnect_attempts: u32,
    ) -> (Session<ScriptedConnector, ManualClock>, delivery::QuoteReceiver) {
        let (tx, rx) = delivery::channel(16);
        let session = Session::new(connector, credentials(), request(), tx)
            .with_config(config(max_reconnect_attempts))
            .with_clock(clock.clone());
        (session, rx)
    }

    #[test]
    fn connect_sends_subscription_and_delivers_quotes() {
        let clock = ManualClock::new();
        let connection = ScriptedConnection::new(
            &clock,
            vec![
                Frame::Text("ok".to_string()),
                ltp_frame("2885", 12345),
                Frame::Binary(vec![1, 1, 0]),
                Frame::Control,
            ],
        );
        let sent = connection.sent.clone();
        let connector = ScriptedConnector {
            outcomes: VecDeque::from([Ok(connection)]),
            ..ScriptedConnector::default()
        };
        let (mut session, rx) = session(connector, &clock, 3);

        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.step(), SessionState::Connecting);
        assert_eq!(session.step(), SessionState::Connected);
        assert_eq!(*sent.borrow(), vec![request().to_json().unwrap()]);

        for _ in 0..4 {
            assert_eq!(session.step(), SessionState::Connected);
        }
        let quotes: Vec<Quote> = rx.try_iter().collect();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].token, "2885");
        assert_eq!(quotes[0].last_traded_price, 123.45);
        assert_eq!(session.reconnect_count(), 0);
    }

    #[test]
    fn backoff_grows_linearly_with_failures() {
        let clock = ManualClock::new();
        let (mut session, _rx) = session(ScriptedConnector::default(), &clock, 5);
        let unit = session.config().backoff_unit;

        session.step();
        for n in 1..=5u32 {
            assert_eq!(session.step(), SessionState::ReconnectWait);
            assert_eq!(session.reconnect_count(), n);
            assert_eq!(session.next_reconnect_time(), clock.now() + unit * n);
            assert_eq!(session.step(), SessionState::ReconnectWait);
            assert_eq!(clock.now(), session.next_reconnect_time());
            assert_eq!(session.step(), SessionState::Connecting);
        }
    }

    #[test]
    fn terminates_when_retries_are_exhausted() {
        let clock = ManualClock::new();
        let connector = ScriptedConnector::default();
        let dials = connector.dials.clone();
        let (mut session, _rx) = session(connector, &clock, 2);

        assert_eq!(
            session.run(),
            Termination::RetriesExhausted { attempts: 2 }
        );
        assert_eq!(session.state(), SessionState::Terminated);
        assert_eq!(session.reconnect_count(), 2);
        assert_eq!(dials.get(), 3);

        assert_eq!(session.step(), SessionState::Terminated);
        assert_eq!(dials.get(), 3);
    }

    #[test]
    fn unauthorized_handshake_backs_off_then_recovers() {
        let clock = ManualClock::new();
        let connection = ScriptedConnection::new(&clock, vec![]);
        let connector = ScriptedConnector {
            outcomes: VecDeque::from([
                Err(StreamError::Unauthorized("Invalid feed token".to_string())),
                Ok(connection),
            ]),
            ..ScriptedConnector::default()
        };
        let (mut session, _rx) = session(connector, &clock, 3);

        session.step();
        assert_eq!(session.step(), SessionState::ReconnectWait);
        assert_eq!(session.reconnect_count(), 1);
        session.step();
        session.step();
        assert_eq!(session.step(), SessionState::Connected);
    }

    #[test]
    fn pings_once_per_elapsed_interval() {
        let clock = ManualClock::new();
        let mut connection =
            ScriptedConnection::new(&clock, vec![Frame::Control; 7]);
        connection.read_cost = Duration::from_secs(10);
        let sent = connection.sent.clone();
        let connector = ScriptedConnector {
            outcomes: VecDeque::from([Ok(connection)]),
            ..ScriptedConnector::default()
        };
        let (mut session, _rx) = session(connector, &clock, 3);
        let subscribe = request().to_json().unwrap();

        session.step();
        session.step();
        assert_eq!(
            session.next_ping_time(),
            clock.now() + Duration::from_secs(30)
        );

        // Reads at t=0s, 10s and 20s: nothing due yet.
        for _ in 0..3 {
            session.step();
        }
        assert_eq!(*sent.borrow(), vec![subscribe.clone()]);

        // Reads at t=30s..60s: one ping at 30s, another at 60s.
        for _ in 0..4 {
            session.step();
        }
        assert_eq!(
            *sent.borrow(),
            vec![subscribe, PING.to_string(), PING.to_string()]
        );
    }

    #[test]
    fn failed_sends_do_not_drop_the_connection() {
        let clock = ManualClock::new();
        let mut connection = ScriptedConnection::new(&clock, vec![Frame::Control; 2]);
        connection.fail_sends = true;
        connection.read_cost = Duration::from_secs(31);
        let connector = ScriptedConnector {
            outcomes: VecDeque::from([Ok(connection)]),
            ..ScriptedConnector::default()
        };
        let (mut session, _rx) = session(connector, &clock, 3);

        session.step();
        assert_eq!(session.step(), SessionState::Connected);
        assert_eq!(session.step(), SessionState::Connected);
        assert_eq!(session.step(), SessionState::Connected);
        assert_eq!(session.reconnect_count(), 0);
    }

    #[test]
    fn reconnect_resends_current_subscription() {
        let clock = ManualClock::new();
        let first = ScriptedConnection::new(&clock, vec![Frame::Text("ok".to_string())]);
        let first_sent = first.sent.clone();
        let first_closed = first.closed.clone();
        let second = ScriptedConnection::new(&clock, vec![]);
        let second_sent = second.sent.clone();
        let connector = ScriptedConnector {
            outcomes: VecDeque::from([Ok(first), Ok(second)]),
            ..ScriptedConnector::default()
        };
        let (mut session, _rx) = session(connector, &clock, 3);

        session.step();
        session.step();
        let replacement = SubscriptionRequest::subscribe(SubscriptionMode::SnapQuote)
            .with_tokens(ExchangeType::Nfo, ["43210"]);
        session.subscribe(replacement.clone());
        let replacement_json = replacement.to_json().unwrap();
        assert_eq!(
            *first_sent.borrow(),
            vec![request().to_json().unwrap(), replacement_json.clone()]
        );

        assert_eq!(session.step(), SessionState::Connected);
        assert_eq!(session.step(), SessionState::ReconnectWait);
        assert!(first_closed.get());
        session.step();
        session.step();
        assert_eq!(session.step(), SessionState::Connected);
        assert_eq!(*second_sent.borrow(), vec![replacement_json]);
        assert_eq!(session.subscription(), &replacement);
    }

    #[test]
    fn oversized_delays_push_deadlines_far_out_instead_of_overflowing() {
        let clock = ManualClock::new();
        let connection = ScriptedConnection::new(&clock, vec![Frame::Control]);
        let connector = ScriptedConnector {
            outcomes: VecDeque::from([Ok(connection)]),
            ..ScriptedConnector::default()
        };
        let (tx, _rx) = delivery::channel(1);
        let huge = Duration::from_secs(u64::MAX);
        let mut session = Session::new(connector, credentials(), request(), tx)
            .with_config(SessionConfig {
                ping_interval: huge,
                backoff_unit: huge,
                max_reconnect_attempts: 3,
                ..SessionConfig::default()
            })
            .with_clock(clock.clone());

        session.step();
        assert_eq!(session.step(), SessionState::Connected);
        assert_eq!(session.next_ping_time(), clock.now() + FAR_FUTURE);

        assert_eq!(session.step(), SessionState::Connected);
        assert_eq!(session.step(), SessionState::ReconnectWait);
        assert_eq!(session.reconnect_count(), 1);
        assert_eq!(session.next_reconnect_time(), clock.now() + FAR_FUTURE);

        assert_eq!(session.step(), SessionState::ReconnectWait);
        assert_eq!(session.step(), SessionState::Connecting);
    }

    #[test]
    fn queued_subscription_is_sent_live_and_replayed_after_reconnect() {
        let clock = ManualClock::new();
        let first = ScriptedConnection::new(&clock, vec![Frame::Control, Frame::Control]);
        let first_sent = first.sent.clone();
        let second = ScriptedConnection::new(&clock, vec![]);
        let second_sent = second.sent.clone();
        let connector = ScriptedConnector {
            outcomes: VecDeque::from([Ok(first), Ok(second)]),
            ..ScriptedConnector::default()
        };
        let (mut session, _rx) = session(connector, &clock, 3);
        let updates = session.subscription_sender();

        session.step();
        assert_eq!(session.step(), SessionState::Connected);
        assert_eq!(session.step(), SessionState::Connected);

        let replacement = SubscriptionRequest::subscribe(SubscriptionMode::Quote)
            .with_tokens(ExchangeType::Bse, ["500325"]);
        updates.send(replacement.clone()).unwrap();
        let replacement_json = replacement.to_json().unwrap();

        assert_eq!(session.step(), SessionState::Connected);
        assert_eq!(
            *first_sent.borrow(),
            vec![request().to_json().unwrap(), replacement_json.clone()]
        );
        assert_eq!(session.subscription(), &replacement);

        assert_eq!(session.step(), SessionState::ReconnectWait);
        session.step();
        session.step();
        assert_eq!(session.step(), SessionState::Connected);
        assert_eq!(*second_sent.borrow(), vec![replacement_json]);
    }

    #[test]
    fn subscription_queued_while_disconnected_is_used_on_connect() {
        let clock = ManualClock::new();
        let connection = ScriptedConnection::new(&clock, vec![]);
        let sent = connection.sent.clone();
        let connector = ScriptedConnector {
            outcomes: VecDeque::from([Ok(connection)]),
            ..ScriptedConnector::default()
        };
        let (mut session, _rx) = session(connector, &clock, 3);
        let replacement = SubscriptionRequest::subscribe(SubscriptionMode::SnapQuote)
            .with_tokens(ExchangeType::Nse, ["1594"]);
        session.subscription_sender().send(replacement.clone()).unwrap();

        session.step();
        assert_eq!(session.step(), SessionState::Connected);
        assert_eq!(*sent.borrow(), vec![replacement.to_json().unwrap()]);
    }

    #[test]
    fn dropped_receiver_terminates_session() {
        let clock = ManualClock::new();
        let connection = ScriptedConnection::new(&clock, vec![ltp_frame("2885", 100)]);
        let closed = connection.closed.clone();
        let connector = ScriptedConnector {
            outcomes: VecDeque::from([Ok(connection)]),
            ..ScriptedConnector::default()
        };
        let (mut session, rx) = session(connector, &clock, 3);
        drop(rx);

        assert_eq!(session.run(), Termination::ConsumerGone);
        assert_eq!(session.termination(), Some(Termination::ConsumerGone));
        assert!(closed.get());
    }
}
