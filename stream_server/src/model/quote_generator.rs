//! Synthetic tick generation and broadcasting.
//!
//! `QuoteGenerator` keeps a random-walk book for every instrument in its universe and
//! produces one full SnapQuote-level `Quote` per instrument per round. `start` moves it
//! onto a background thread that broadcasts each round to every registered client
//! stream. Streams register by sending their own `Sender<Quote>` into the channel that
//! `start` returns; a stream whose receiver is gone is dropped on the next send.

use chrono::Utc;
use crossbeam_channel::{Sender, TryRecvError, unbounded};
use log::{debug, info};
use rand::Rng;
use std::thread;
use std::time::Duration;
use stream_common::{BestFiveData, BidAskPacket, ExchangeType, Quote, SubscriptionMode};

/// Price every instrument starts from.
pub const INITIAL_PRICE: f64 = 100.0;
/// Minimum price increment.
pub const TICK_SIZE: f64 = 0.05;

/// Instruments served when no token file is given.
pub fn default_universe() -> Vec<(ExchangeType, String)> {
    ["2885", "1594", "3045", "11536", "1333"]
        .into_iter()
        .map(|token| (ExchangeType::Nse, token.to_string()))
        .collect()
}

fn round_to_tick(price: f64) -> f64 {
    let ticks = (price / TICK_SIZE).round().max(1.0);
    (ticks * TICK_SIZE * 100.0).round() / 100.0
}

struct Book {
    exchange: ExchangeType,
    token: String,
    last_price: f64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
    turnover: f64,
    open_interest: i64,
}

impl Book {
    fn new(exchange: ExchangeType, token: String) -> Self {
        Self {
            exchange,
            token,
            last_price: INITIAL_PRICE,
            open: INITIAL_PRICE,
            high: INITIAL_PRICE,
            low: INITIAL_PRICE,
            close: INITIAL_PRICE,
            volume: 0,
            turnover: 0.0,
            open_interest: 0,
        }
    }

    fn step<R: Rng>(&mut self, rng: &mut R, sequence_number: i64, timestamp: i64) -> Quote {
        let change: f64 = rng.random_range(-0.005..0.005);
        let price = round_to_tick(self.last_price * (1.0 + change));
        let quantity: i64 = rng.random_range(1..=500);

        self.last_price = price;
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.volume += quantity;
        self.turnover += price * quantity as f64;
        self.open_interest = (self.open_interest + rng.random_range(-50..=100)).max(0);

        let mut best_five = BestFiveData::default();
        for level in 0..5 {
            let offset = TICK_SIZE * (level + 1) as f64;
            best_five.buys[level] = BidAskPacket {
                flag: 1,
                price: round_to_tick(price - offset),
                quantity: rng.random_range(1..=1_000),
                orders: rng.random_range(1..=20),
            };
            best_five.sells[level] = BidAskPacket {
                flag: 0,
                price: round_to_tick(price + offset),
                quantity: rng.random_range(1..=1_000),
                orders: rng.random_range(1..=20),
            };
        }

        Quote {
            subscription_mode: SubscriptionMode::SnapQuote.code(),
            exchange_type: self.exchange.code() as i8,
            token: self.token.clone(),
            sequence_number,
            exchange_timestamp: timestamp,
            last_traded_price: price,
            last_traded_quantity: quantity,
            average_traded_price: (self.turnover / self.volume as f64 * 100.0).round() / 100.0,
            volume_traded: self.volume,
            total_buy_quantity: best_five.buys.iter().map(|p| p.quantity).sum(),
            total_sell_quantity: best_five.sells.iter().map(|p| p.quantity).sum(),
            open_price: self.open,
            high_price: self.high,
            low_price: self.low,
            close_price: self.close,
            last_traded_timestamp: timestamp / 1_000,
            open_interest: self.open_interest,
            best_five,
            upper_circuit_limit: round_to_tick(self.close * 1.2),
            lower_circuit_limit: round_to_tick(self.close * 0.8),
            year_high_price: self.high.max(self.close * 1.5),
            year_low_price: self.low.min(self.close * 0.5),
        }
    }
}

/// Random-walk market for a fixed instrument universe.
pub struct QuoteGenerator {
    books: Vec<Book>,
    sequence_number: i64,
}

impl QuoteGenerator {
    /// Generator for `universe`, every instrument starting at [`INITIAL_PRICE`].
    pub fn new(universe: Vec<(ExchangeType, String)>) -> Self {
        Self {
            books: universe
                .into_iter()
                .map(|(exchange, token)| Book::new(exchange, token))
                .collect(),
            sequence_number: 0,
        }
    }

    /// Number of instruments in the universe.
    pub fn len(&self) -> usize {
        self.books.len()
    }

    /// Advances every instrument by one tick.
    pub fn next_round<R: Rng>(&mut self, rng: &mut R) -> Vec<Quote> {
        let timestamp = Utc::now().timestamp_millis();
        let mut quotes = Vec::with_capacity(self.books.len());
        for book in &mut self.books {
            self.sequence_number += 1;
            quotes.push(book.step(rng, self.sequence_number, timestamp));
        }
        quotes
    }

    /// Runs the generator on its own thread, one round every `interval`.
    ///
    /// The thread exits once the returned sender is dropped and no stream is left.
    pub fn start(mut self, interval: Duration) -> Sender<Sender<Quote>> {
        let (subscribe_tx, subscribe_rx) = unbounded::<Sender<Quote>>();

        thread::spawn(move || {
            let mut clients: Vec<Sender<Quote>> = Vec::new();
            let mut rng = rand::rng();
            info!(
                "Tick generator started for {} instruments (Thread ID: {:?})",
                self.len(),
                thread::current().id()
            );

            loop {
                loop {
                    match subscribe_rx.try_recv() {
                        Ok(client_tx) => {
                            clients.push(client_tx);
                            debug!("Generator: new stream added. Total streams: {}", clients.len());
                        }
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) if clients.is_empty() => {
                            info!("Tick generator stopping");
                            return;
                        }
                        Err(TryRecvError::Disconnected) => break,
                    }
                }

                for quote in self.next_round(&mut rng) {
                    clients.retain(|client_tx| client_tx.send(quote.clone()).is_ok());
                }

                thread::sleep(interval);
            }
        });
        subscribe_tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use stream_common::decoder;

    fn generator() -> QuoteGenerator {
        QuoteGenerator::new(vec![
            (ExchangeType::Nse, "2885".to_string()),
            (ExchangeType::Nfo, "35003".to_string()),
        ])
    }

    fn on_tick(price: f64) -> bool {
        let ticks = price / TICK_SIZE;
        (ticks - ticks.round()).abs() < 1e-6
    }

    #[test]
    fn rounds_cover_every_instrument_in_sequence() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut generator = generator();
        let first = generator.next_round(&mut rng);
        let second = generator.next_round(&mut rng);

        let tokens: Vec<&str> = first.iter().map(|q| q.token.as_str()).collect();
        assert_eq!(tokens, vec!["2885", "35003"]);
        assert_eq!(first[1].exchange_type, 2);
        let sequence: Vec<i64> = first.iter().chain(&second).map(|q| q.sequence_number).collect();
        assert_eq!(sequence, vec![1, 2, 3, 4]);
    }

    #[test]
    fn books_stay_consistent_over_many_rounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut generator = generator();
        let mut last_volume = 0;

        for _ in 0..500 {
            let quote = generator.next_round(&mut rng).remove(0);
            assert!(quote.last_traded_price > 0.0);
            assert!(on_tick(quote.last_traded_price));
            assert!(quote.low_price <= quote.last_traded_price);
            assert!(quote.last_traded_price <= quote.high_price);
            assert!(quote.volume_traded > last_volume);
            last_volume = quote.volume_traded;

            let best_bid = quote.best_five.buys[0].price;
            let best_ask = quote.best_five.sells[0].price;
            assert!(best_bid < quote.last_traded_price || best_bid == TICK_SIZE);
            assert!(best_ask > quote.last_traded_price);
        }
    }

    #[test]
    fn ticks_encode_at_every_mode() {
        let mut rng = StdRng::seed_from_u64(1);
        let quote = generator().next_round(&mut rng).remove(0);

        for mode in [
            SubscriptionMode::Ltp,
            SubscriptionMode::Quote,
            SubscriptionMode::SnapQuote,
        ] {
            let mut tick = quote.clone();
            tick.subscription_mode = mode.code();
            let frame = decoder::encode(&tick).unwrap();
            assert_eq!(frame.len(), mode.frame_len());

            let decoded = decoder::decode(&frame).unwrap();
            assert_eq!(decoded.token, "2885");
            assert_eq!(decoded.sequence_number, 1);
            assert_eq!(decoded.last_traded_price, quote.last_traded_price);
        }
    }

    #[test]
    fn started_generator_broadcasts_to_streams() {
        let subscribe_tx = generator().start(Duration::from_millis(5));
        let (client_tx, client_rx) = unbounded();
        subscribe_tx.send(client_tx).unwrap();

        let quote = client_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(quote.sequence_number >= 1);
        assert_eq!(quote.mode(), Some(SubscriptionMode::SnapQuote));
    }
}
