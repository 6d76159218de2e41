//! Binary tick frame codec.
//!
//! Frames are little-endian with fixed offsets. The mode byte at offset 0 decides how
//! long the frame must be: every length check happens up front in [`decode`], and the
//! reader returns `TooShort` instead of panicking should an offset still fall outside
//! the frame.
//!
//! Two fields are encoded oddly by the feed and are kept that way here: total buy/sell
//! quantity are IEEE-754 doubles stored in an integer slot, and the circuit limits and
//! yearly extremes occupy 8-byte windows of which only the first 4 bytes are read.
use crate::error::DecodeError;
use crate::quote::{BestFiveData, BidAskPacket, Quote, SubscriptionMode};

/// Width of the null-padded token field.
pub const TOKEN_LEN: usize = 25;

const TOKEN_OFFSET: usize = 2;
const DEPTH_OFFSET: usize = 147;
const DEPTH_ENTRY_LEN: usize = 20;
const DEPTH_ENTRIES: usize = 10;
const CIRCUIT_OFFSET: usize = 347;
const BUY_FLAG: i16 = 1;
const SELL_FLAG: i16 = 0;

/// Decodes one binary frame into a `Quote`.
pub fn decode(frame: &[u8]) -> Result<Quote, DecodeError> {
    let Some(&first) = frame.first() else {
        return Err(DecodeError::TooShort {
            mode: 0,
            expected: 1,
            actual: 0,
        });
    };
    let raw_mode = first as i8;
    let mode = SubscriptionMode::from_code(raw_mode).ok_or_else(|| DecodeError::MalformedField {
        field: "subscription_mode",
        reason: format!("unknown mode {}", raw_mode),
    })?;
    if frame.len() < mode.frame_len() {
        return Err(DecodeError::TooShort {
            mode: raw_mode,
            expected: mode.frame_len(),
            actual: frame.len(),
        });
    }

    let r = FrameReader::new(frame, raw_mode);
    let mut quote = Quote {
        subscription_mode: raw_mode,
        exchange_type: r.i8_at(1)?,
        token: r.token_at(TOKEN_OFFSET)?,
        sequence_number: r.i64_at(27)?,
        exchange_timestamp: r.i64_at(35)?,
        last_traded_price: price(r.i64_at(43)?),
        last_traded_quantity: r.i64_at(51)?,
        average_traded_price: price(r.i64_at(59)?),
        ..Quote::default()
    };

    if mode >= SubscriptionMode::Quote {
        quote.volume_traded = r.i64_at(67)?;
        quote.total_buy_quantity = r.f64_bits_at(75)? as i64;
        quote.total_sell_quantity = r.f64_bits_at(83)? as i64;
        quote.open_price = r.u64_at(91)? as f64 / 100.0;
        quote.high_price = price(r.i64_at(99)?);
        quote.low_price = price(r.i64_at(107)?);
        quote.close_price = r.u64_at(115)? as f64 / 100.0;
    }

    if mode == SubscriptionMode::SnapQuote {
        quote.last_traded_timestamp = r.i64_at(123)?;
        quote.open_interest = r.i64_at(131)?;
        quote.best_five = read_depth(&r)?;
        quote.upper_circuit_limit = r.u32_at(CIRCUIT_OFFSET)? as f64 / 100.0;
        quote.lower_circuit_limit = r.u32_at(CIRCUIT_OFFSET + 8)? as f64 / 100.0;
        quote.year_high_price = r.u32_at(CIRCUIT_OFFSET + 16)? as f64 / 100.0;
        quote.year_low_price = r.u32_at(CIRCUIT_OFFSET + 24)? as f64 / 100.0;
    }

    Ok(quote)
}

/// Encodes a `Quote` into the frame layout of its mode.
///
/// The inverse of [`decode`] for prices representable in hundredths. Buy levels go into
/// depth entries 0..5 and sell levels into 5..10 with the flags the decoder expects.
pub fn encode(quote: &Quote) -> Result<Vec<u8>, DecodeError> {
    let mode = quote.mode().ok_or_else(|| DecodeError::MalformedField {
        field: "subscription_mode",
        reason: format!("unknown mode {}", quote.subscription_mode),
    })?;
    let token = quote.token.as_bytes();
    if token.len() > TOKEN_LEN {
        return Err(DecodeError::MalformedField {
            field: "token",
            reason: format!("{} bytes exceeds {}", token.len(), TOKEN_LEN),
        });
    }

    let mut w = FrameWriter::new(mode.frame_len());
    w.put(0, &[quote.subscription_mode as u8]);
    w.put(1, &[quote.exchange_type as u8]);
    w.put(TOKEN_OFFSET, token);
    w.put(27, &quote.sequence_number.to_le_bytes());
    w.put(35, &quote.exchange_timestamp.to_le_bytes());
    w.put(43, &raw_price(quote.last_traded_price).to_le_bytes());
    w.put(51, &quote.last_traded_quantity.to_le_bytes());
    w.put(59, &raw_price(quote.average_traded_price).to_le_bytes());

    if mode >= SubscriptionMode::Quote {
        w.put(67, &quote.volume_traded.to_le_bytes());
        w.put(75, &(quote.total_buy_quantity as f64).to_bits().to_le_bytes());
        w.put(83, &(quote.total_sell_quantity as f64).to_bits().to_le_bytes());
        w.put(91, &(raw_price(quote.open_price) as u64).to_le_bytes());
        w.put(99, &raw_price(quote.high_price).to_le_bytes());
        w.put(107, &raw_price(quote.low_price).to_le_bytes());
        w.put(115, &(raw_price(quote.close_price) as u64).to_le_bytes());
    }

    if mode == SubscriptionMode::SnapQuote {
        w.put(123, &quote.last_traded_timestamp.to_le_bytes());
        w.put(131, &quote.open_interest.to_le_bytes());
        let buys = quote.best_five.buys.iter().map(|p| (p, BUY_FLAG));
        let sells = quote.best_five.sells.iter().map(|p| (p, SELL_FLAG));
        for (i, (packet, flag)) in buys.chain(sells).enumerate() {
            let start = DEPTH_OFFSET + i * DEPTH_ENTRY_LEN;
            // An all-zero buy level is written with the sell flag so it decodes as empty.
            let flag = if flag == BUY_FLAG && *packet == BidAskPacket::default() {
                SELL_FLAG
            } else {
                flag
            };
            w.put(start, &flag.to_le_bytes());
            w.put(start + 2, &packet.quantity.to_le_bytes());
            w.put(start + 10, &raw_price(packet.price).to_le_bytes());
            w.put(start + 18, &packet.orders.to_le_bytes());
        }
        let limits = [
            quote.upper_circuit_limit,
            quote.lower_circuit_limit,
            quote.year_high_price,
            quote.year_low_price,
        ];
        for (i, limit) in limits.into_iter().enumerate() {
            let raw = raw_price(limit) as u32;
            w.put(CIRCUIT_OFFSET + i * 8, &raw.to_le_bytes());
        }
    }

    Ok(w.into_inner())
}

fn read_depth(r: &FrameReader<'_>) -> Result<BestFiveData, DecodeError> {
    let mut depth = BestFiveData::default();
    let mut buys = 0;
    let mut sells = 0;
    for i in 0..DEPTH_ENTRIES {
        let start = DEPTH_OFFSET + i * DEPTH_ENTRY_LEN;
        let packet = BidAskPacket {
            flag: r.i16_at(start)?,
            quantity: r.i64_at(start + 2)?,
            price: price(r.i64_at(start + 10)?),
            orders: r.i16_at(start + 18)?,
        };
        if i < 5 && packet.flag == BUY_FLAG && buys < depth.buys.len() {
            depth.buys[buys] = packet;
            buys += 1;
        } else if i >= 5 && packet.flag == SELL_FLAG && sells < depth.sells.len() {
            depth.sells[sells] = packet;
            sells += 1;
        }
    }
    Ok(depth)
}

fn price(raw: i64) -> f64 {
    raw as f64 / 100.0
}

fn raw_price(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// Bounds-checked little-endian reads at fixed offsets.
struct FrameReader<'a> {
    buf: &'a [u8],
    mode: i8,
}

impl<'a> FrameReader<'a> {
    fn new(buf: &'a [u8], mode: i8) -> Self {
        Self { buf, mode }
    }

    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N], DecodeError> {
        self.buf
            .get(offset..offset + N)
            .and_then(|s| <[u8; N]>::try_from(s).ok())
            .ok_or(DecodeError::TooShort {
                mode: self.mode,
                expected: offset + N,
                actual: self.buf.len(),
            })
    }

    fn i8_at(&self, offset: usize) -> Result<i8, DecodeError> {
        Ok(i8::from_le_bytes(self.array(offset)?))
    }

    fn i16_at(&self, offset: usize) -> Result<i16, DecodeError> {
        Ok(i16::from_le_bytes(self.array(offset)?))
    }

    fn u32_at(&self, offset: usize) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.array(offset)?))
    }

    fn i64_at(&self, offset: usize) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.array(offset)?))
    }

    fn u64_at(&self, offset: usize) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.array(offset)?))
    }

    fn f64_bits_at(&self, offset: usize) -> Result<f64, DecodeError> {
        Ok(f64::from_bits(self.u64_at(offset)?))
    }

    fn token_at(&self, offset: usize) -> Result<String, DecodeError> {
        let raw: [u8; TOKEN_LEN] = self.array(offset)?;
        let end = raw.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        String::from_utf8(raw[..end].to_vec()).map_err(|e| DecodeError::MalformedField {
            field: "token",
            reason: e.to_string(),
        })
    }
}

struct FrameWriter {
    buf: Vec<u8>,
}

impl FrameWriter {
    fn new(len: usize) -> Self {
        Self { buf: vec![0; len] }
    }

    fn put(&mut self, offset: usize, bytes: &[u8]) {
        self.buf[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}
