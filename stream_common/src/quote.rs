//! Decoded tick model.
//!
//! A `Quote` is populated progressively by feed mode: an LTP frame fills only the
//! header and price fields, a Quote frame adds daily aggregates, and a SnapQuote frame
//! adds open interest, five-level depth and circuit limits. Fields a mode does not carry
//! keep their zero value.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Feed mode requested in a subscription and tagged on every binary frame.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
)]
#[clap(rename_all = "kebab-case")]
#[strum(ascii_case_insensitive, serialize_all = "kebab-case")]
pub enum SubscriptionMode {
    /// Last traded price only.
    Ltp,
    /// LTP plus OHLC, volume and total buy/sell quantity.
    Quote,
    /// Quote plus open interest, market depth and circuit limits.
    SnapQuote,
}

impl SubscriptionMode {
    /// Wire code of the mode.
    pub fn code(self) -> i8 {
        match self {
            SubscriptionMode::Ltp => 1,
            SubscriptionMode::Quote => 2,
            SubscriptionMode::SnapQuote => 3,
        }
    }

    /// Mode for a wire code, if known.
    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            1 => Some(SubscriptionMode::Ltp),
            2 => Some(SubscriptionMode::Quote),
            3 => Some(SubscriptionMode::SnapQuote),
            _ => None,
        }
    }

    /// Minimum binary frame length for this mode.
    pub fn frame_len(self) -> usize {
        match self {
            SubscriptionMode::Ltp => 67,
            SubscriptionMode::Quote => 123,
            SubscriptionMode::SnapQuote => 379,
        }
    }
}

/// One level of market depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BidAskPacket {
    /// Side flag: 1 for buy, 0 for sell.
    pub flag: i16,
    /// Price level.
    pub price: f64,
    /// Aggregated quantity at the level.
    pub quantity: i64,
    /// Number of orders at the level.
    pub orders: i16,
}

/// Five levels of depth on each side. Unpopulated slots are zeroed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BestFiveData {
    /// Buy side, best first.
    pub buys: [BidAskPacket; 5],
    /// Sell side, best first.
    pub sells: [BidAskPacket; 5],
}

/// Decoded market tick for a single instrument token.
///
/// Field names follow the feed's packet layout; only the non-obvious ones are documented.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Raw mode tag, see [`SubscriptionMode::code`].
    pub subscription_mode: i8,
    /// Raw exchange code.
    pub exchange_type: i8,
    /// Instrument token with padding removed.
    pub token: String,
    pub sequence_number: i64,
    /// Exchange timestamp in epoch milliseconds.
    pub exchange_timestamp: i64,
    pub last_traded_price: f64,
    pub last_traded_quantity: i64,
    pub average_traded_price: f64,
    pub volume_traded: i64,
    pub total_buy_quantity: i64,
    pub total_sell_quantity: i64,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
    pub last_traded_timestamp: i64,
    pub open_interest: i64,
    pub best_five: BestFiveData,
    pub upper_circuit_limit: f64,
    pub lower_circuit_limit: f64,
    pub year_high_price: f64,
    pub year_low_price: f64,
}

impl Quote {
    /// Mode tag of this quote, if it is a known one.
    pub fn mode(&self) -> Option<SubscriptionMode> {
        SubscriptionMode::from_code(self.subscription_mode)
    }

    /// Encode the quote to JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, crate::StreamError> {
        let json = serde_json::to_vec(self)?;
        Ok(json)
    }
}
