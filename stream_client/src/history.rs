//! Historical candle retrieval.
//!
//! A single POST against the REST envelope endpoint. The response's `data` is a list of
//! `[timestamp, open, high, low, close, volume]` rows which are converted, column by
//! column, into a time-ordered `Candles` series.
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use strum_macros::{Display, EnumString};
use stream_common::{ExchangeType, Result, StreamError};

use crate::config::Credentials;

/// Default REST host.
pub const API_BASE_URL: &str = "https://apiconnect.angelone.in";
/// Candle endpoint path.
pub const CANDLE_DATA_PATH: &str = "/rest/secure/angelbroking/historical/v1/getCandleData";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Candle width accepted by the endpoint.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Interval {
    OneMinute,
    ThreeMinute,
    FiveMinute,
    TenMinute,
    FifteenMinute,
    ThirtyMinute,
    OneHour,
    OneDay,
}

/// Parameters of one candle request.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleParams {
    /// Exchange segment.
    pub exchange: ExchangeType,
    /// Instrument token.
    pub symbol_token: String,
    /// Candle width.
    pub interval: Interval,
    /// Inclusive start, exchange local time.
    pub from: NaiveDateTime,
    /// Inclusive end, exchange local time.
    pub to: NaiveDateTime,
}

impl CandleParams {
    /// Request body, encoded field by field.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("exchange".to_string(), json!(self.exchange.to_string()));
        body.insert("symboltoken".to_string(), json!(self.symbol_token));
        body.insert("interval".to_string(), json!(self.interval.to_string()));
        body.insert(
            "fromdate".to_string(),
            json!(self.from.format(DATE_FORMAT).to_string()),
        );
        body.insert(
            "todate".to_string(),
            json!(self.to.format(DATE_FORMAT).to_string()),
        );
        Value::Object(body)
    }
}

/// One OHLCV bar.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub time: DateTime<FixedOffset>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Numeric column of a candle series.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl CandleField {
    fn of(self, candle: &Candle) -> f64 {
        match self {
            CandleField::Open => candle.open,
            CandleField::High => candle.high,
            CandleField::Low => candle.low,
            CandleField::Close => candle.close,
            CandleField::Volume => candle.volume,
        }
    }
}

/// Time-ordered candle series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candles(Vec<Candle>);

impl Candles {
    /// Bars in time order.
    pub fn as_slice(&self) -> &[Candle] {
        &self.0
    }

    /// Number of bars.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no bars.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Extracts one numeric column.
    pub fn column(&self, field: CandleField) -> Vec<f64> {
        self.0.iter().map(|c| field.of(c)).collect()
    }

    /// Bar timestamps.
    pub fn times(&self) -> Vec<DateTime<FixedOffset>> {
        self.0.iter().map(|c| c.time).collect()
    }

    /// Open prices.
    pub fn opens(&self) -> Vec<f64> {
        self.column(CandleField::Open)
    }

    /// High prices.
    pub fn highs(&self) -> Vec<f64> {
        self.column(CandleField::High)
    }

    /// Low prices.
    pub fn lows(&self) -> Vec<f64> {
        self.column(CandleField::Low)
    }

    /// Close prices.
    pub fn closes(&self) -> Vec<f64> {
        self.column(CandleField::Close)
    }

    /// Volumes.
    pub fn volumes(&self) -> Vec<f64> {
        self.column(CandleField::Volume)
    }
}

/// Converts raw rows into a sorted series.
pub fn parse_candles(rows: &[Value]) -> Result<Candles> {
    let mut candles = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let cells = row
            .as_array()
            .filter(|cells| cells.len() >= 6)
            .ok_or_else(|| StreamError::Format(format!("row {}: expected 6 columns", i)))?;
        let time = cells[0]
            .as_str()
            .ok_or_else(|| StreamError::Format(format!("row {}: timestamp is not a string", i)))
            .and_then(|s| {
                DateTime::parse_from_rfc3339(s)
                    .map_err(|e| StreamError::Format(format!("row {}: {}", i, e)))
            })?;
        let number = |col: usize| {
            cells[col]
                .as_f64()
                .ok_or_else(|| StreamError::Format(format!("row {}: column {} is not numeric", i, col)))
        };
        candles.push(Candle {
            time,
            open: number(1)?,
            high: number(2)?,
            low: number(3)?,
            close: number(4)?,
            volume: number(5)?,
        });
    }
    candles.sort_by_key(|c| c.time);
    Ok(Candles(candles))
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: bool,
    #[serde(default)]
    message: String,
    #[serde(default, rename = "errorcode")]
    error_code: String,
    #[serde(default)]
    data: Option<Vec<Value>>,
}

/// Blocking REST client for candle data.
pub struct HistoryClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
}

impl HistoryClient {
    /// Creates a client against [`API_BASE_URL`].
    pub fn new(credentials: Credentials) -> Self {
        Self::with_base_url(API_BASE_URL, credentials)
    }

    /// Creates a client against another host.
    pub fn with_base_url(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            credentials,
        }
    }

    /// Fetches candles for `params`.
    pub fn candles(&self, params: &CandleParams) -> Result<Candles> {
        let url = format!("{}{}", self.base_url, CANDLE_DATA_PATH);
        debug!("Requesting candles {:?}", params);
        let envelope: Envelope = self
            .http
            .post(&url)
            .bearer_auth(&self.credentials.access_token)
            .header("X-PrivateKey", &self.credentials.api_key)
            .header("X-UserType", "USER")
            .header("X-SourceID", "WEB")
            .header("Accept", "application/json")
            .json(&params.to_body())
            .send()
            .and_then(|r| r.json())
            .map_err(|e| StreamError::Http(e.to_string()))?;
        envelope_rows(envelope).and_then(|rows| parse_candles(&rows))
    }
}

fn envelope_rows(envelope: Envelope) -> Result<Vec<Value>> {
    if !envelope.status {
        return Err(StreamError::Envelope {
            code: envelope.error_code,
            message: envelope.message,
        });
    }
    Ok(envelope.data.unwrap_or_default())
}
