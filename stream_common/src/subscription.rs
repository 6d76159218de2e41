//! Subscription requests and their JSON wire form.
//!
//! A `SubscriptionRequest` names an action, a feed mode and, per exchange, the set of
//! instrument tokens to (un)subscribe. It is serialized into a single text frame:
//!
//! ```json
//! {"action":1,"params":{"mode":3,"tokenList":[{"exchangeType":1,"tokens":["2885"]}]}}
//! ```
//!
//! The wire structs are built field by field from the request, so the JSON shape does
//! not depend on how the request stores its tokens.
use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::StreamError;
use crate::quote::SubscriptionMode;

/// Whether a request adds or removes tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Action {
    /// Stop streaming the listed tokens.
    Unsubscribe,
    /// Start streaming the listed tokens.
    Subscribe,
}

impl Action {
    /// Wire code of the action.
    pub fn code(self) -> i32 {
        match self {
            Action::Unsubscribe => 0,
            Action::Subscribe => 1,
        }
    }

    /// Action for a wire code, if known.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Action::Unsubscribe),
            1 => Some(Action::Subscribe),
            _ => None,
        }
    }
}

/// Exchange segments the feed streams.
#[allow(missing_docs)]
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
#[clap(rename_all = "UPPER")]
#[strum(ascii_case_insensitive, serialize_all = "UPPERCASE")]
pub enum ExchangeType {
    Nse,
    Nfo,
    Bse,
    BseFo,
    McxFo,
    NcxFo,
    CdeFo,
}

impl ExchangeType {
    /// Wire code of the exchange.
    pub fn code(self) -> i32 {
        match self {
            ExchangeType::Nse => 1,
            ExchangeType::Nfo => 2,
            ExchangeType::Bse => 3,
            ExchangeType::BseFo => 4,
            ExchangeType::McxFo => 5,
            ExchangeType::NcxFo => 7,
            ExchangeType::CdeFo => 13,
        }
    }

    /// Exchange for a wire code, if known.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(ExchangeType::Nse),
            2 => Some(ExchangeType::Nfo),
            3 => Some(ExchangeType::Bse),
            4 => Some(ExchangeType::BseFo),
            5 => Some(ExchangeType::McxFo),
            7 => Some(ExchangeType::NcxFo),
            13 => Some(ExchangeType::CdeFo),
            _ => None,
        }
    }
}

/// One subscribe/unsubscribe request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    action: Action,
    mode: SubscriptionMode,
    tokens: BTreeMap<ExchangeType, BTreeSet<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireRequest {
    action: i32,
    params: WireParams,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireParams {
    mode: i32,
    #[serde(rename = "tokenList")]
    token_list: Vec<WireTokenList>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireTokenList {
    #[serde(rename = "exchangeType")]
    exchange_type: i32,
    tokens: Vec<String>,
}

impl SubscriptionRequest {
    /// Creates an empty request.
    pub fn new(action: Action, mode: SubscriptionMode) -> Self {
        Self {
            action,
            mode,
            tokens: BTreeMap::new(),
        }
    }

    /// Creates an empty `Subscribe` request for `mode`.
    pub fn subscribe(mode: SubscriptionMode) -> Self {
        Self::new(Action::Subscribe, mode)
    }

    /// Adds tokens for an exchange, merging with any already present.
    pub fn with_tokens<I, S>(mut self, exchange: ExchangeType, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_tokens(exchange, tokens);
        self
    }

    /// Adds tokens for an exchange in place.
    pub fn add_tokens<I, S>(&mut self, exchange: ExchangeType, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens
            .entry(exchange)
            .or_default()
            .extend(tokens.into_iter().map(Into::into));
    }

    /// Requested action.
    pub fn action(&self) -> Action {
        self.action
    }

    /// Requested feed mode.
    pub fn mode(&self) -> SubscriptionMode {
        self.mode
    }

    /// Tokens per exchange.
    pub fn tokens(&self) -> &BTreeMap<ExchangeType, BTreeSet<String>> {
        &self.tokens
    }

    /// Whether `token` on `exchange` is part of the request.
    pub fn contains(&self, exchange: ExchangeType, token: &str) -> bool {
        self.tokens
            .get(&exchange)
            .is_some_and(|set| set.contains(token))
    }

    /// Total number of tokens across exchanges.
    pub fn len(&self) -> usize {
        self.tokens.values().map(BTreeSet::len).sum()
    }

    /// True when no token is listed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializes the request into its JSON text frame.
    pub fn to_json(&self) -> Result<String, StreamError> {
        Ok(serde_json::to_string(&self.to_wire())?)
    }

    /// Parses a JSON text frame back into a request.
    pub fn from_json(text: &str) -> Result<Self, StreamError> {
        let wire: WireRequest = serde_json::from_str(text)?;
        let action = Action::from_code(wire.action)
            .ok_or_else(|| StreamError::Format(format!("unknown action {}", wire.action)))?;
        let mode = i8::try_from(wire.params.mode)
            .ok()
            .and_then(SubscriptionMode::from_code)
            .ok_or_else(|| StreamError::Format(format!("unknown mode {}", wire.params.mode)))?;

        let mut request = Self::new(action, mode);
        for entry in wire.params.token_list {
            let exchange = ExchangeType::from_code(entry.exchange_type).ok_or_else(|| {
                StreamError::Format(format!("unknown exchange type {}", entry.exchange_type))
            })?;
            request.add_tokens(exchange, entry.tokens);
        }
        Ok(request)
    }

    fn to_wire(&self) -> WireRequest {
        let token_list = self
            .tokens
            .iter()
            .map(|(exchange, tokens)| WireTokenList {
                exchange_type: exchange.code(),
                tokens: tokens.iter().cloned().collect(),
            })
            .collect();
        WireRequest {
            action: self.action.code(),
            params: WireParams {
                mode: i32::from(self.mode.code()),
                token_list,
            },
        }
    }
}

/// Trait providing file parsing for token lists.
pub trait TokenListParser: Sized {
    /// Parses a token list from a buffered reader.
    ///
    /// Each non-empty line has the form `EXCHANGE:TOKEN[,TOKEN...]` (a space may replace
    /// the colon). Lines starting with `#` are comments. Returns an error if any line
    /// names an unknown exchange or lists no token.
    fn parse_from_file<R: BufRead>(reader: R, mode: SubscriptionMode) -> Result<Self, StreamError>;
}

impl TokenListParser for SubscriptionRequest {
    fn parse_from_file<R: BufRead>(reader: R, mode: SubscriptionMode) -> Result<Self, StreamError> {
        let mut request = SubscriptionRequest::subscribe(mode);

        for (number, line_result) in reader.lines().enumerate() {
            let line = line_result.map_err(StreamError::Io)?;
            let trimmed_line = line.trim();
            if trimmed_line.is_empty() || trimmed_line.starts_with('#') {
                continue;
            }

            let Some((exchange, tokens)) = trimmed_line.split_once([':', ' ']) else {
                return Err(StreamError::ParseTokensFile(format!(
                    "line {}: expected EXCHANGE:TOKEN, got `{}`",
                    number + 1,
                    trimmed_line
                )));
            };
            let exchange = exchange
                .trim()
                .parse::<ExchangeType>()
                .map_err(|e| StreamError::ParseTokensFile(format!("line {}: {}", number + 1, e)))?;
            let tokens: Vec<&str> = tokens
                .split([',', ' '])
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect();
            if tokens.is_empty() {
                return Err(StreamError::ParseTokensFile(format!(
                    "line {}: no tokens for {}",
                    number + 1,
                    exchange
                )));
            }
            request.add_tokens(exchange, tokens);
        }
        Ok(request)
    }
}
