//! Instrument reference data.
//!
//! The scrip master maps (symbol, exchange segment) to token, lot size, tick size and
//! expiry details. `InstrumentStore` keeps one copy on disk and refreshes it at most
//! once per daily window: a file is fresh when it was written after the most recent
//! cutoff (08:30 local by default).
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime, TimeZone};
use log::{debug, info};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use stream_common::{Result, StreamError};

/// Public scrip master download.
pub const SCRIP_MASTER_URL: &str =
    "https://margincalculator.angelbroking.com/OpenAPI_File/files/OpenAPIScripMaster.json";

/// Instrument record as published in the scrip master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Token used in subscriptions.
    pub token: String,
    /// Trading symbol, e.g. `SBIN-EQ`.
    pub symbol: String,
    /// Underlying name.
    pub name: String,
    /// Expiry date for derivatives, empty otherwise.
    pub expiry: String,
    /// Strike price for options.
    pub strike: String,
    /// Contract lot size.
    #[serde(rename = "lotsize")]
    pub lot_size: String,
    /// Instrument type, e.g. `OPTIDX`.
    #[serde(rename = "instrumenttype")]
    pub instrument_type: String,
    /// Exchange segment, e.g. `NSE`.
    pub exch_seg: String,
    /// Minimum price increment.
    pub tick_size: String,
}

/// Where fresh instrument lists come from.
pub trait InstrumentSource {
    /// Downloads the full instrument list.
    fn fetch(&self) -> Result<Vec<Instrument>>;
}

/// Downloads the scrip master over HTTP.
pub struct HttpInstrumentSource {
    http: Client,
    url: String,
}

impl HttpInstrumentSource {
    /// Source for [`SCRIP_MASTER_URL`].
    pub fn new() -> Self {
        Self::with_url(SCRIP_MASTER_URL)
    }

    /// Source for another URL.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
        }
    }
}

impl Default for HttpInstrumentSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrumentSource for HttpInstrumentSource {
    fn fetch(&self) -> Result<Vec<Instrument>> {
        info!("Downloading instruments from {}", self.url);
        self.http
            .get(&self.url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| StreamError::Http(e.to_string()))
    }
}

/// Local wall-clock time.
pub trait WallClock {
    /// Current local time.
    fn now(&self) -> DateTime<Local>;
}

/// `WallClock` backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Default daily refresh cutoff.
pub fn default_cutoff() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 30, 0).unwrap_or_default()
}

/// Most recent occurrence of `cutoff` at or before `now`.
pub fn last_cutoff(now: DateTime<Local>, cutoff: NaiveTime) -> Option<DateTime<Local>> {
    let today = now.date_naive().and_time(cutoff);
    let candidate = Local.from_local_datetime(&today).earliest()?;
    if candidate <= now {
        Some(candidate)
    } else {
        Local
            .from_local_datetime(&(today - ChronoDuration::days(1)))
            .earliest()
    }
}

/// Whether a file written at `modified` is still valid at `now`.
pub fn is_fresh(modified: DateTime<Local>, now: DateTime<Local>, cutoff: NaiveTime) -> bool {
    match last_cutoff(now, cutoff) {
        Some(boundary) => modified >= boundary,
        None => false,
    }
}

/// File-backed instrument cache with daily refresh.
pub struct InstrumentStore<S, K = SystemWallClock> {
    path: PathBuf,
    source: S,
    clock: K,
    cutoff: NaiveTime,
    instruments: Vec<Instrument>,
}

impl<S: InstrumentSource> InstrumentStore<S, SystemWallClock> {
    /// Store at `path` using the system clock.
    pub fn new(path: impl Into<PathBuf>, source: S) -> Self {
        Self::with_clock(path, source, SystemWallClock)
    }
}

impl<S: InstrumentSource, K: WallClock> InstrumentStore<S, K> {
    /// Store at `path` reading time from `clock`.
    pub fn with_clock(path: impl Into<PathBuf>, source: S, clock: K) -> Self {
        Self {
            path: path.into(),
            source,
            clock,
            cutoff: default_cutoff(),
            instruments: Vec::new(),
        }
    }

    /// Overrides the daily cutoff.
    pub fn with_cutoff(mut self, cutoff: NaiveTime) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Cache file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Instruments currently in memory.
    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    /// True when the cache file is missing or older than the last cutoff.
    pub fn is_stale(&self) -> bool {
        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => DateTime::<Local>::from(modified),
            Err(_) => return true,
        };
        !is_fresh(modified, self.clock.now(), self.cutoff)
    }

    /// Downloads and persists when stale, otherwise loads the file if not yet loaded.
    ///
    /// Returns `true` when a download happened.
    pub fn refresh(&mut self) -> Result<bool> {
        if !self.is_stale() {
            debug!("Instrument file {} is fresh", self.path.display());
            if self.instruments.is_empty() {
                self.load()?;
            }
            return Ok(false);
        }

        let instruments = self.source.fetch()?;
        let json = serde_json::to_vec_pretty(&instruments)?;
        fs::write(&self.path, json)?;
        info!(
            "Saved {} instruments to {}",
            instruments.len(),
            self.path.display()
        );
        self.instruments = instruments;
        Ok(true)
    }

    /// Reloads instruments from the cache file.
    pub fn load(&mut self) -> Result<()> {
        let bytes = fs::read(&self.path)?;
        self.instruments = serde_json::from_slice(&bytes)?;
        Ok(())
    }

    /// Finds an instrument by trading symbol and exchange segment.
    pub fn find(&self, symbol: &str, exchange: &str) -> Result<&Instrument> {
        self.instruments
            .iter()
            .find(|i| i.symbol == symbol && i.exch_seg == exchange)
            .ok_or_else(|| StreamError::InstrumentNotFound {
                symbol: symbol.to_string(),
                exchange: exchange.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Local> {
        let naive = chrono::NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap();
        Local.from_local_datetime(&naive).earliest().unwrap()
    }

    fn sbin() -> Instrument {
        Instrument {
            token: "3045".to_string(),
            symbol: "SBIN-EQ".to_string(),
            name: "SBIN".to_string(),
            expiry: String::new(),
            strike: "-1.000000".to_string(),
            lot_size: "1".to_string(),
            instrument_type: String::new(),
            exch_seg: "NSE".to_string(),
            tick_size: "5.000000".to_string(),
        }
    }

    struct FixedSource {
        instruments: Vec<Instrument>,
        calls: Cell<usize>,
    }

    impl InstrumentSource for FixedSource {
        fn fetch(&self) -> Result<Vec<Instrument>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.instruments.clone())
        }
    }

    struct FixedClock(DateTime<Local>);

    impl WallClock for FixedClock {
        fn now(&self) -> DateTime<Local> {
            self.0
        }
    }

    #[test]
    fn freshness_follows_the_daily_cutoff() {
        let cutoff = default_cutoff();
        let now = local(2024, 3, 5, 12, 0);
        assert!(is_fresh(local(2024, 3, 5, 9, 0), now, cutoff));
        assert!(!is_fresh(local(2024, 3, 5, 8, 0), now, cutoff));
        assert!(!is_fresh(local(2024, 3, 4, 12, 0), now, cutoff));

        // Before today's cutoff the window started yesterday morning.
        let early = local(2024, 3, 5, 7, 0);
        assert!(is_fresh(local(2024, 3, 4, 9, 0), early, cutoff));
        assert!(!is_fresh(local(2024, 3, 4, 8, 0), early, cutoff));
    }

    #[test]
    fn parses_scrip_master_names() {
        let json = r#"[{"token":"3045","symbol":"SBIN-EQ","name":"SBIN","expiry":"","strike":"-1.000000","lotsize":"1","instrumenttype":"","exch_seg":"NSE","tick_size":"5.000000"}]"#;
        let parsed: Vec<Instrument> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, vec![sbin()]);
    }

    #[test]
    fn missing_file_downloads_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instruments.json");
        let source = FixedSource {
            instruments: vec![sbin()],
            calls: Cell::new(0),
        };
        let mut store = InstrumentStore::with_clock(&path, source, FixedClock(Local::now()));

        assert!(store.is_stale());
        assert!(store.refresh().unwrap());
        assert!(path.exists());
        assert_eq!(store.find("SBIN-EQ", "NSE").unwrap().token, "3045");
        assert!(matches!(
            store.find("SBIN-EQ", "BSE"),
            Err(StreamError::InstrumentNotFound { .. })
        ));

        // Written just now, so the same clock sees a fresh file.
        assert!(!store.refresh().unwrap());
        assert_eq!(store.source.calls.get(), 1);
    }

    #[test]
    fn fresh_file_is_loaded_without_download() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instruments.json");
        fs::write(&path, serde_json::to_vec(&vec![sbin()]).unwrap()).unwrap();
        let source = FixedSource {
            instruments: Vec::new(),
            calls: Cell::new(0),
        };
        let mut store = InstrumentStore::with_clock(&path, source, FixedClock(Local::now()));

        assert!(!store.refresh().unwrap());
        assert_eq!(store.source.calls.get(), 0);
        assert_eq!(store.instruments().len(), 1);
    }

    #[test]
    fn old_file_is_stale_a_day_later() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instruments.json");
        fs::write(&path, b"[]").unwrap();
        let tomorrow = Local::now() + ChronoDuration::days(2);
        let source = FixedSource {
            instruments: vec![sbin()],
            calls: Cell::new(0),
        };
        let mut store = InstrumentStore::with_clock(&path, source, FixedClock(tomorrow));

        assert!(store.is_stale());
        assert!(store.refresh().unwrap());
        assert_eq!(store.instruments(), &[sbin()]);
    }
}
