//! Token list file that the client re-reads when it changes on disk.
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use stream_common::subscription::TokenListParser;
use stream_common::{Result, StreamError, SubscriptionMode, SubscriptionRequest};

/// Token file plus the modification time of the last successful read.
pub struct TokenFile {
    path: PathBuf,
    mode: SubscriptionMode,
    modified: Option<SystemTime>,
}

impl TokenFile {
    pub fn new(path: PathBuf, mode: SubscriptionMode) -> Self {
        Self {
            path,
            mode,
            modified: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses the file. An empty token list is an error.
    pub fn load(&mut self) -> Result<SubscriptionRequest> {
        let modified = fs::metadata(&self.path)?.modified().ok();
        let file = File::open(&self.path)?;
        let request = SubscriptionRequest::parse_from_file(BufReader::new(file), self.mode)?;
        if request.is_empty() {
            return Err(StreamError::ParseTokensFile(format!(
                "no tokens in {}",
                self.path.display()
            )));
        }
        self.modified = modified;
        Ok(request)
    }

    /// Re-parses the file when its modification time moved since the last read.
    pub fn reload_if_changed(&mut self) -> Result<Option<SubscriptionRequest>> {
        let modified = fs::metadata(&self.path)?.modified().ok();
        if modified.is_some() && modified == self.modified {
            return Ok(None);
        }
        self.load().map(Some)
    }
}
