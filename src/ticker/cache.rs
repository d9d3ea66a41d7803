// On-disk ticker cache with read-through/write-through semantics.
//
// The JSON file maps normalized company names and CIKs to tickers. It is
// loaded once when the cache is constructed and rewritten after every
// insert, so a crash mid-batch loses nothing already resolved.
//
// Interior mutability (std Mutex) lets concurrent document tasks share one
// cache via Arc<TickerCache>. The lock is never held across an await.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use anyhow::{Context, Result};
use regex_lite::Regex;
use tracing::warn;

/// Stored for lookups that were answered but yielded no ticker.
pub const UNKNOWN_TICKER: &str = "UNKNOWN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(String),
    /// Previously looked up, no ticker exists.
    Negative,
    Miss,
}

pub struct TickerCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl TickerCache {
    /// Load the cache file. A missing file starts empty; an unreadable or
    /// corrupt file also starts empty, with a warning.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ticker cache is corrupt, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read ticker cache, starting empty");
                BTreeMap::new()
            }
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up by company name first, then by CIK.
    pub fn get(&self, company_name: &str, cik: &str) -> CacheLookup {
        let Ok(entries) = self.entries.lock() else {
            return CacheLookup::Miss;
        };

        let name_key = normalize_company_name(company_name);
        let found = entries
            .get(&name_key)
            .filter(|_| !name_key.is_empty())
            .or_else(|| entries.get(cik.trim()).filter(|_| !cik.trim().is_empty()));

        match found {
            Some(ticker) if ticker == UNKNOWN_TICKER || ticker.is_empty() => CacheLookup::Negative,
            Some(ticker) => CacheLookup::Hit(ticker.clone()),
            None => CacheLookup::Miss,
        }
    }

    /// Record a ticker (or `UNKNOWN_TICKER`) under both keys and flush.
    pub fn insert(&self, company_name: &str, cik: &str, ticker: &str) -> Result<()> {
        let snapshot = {
            let mut entries = self
                .entries
                .lock()
                .map_err(|_| anyhow::anyhow!("Ticker cache lock poisoned"))?;
            let name_key = normalize_company_name(company_name);
            if !name_key.is_empty() {
                entries.insert(name_key, ticker.to_string());
            }
            if !cik.trim().is_empty() {
                entries.insert(cik.trim().to_string(), ticker.to_string());
            }
            serde_json::to_string_pretty(&*entries)?
        };
        self.flush(&snapshot)
    }

    fn flush(&self, json: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory for ticker cache: {}", self.path.display())
                })?;
            }
        }
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write ticker cache {}", self.path.display()))
    }
}

/// Lowercase, punctuation to spaces, whitespace collapsed.
pub fn normalize_company_name(name: &str) -> String {
    static PUNCTUATION: OnceLock<Regex> = OnceLock::new();
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();

    let punctuation = PUNCTUATION.get_or_init(|| Regex::new(r"[^\w\s]").expect("static pattern"));
    let whitespace = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static pattern"));

    let lower = name.trim().to_lowercase();
    let spaced = punctuation.replace_all(&lower, " ");
    whitespace.replace_all(&spaced, " ").trim().to_string()
}
