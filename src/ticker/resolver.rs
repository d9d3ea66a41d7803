// Ticker resolution for filings whose names carry no ticker.
//
// Cache first (company name, then CIK), then one question to the language
// service. Answers are accepted only if they look like an exchange symbol.
// A definite "no ticker" is cached as UNKNOWN so the same company is not
// asked about again; transport failures are not cached.

use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use regex_lite::Regex;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::cache::{CacheLookup, TickerCache, UNKNOWN_TICKER};
use crate::extraction::prompts;
use crate::extraction::ExtractionService;

#[derive(Deserialize)]
struct TickerReply {
    #[serde(default)]
    ticker: Option<String>,
}

pub struct TickerResolver {
    cache: Arc<TickerCache>,
    service: Arc<dyn ExtractionService>,
    gate: Arc<Semaphore>,
}

impl TickerResolver {
    pub fn new(
        cache: Arc<TickerCache>,
        service: Arc<dyn ExtractionService>,
        gate: Arc<Semaphore>,
    ) -> Self {
        Self {
            cache,
            service,
            gate,
        }
    }

    /// Resolve a ticker, or None when none can be determined.
    pub async fn resolve(&self, company_name: &str, cik: &str) -> Option<String> {
        match self.cache.get(company_name, cik) {
            CacheLookup::Hit(ticker) => return Some(ticker),
            CacheLookup::Negative => return None,
            CacheLookup::Miss => {}
        }

        let answer = match self.ask(company_name, cik).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(company = company_name, cik, error = %format!("{e:#}"), "Ticker lookup failed");
                return None;
            }
        };

        let to_store = answer.as_deref().unwrap_or(UNKNOWN_TICKER);
        if let Err(e) = self.cache.insert(company_name, cik, to_store) {
            warn!(error = %format!("{e:#}"), "Failed to save ticker cache");
        }

        match &answer {
            Some(ticker) => info!(company = company_name, cik, ticker = %ticker, "Resolved ticker"),
            None => warn!(company = company_name, cik, "No ticker found"),
        }
        answer
    }

    /// The resolved ticker, or `UNKNOWN_{cik}` as a stable placeholder.
    pub async fn resolve_or_placeholder(&self, company_name: &str, cik: &str) -> String {
        match self.resolve(company_name, cik).await {
            Some(ticker) => ticker,
            None => unresolved_ticker(cik),
        }
    }

    async fn ask(&self, company_name: &str, cik: &str) -> Result<Option<String>> {
        let raw = {
            let _permit = self.gate.acquire().await.context("Extraction gate closed")?;
            self.service
                .complete_json(&prompts::ticker_lookup(company_name, cik))
                .await?
        };
        let reply: TickerReply =
            serde_json::from_str(&raw).context("Ticker reply was not the expected JSON")?;
        Ok(reply.ticker.as_deref().and_then(validate_ticker))
    }
}

/// Placeholder ticker for a filing that could not be resolved.
pub fn unresolved_ticker(cik: &str) -> String {
    format!("{UNKNOWN_TICKER}_{}", cik.trim())
}

/// Uppercase and accept only 1-5 ASCII letters.
pub fn validate_ticker(raw: &str) -> Option<String> {
    static SYMBOL: OnceLock<Regex> = OnceLock::new();
    let symbol = SYMBOL.get_or_init(|| Regex::new(r"^[A-Z]{1,5}$").expect("static pattern"));

    let ticker = raw.trim().to_uppercase();
    (ticker != UNKNOWN_TICKER && symbol.is_match(&ticker)).then_some(ticker)
}
