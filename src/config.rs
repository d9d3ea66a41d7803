use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::extraction::chat::DEFAULT_BASE_URL;

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
pub struct Config {
    /// OpenAI-compatible API base URL (defaults to https://api.openai.com/v1)
    pub api_base_url: String,
    /// Bearer token for the extraction service
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub db_path: String,
    /// Maximum extraction calls in flight at once, across all documents
    pub max_concurrent: usize,
    /// Attempts per extraction call, including the first
    pub max_retries: u32,
    /// Estimated tokens above which a document is chunked before extraction
    pub max_tokens: usize,
    /// Segments per keyword-mining request
    pub keyword_batch_size: usize,
    /// Density correction constant k
    pub density_k: f64,
    /// On-disk ticker resolution cache
    pub ticker_cache_path: String,
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default except the API key, which is only required
    /// by commands that call the extraction service.
    pub fn load() -> Result<Self> {
        Ok(Self {
            api_base_url: env::var("POSTURE_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            api_key: env::var("POSTURE_API_KEY").unwrap_or_default(),
            model: env::var("POSTURE_MODEL").unwrap_or_else(|_| "gpt-4.1-mini".to_string()),
            temperature: parse_var("POSTURE_TEMPERATURE", 0.3)?,
            db_path: env::var("POSTURE_DB_PATH").unwrap_or_else(|_| "./posture.db".to_string()),
            max_concurrent: parse_var("POSTURE_MAX_CONCURRENT", 8usize)?.max(1),
            max_retries: parse_var("POSTURE_MAX_RETRIES", 3u32)?.max(1),
            max_tokens: parse_var("POSTURE_MAX_TOKENS", 100_000usize)?,
            keyword_batch_size: parse_var("POSTURE_KEYWORD_BATCH_SIZE", 50usize)?.max(1),
            density_k: parse_var("POSTURE_DENSITY_K", 5.0)?,
            ticker_cache_path: env::var("POSTURE_TICKER_CACHE")
                .unwrap_or_else(|_| "./ticker_cache.json".to_string()),
            request_timeout: Duration::from_secs(parse_var("POSTURE_REQUEST_TIMEOUT_SECS", 600u64)?),
        })
    }

    /// Check that the extraction service is configured.
    /// Call this before any operation that calls the language service.
    pub fn require_api_key(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            anyhow::bail!(
                "POSTURE_API_KEY not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }

    /// Check that the density constant is usable.
    pub fn require_scoring(&self) -> Result<()> {
        if !self.density_k.is_finite() || self.density_k <= 0.0 {
            anyhow::bail!(
                "POSTURE_DENSITY_K must be a positive number (got {}).",
                self.density_k
            );
        }
        Ok(())
    }
}

/// Read and parse an env var, falling back to `default` when unset.
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {name}: {raw:?}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_default_when_unset() {
        let value: u32 = parse_var("POSTURE_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_require_api_key_rejects_blank() {
        let mut config = Config::load().unwrap();
        config.api_key = "  ".to_string();
        let err = config.require_api_key().unwrap_err();
        assert!(err.to_string().contains("POSTURE_API_KEY"));
        config.api_key = "sk-test".to_string();
        assert!(config.require_api_key().is_ok());
    }

    #[test]
    fn test_require_scoring_rejects_non_positive_k() {
        let mut config = Config::load().unwrap();
        config.density_k = 0.0;
        assert!(config.require_scoring().is_err());
        config.density_k = 5.0;
        assert!(config.require_scoring().is_ok());
    }
}
