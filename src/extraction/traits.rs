// Extraction service trait — the swap-ready seam for the language service.
//
// The default implementation talks to an OpenAI-compatible chat completions
// endpoint in JSON-object mode. Tests substitute scripted fakes.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db::models::{null_as_default, Segment};

/// What one extraction call yields for one piece of filing text.
///
/// `structured_data` is schema-free: each dimension may arrive as a list,
/// an object, or not at all. The storage layer normalizes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub structured_data: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text_segments: Vec<Segment>,
}

impl ExtractionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.text_segments.is_empty()
    }
}

/// Trait for a service that answers a prompt with a JSON object.
///
/// Implementations return the raw reply text. Parsing and validation happen
/// in the caller so that malformed replies can be retried separately from
/// transport failures.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn complete_json(&self, prompt: &str) -> Result<String>;
}
