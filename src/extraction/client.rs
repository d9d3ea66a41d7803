// ExtractionClient — turns filing text into an ExtractionResult.
//
// Wraps an ExtractionService with three behaviors:
//   - oversized text is chunked up front and the chunk results merged
//   - every call is driven by a RetryController (empty replies, bad JSON,
//     transport errors, token-limit reroutes)
//   - a shared semaphore bounds in-flight service calls across every
//     document and chunk in the batch
//
// The gate is acquired per service call, never per document, so a document
// that fans out into chunks cannot starve itself of permits. Permits are
// released before any backoff sleep.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::aggregate;
use super::chunker;
use super::prompts;
use super::retry::{is_token_limit_error, AttemptOutcome, RetryController, RetryPolicy, RetryState};
use super::traits::{ExtractionResult, ExtractionService};

/// Result of the single-call procedure on one piece of text.
enum SingleOutcome {
    Done(ExtractionResult),
    Reroute,
}

pub struct ExtractionClient {
    service: Arc<dyn ExtractionService>,
    gate: Arc<Semaphore>,
    policy: RetryPolicy,
    max_tokens: usize,
}

impl ExtractionClient {
    pub fn new(
        service: Arc<dyn ExtractionService>,
        gate: Arc<Semaphore>,
        policy: RetryPolicy,
        max_tokens: usize,
    ) -> Self {
        Self {
            service,
            gate,
            policy,
            max_tokens: max_tokens.max(1),
        }
    }

    /// Extract structured data and classified segments from `text`.
    ///
    /// Never fails. Unrecoverable problems are logged and produce an empty
    /// result.
    pub async fn extract(&self, text: &str, ticker: &str) -> ExtractionResult {
        let estimated = chunker::estimate_tokens(text);
        if estimated > self.max_tokens {
            warn!(
                ticker,
                estimated_tokens = estimated,
                max_tokens = self.max_tokens,
                "Text too long for one call, switching to chunked extraction"
            );
            return self.extract_chunked(text, ticker).await;
        }

        match self.extract_single(text, ticker, None).await {
            SingleOutcome::Done(result) => result,
            SingleOutcome::Reroute => {
                warn!(ticker, "Token limit reported, switching to chunked extraction");
                self.extract_chunked(text, ticker).await
            }
        }
    }

    async fn extract_chunked(&self, text: &str, ticker: &str) -> ExtractionResult {
        let chunks = chunker::split(text, chunker::max_chars_for_tokens(self.max_tokens));
        info!(ticker, chunks = chunks.len(), "Extracting chunks");

        let outcomes = join_all(
            chunks
                .iter()
                .enumerate()
                .map(|(i, chunk)| self.extract_single(chunk, ticker, Some(i + 1))),
        )
        .await;

        let results: Vec<ExtractionResult> = outcomes
            .into_iter()
            .map(|outcome| match outcome {
                SingleOutcome::Done(result) => result,
                // Chunk calls are built without reroute
                SingleOutcome::Reroute => ExtractionResult::empty(),
            })
            .collect();

        let merged = aggregate::merge(results);
        info!(
            ticker,
            chunks = chunks.len(),
            segments = merged.text_segments.len(),
            "Chunked extraction merged"
        );
        merged
    }

    /// One piece of text through the retry controller. `chunk` is the
    /// 1-based chunk number, or None for a whole-document call (the only
    /// kind allowed to reroute).
    async fn extract_single(
        &self,
        text: &str,
        ticker: &str,
        chunk: Option<usize>,
    ) -> SingleOutcome {
        let prompt = prompts::corpus_extraction(text);
        let mut controller = RetryController::new(self.policy.clone(), chunk.is_none());
        let mut last_result = ExtractionResult::empty();

        loop {
            let attempt = controller.attempts() + 1;
            let max_retries = controller.max_retries();

            let outcome = match self.call(&prompt).await {
                Ok(raw) => match parse_reply(&raw) {
                    Ok(result) if result.is_empty() => {
                        warn!(ticker, ?chunk, attempt, max_retries, "Extraction returned no segments");
                        last_result = result;
                        AttemptOutcome::Empty
                    }
                    Ok(result) => {
                        last_result = result;
                        AttemptOutcome::Success
                    }
                    Err(e) => {
                        error!(ticker, ?chunk, attempt, max_retries, error = %e, "Extraction reply was not valid JSON");
                        AttemptOutcome::ParseFailure
                    }
                },
                Err(e) => {
                    let message = format!("{:#}", e);
                    error!(ticker, ?chunk, attempt, max_retries, error = %message, "Extraction call failed");
                    if is_token_limit_error(&message) {
                        AttemptOutcome::TokenLimit
                    } else {
                        AttemptOutcome::Transport
                    }
                }
            };

            match controller.record(outcome) {
                RetryState::Succeeded => {
                    debug!(
                        ticker,
                        ?chunk,
                        attempt,
                        segments = last_result.text_segments.len(),
                        "Extraction succeeded"
                    );
                    return SingleOutcome::Done(last_result);
                }
                RetryState::Reroute => return SingleOutcome::Reroute,
                RetryState::Exhausted => {
                    return match controller.last_outcome() {
                        Some(AttemptOutcome::Empty) => {
                            error!(ticker, ?chunk, attempts = attempt, "Extraction failed: still empty after all retries");
                            SingleOutcome::Done(last_result)
                        }
                        _ => {
                            error!(ticker, ?chunk, attempts = attempt, "Extraction failed after all retries, returning empty result");
                            SingleOutcome::Done(ExtractionResult::empty())
                        }
                    };
                }
                RetryState::SoftFailRetry | RetryState::HardFailRetry | RetryState::Attempting => {
                    let wait = controller.delay();
                    if !wait.is_zero() {
                        tokio::time::sleep(wait).await;
                    }
                    controller.resume();
                }
            }
        }
    }

    /// One service call under the gate. The permit drops when this returns.
    async fn call(&self, prompt: &str) -> Result<String> {
        let _permit = self
            .gate
            .acquire()
            .await
            .context("Extraction gate closed")?;
        self.service.complete_json(prompt).await
    }
}

/// Parse a reply into an ExtractionResult. Anything other than a JSON object
/// whose keys have the expected shapes is an error.
fn parse_reply(raw: &str) -> Result<ExtractionResult> {
    let value: Value = serde_json::from_str(raw).context("Reply is not JSON")?;
    anyhow::ensure!(value.is_object(), "Reply is not a JSON object");
    serde_json::from_value(value).context("Reply has unexpected shape")
}
