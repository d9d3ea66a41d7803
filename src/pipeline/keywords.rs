// Keyword mining: ask the language service which phrases in the corpus
// signal expansion, contraction, or regional focus.
//
// Each year's segments are packed into batches, one request per batch.
// Batches of a year run concurrently under the shared extraction gate;
// years run one after another. The mined list is shared across years and
// stored with ignore-on-duplicate semantics.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::db::models::{null_as_default, KeywordCategory, MinedKeyword};
use crate::db::Database;
use crate::extraction::prompts;
use crate::extraction::retry::{AttemptOutcome, RetryController, RetryPolicy, RetryState};
use crate::extraction::ExtractionService;

/// Separator between passages in one keyword request.
const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Recorded as `extraction_method` for service-mined keywords.
const METHOD: &str = "llm";

#[derive(Debug, Default, Deserialize)]
struct KeywordReply {
    #[serde(default, deserialize_with = "null_as_default")]
    keywords: Vec<KeywordEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct KeywordEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    keyword: String,
    #[serde(default, deserialize_with = "null_as_default")]
    category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    context: String,
}

pub struct KeywordMiner {
    db: Arc<dyn Database>,
    service: Arc<dyn ExtractionService>,
    gate: Arc<Semaphore>,
    policy: RetryPolicy,
    batch_size: usize,
}

impl KeywordMiner {
    pub fn new(
        db: Arc<dyn Database>,
        service: Arc<dyn ExtractionService>,
        gate: Arc<Semaphore>,
        policy: RetryPolicy,
        batch_size: usize,
    ) -> Self {
        Self {
            db,
            service,
            gate,
            policy,
            batch_size: batch_size.max(1),
        }
    }

    /// Mine and store keywords for each year in turn. Returns the number of
    /// keywords newly inserted.
    pub async fn mine_years(&self, years: &[i32]) -> Result<usize> {
        let mut inserted = 0;
        for &year in years {
            let mined = self.mine_year(year).await?;
            let added = self.db.save_keywords(&mined).await?;
            info!(year, mined = mined.len(), inserted = added, "Keywords saved");
            inserted += added;
        }
        Ok(inserted)
    }

    /// Mine one year's corpus. Keywords come back trimmed, lowercased and
    /// deduplicated, first occurrence wins.
    pub async fn mine_year(&self, year: i32) -> Result<Vec<MinedKeyword>> {
        let corpus = self.db.get_corpus_texts(year).await?;
        let texts: Vec<&str> = corpus
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect();

        if texts.is_empty() {
            warn!(year, "No corpus segments, nothing to mine");
            return Ok(Vec::new());
        }

        let batches: Vec<String> = texts
            .chunks(self.batch_size)
            .map(|batch| batch.join(PASSAGE_SEPARATOR))
            .collect();
        info!(year, segments = texts.len(), batches = batches.len(), "Mining keywords");

        let pb = super::progress_bar(batches.len(), &format!("Keywords {year}"));
        let replies = join_all(batches.iter().enumerate().map(|(i, batch)| {
            let pb = &pb;
            async move {
                let entries = self.mine_batch(year, i + 1, batch).await;
                pb.inc(1);
                entries
            }
        }))
        .await;
        pb.finish_and_clear();

        Ok(dedupe(replies.into_iter().flatten()))
    }

    /// One batch through the retry controller. Exhaustion yields nothing.
    async fn mine_batch(&self, year: i32, batch: usize, passages: &str) -> Vec<KeywordEntry> {
        let prompt = prompts::keyword_extraction(passages);
        let mut controller = RetryController::new(self.policy.clone(), false);
        let mut entries = Vec::new();

        loop {
            let attempt = controller.attempts() + 1;
            let outcome = match self.call(&prompt).await {
                Ok(raw) => match serde_json::from_str::<KeywordReply>(&raw) {
                    Ok(reply) if reply.keywords.is_empty() => {
                        warn!(year, batch, attempt, "Keyword reply was empty");
                        AttemptOutcome::Empty
                    }
                    Ok(reply) => {
                        entries = reply.keywords;
                        AttemptOutcome::Success
                    }
                    Err(e) => {
                        error!(year, batch, attempt, error = %e, "Keyword reply was not valid JSON");
                        AttemptOutcome::ParseFailure
                    }
                },
                Err(e) => {
                    error!(year, batch, attempt, error = %format!("{e:#}"), "Keyword call failed");
                    AttemptOutcome::Transport
                }
            };

            match controller.record(outcome) {
                RetryState::Succeeded => return entries,
                RetryState::Exhausted | RetryState::Reroute => {
                    error!(year, batch, attempts = attempt, "Keyword batch failed after all retries");
                    return Vec::new();
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

    async fn call(&self, prompt: &str) -> Result<String> {
        let _permit = self
            .gate
            .acquire()
            .await
            .context("Extraction gate closed")?;
        self.service.complete_json(prompt).await
    }
}

fn dedupe(entries: impl IntoIterator<Item = KeywordEntry>) -> Vec<MinedKeyword> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter_map(|entry| {
            let keyword = entry.keyword.trim().to_lowercase();
            if keyword.is_empty() || !seen.insert(keyword.clone()) {
                return None;
            }
            Some(MinedKeyword {
                keyword,
                category: KeywordCategory::parse(&entry.category),
                context: entry.context.trim().to_string(),
                method: METHOD.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Segment, SegmentCategory, SegmentType};
    use crate::db::SqliteDatabase;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Returns an empty reply on the first call, then a fixed keyword list.
    /// Records every prompt.
    struct KeywordService {
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ExtractionService for KeywordService {
        async fn complete_json(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(r#"{"keywords": []}"#.to_string());
            }
            Ok(r#"{"keywords": [
                {"keyword": " New Facility ", "category": "expansion", "context": "opened a new facility"},
                {"keyword": "new facility", "category": "contraction", "context": "dup"},
                {"keyword": "exit china", "category": "china_negative", "context": "plan to exit china"},
                {"keyword": "widgets", "category": "gadgets", "context": ""},
                {"keyword": "   ", "category": "expansion", "context": ""}
            ]}"#
            .to_string())
        }
    }

    async fn seeded_db(dir: &tempfile::TempDir, segments: usize) -> Arc<dyn Database> {
        let conn = crate::db::initialize(dir.path().join("k.db").to_str().unwrap()).unwrap();
        let db: Arc<dyn Database> =
            Arc::new(SqliteDatabase::new(conn).with_lock_retry_step(Duration::ZERO));
        let segments: Vec<Segment> = (0..segments)
            .map(|i| Segment {
                text: format!("Passage number {i}."),
                category: SegmentCategory::Expansion,
                segment_type: SegmentType::Investment,
                source_section: "Item 1".into(),
            })
            .collect();
        db.save_text_segments("ACME", 2023, &segments).await.unwrap();
        db
    }

    fn miner(db: Arc<dyn Database>, service: Arc<KeywordService>, batch_size: usize) -> KeywordMiner {
        KeywordMiner::new(
            db,
            service,
            Arc::new(Semaphore::new(1)),
            RetryPolicy::immediate(3),
            batch_size,
        )
    }

    fn service() -> Arc<KeywordService> {
        Arc::new(KeywordService {
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_mined_keywords_are_normalized_and_deduped() {
        let dir = tempfile::tempdir().unwrap();
        let db = seeded_db(&dir, 2).await;
        let service = service();

        let mined = miner(db, service.clone(), 10).mine_year(2023).await.unwrap();
        let words: Vec<&str> = mined.iter().map(|k| k.keyword.as_str()).collect();
        assert_eq!(words, vec!["new facility", "exit china", "widgets"]);
        assert_eq!(mined[0].category, KeywordCategory::Expansion);
        assert_eq!(mined[2].category, KeywordCategory::Unknown);
        assert!(mined.iter().all(|k| k.method == "llm"));
        // Empty first reply was retried
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_batches_join_passages() {
        let dir = tempfile::tempdir().unwrap();
        let db = seeded_db(&dir, 3).await;
        let service = service();

        miner(db, service.clone(), 2).mine_year(2023).await.unwrap();
        let prompts = service.prompts.lock().unwrap();
        let separators: Vec<usize> = prompts
            .iter()
            .map(|p| p.matches(PASSAGE_SEPARATOR).count())
            .collect();
        // 3 segments in batches of 2: one request with a separator, one without
        assert!(separators.contains(&1));
        assert!(separators.contains(&0));
    }

    #[tokio::test]
    async fn test_mine_years_inserts_once() {
        let dir = tempfile::tempdir().unwrap();
        let db = seeded_db(&dir, 1).await;
        let service = service();
        let miner = miner(Arc::clone(&db), service, 10);

        assert_eq!(miner.mine_years(&[2023]).await.unwrap(), 3);
        assert_eq!(miner.mine_years(&[2023]).await.unwrap(), 0);
        assert_eq!(db.keyword_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_year_without_corpus_mines_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let db = seeded_db(&dir, 1).await;
        let service = service();

        assert!(miner(db, service.clone(), 10).mine_year(1999).await.unwrap().is_empty());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }
}
