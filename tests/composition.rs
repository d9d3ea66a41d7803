// Composition tests — filings on disk all the way to a ranked report.
//
// The language service is a deterministic fake that routes on the prompt:
// ticker lookups get a fixed symbol, keyword requests get a fixed keyword
// list, and extraction requests echo each paragraph of the filing back as
// one classified segment. Everything else (discovery, chunking, storage,
// TF-IDF, scoring, report rendering, frequency counts, diagnosis) is the
// real code against a temporary SQLite file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Semaphore;

use posture::db::{Database, SqliteDatabase};
use posture::extraction::retry::RetryPolicy;
use posture::extraction::{ExtractionClient, ExtractionService};
use posture::output::markdown::{YearReport, TOP_KEYWORDS};
use posture::pipeline::corpus::CorpusBuilder;
use posture::pipeline::keywords::KeywordMiner;
use posture::scoring::frequency::FrequencyCounter;
use posture::scoring::PostureWeights;
use posture::ticker::{TickerCache, TickerResolver};

struct FakeService;

#[async_trait]
impl ExtractionService for FakeService {
    async fn complete_json(&self, prompt: &str) -> Result<String> {
        if prompt.contains("stock ticker symbol") {
            return Ok(json!({"ticker": "ccc"}).to_string());
        }

        if prompt.contains("Passages:") {
            return Ok(json!({"keywords": [
                {"keyword": "new plant", "category": "expansion", "context": "build a new plant"},
                {"keyword": "close plant", "category": "contraction", "context": "close plant operations"},
                {"keyword": "india", "category": "non_china_regions", "context": "capacity in India"},
                {"keyword": "China", "category": "china_negative", "context": "reduce capacity in China"},
                {"keyword": "blockchain", "category": "expansion", "context": "never appears"}
            ]})
            .to_string());
        }

        let text = prompt
            .split_once("Filing text:\n")
            .map(|(_, rest)| rest.trim())
            .unwrap_or("");
        let segments: Vec<_> = text
            .split("\n\n")
            .filter(|p| !p.trim().is_empty())
            .map(|p| {
                json!({
                    "text": p.trim(),
                    "category": "neutral",
                    "type": "investment",
                    "source_section": "Item 7"
                })
            })
            .collect();
        Ok(json!({
            "structured_data": {
                "foreign_investments": [{"target_country": "Vietnam", "investment_amount": "$10 million"}],
                "supply_chain": {"supplier_countries": ["Vietnam", "India"]}
            },
            "text_segments": segments
        })
        .to_string())
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    root: PathBuf,
    db: Arc<dyn Database>,
    service: Arc<dyn ExtractionService>,
    gate: Arc<Semaphore>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let conn = posture::db::initialize(root.join("posture.db").to_str().unwrap()).unwrap();
        let db: Arc<dyn Database> =
            Arc::new(SqliteDatabase::new(conn).with_lock_retry_step(Duration::ZERO));
        Self {
            _dir: dir,
            root,
            db,
            service: Arc::new(FakeService),
            gate: Arc::new(Semaphore::new(2)),
        }
    }

    fn write_filing(&self, name: &str, body: &str) {
        let filings = self.root.join("filings");
        std::fs::create_dir_all(&filings).unwrap();
        std::fs::write(filings.join(name), body).unwrap();
    }

    fn builder(&self, max_tokens: usize) -> CorpusBuilder {
        let client = ExtractionClient::new(
            Arc::clone(&self.service),
            Arc::clone(&self.gate),
            RetryPolicy::immediate(2),
            max_tokens,
        );
        let resolver = TickerResolver::new(
            Arc::new(TickerCache::load(self.root.join("tickers.json"))),
            Arc::clone(&self.service),
            Arc::clone(&self.gate),
        );
        CorpusBuilder::new(Arc::clone(&self.db), client, resolver)
    }

    fn miner(&self) -> KeywordMiner {
        KeywordMiner::new(
            Arc::clone(&self.db),
            Arc::clone(&self.service),
            Arc::clone(&self.gate),
            RetryPolicy::immediate(2),
            2,
        )
    }

    fn seed_filings(&self) {
        self.write_filing(
            "1_2023-12-31_AAA_Alpha_Industries_10-K_2024-02-15.txt",
            "We will build a new plant in Vietnam.\n\n\nWe expand capacity in India.",
        );
        self.write_filing(
            "2_2023-12-31_BBB_Beta_Holdings_10-K_2024-02-20.txt",
            "We will close plant operations.\r\n\r\nWe reduce capacity in China.",
        );
        self.write_filing(
            "3_2023-12-31_None_Cee_Corp_10-K_2024-03-01.txt",
            "General business discussion only.",
        );
    }
}

// ============================================================
// Chain: Build -> Keywords -> TF-IDF -> Score -> Report
// ============================================================

#[tokio::test]
async fn filings_flow_through_to_ranked_scores() {
    let h = Harness::new();
    h.seed_filings();

    let files = posture::filing::discover(&[h.root.join("filings")], None).unwrap();
    assert_eq!(files.len(), 3);

    let summary = h.builder(100_000).build_batch(&files).await;
    assert_eq!(summary.succeeded(), 3, "{:?}", summary.reports);
    assert_eq!(summary.segments(), 5);

    let years = posture::pipeline::resolve_years(&h.db, &[]).await.unwrap();
    assert_eq!(years, vec![2023]);

    let inserted = h.miner().mine_years(&years).await.unwrap();
    assert_eq!(inserted, 5);

    let tfidf = posture::pipeline::tfidf::run(&h.db, &years).await.unwrap();
    // AAA: new plant, india. BBB: close plant, china. CCC: nothing.
    // "blockchain" never appears, so it contributes no rows.
    assert_eq!(tfidf, vec![(2023, 4)]);

    let scored = posture::pipeline::scores::run(&h.db, &years, &PostureWeights::default())
        .await
        .unwrap();
    assert_eq!(scored, vec![(2023, 2)]);

    let ranked = h.db.get_scored_companies(2023).await.unwrap();
    let tickers: Vec<&str> = ranked.iter().map(|c| c.score.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["AAA", "BBB"]);
    assert_eq!(ranked[0].company_name, "Alpha Industries");

    let alpha = &ranked[0].score;
    let beta = &ranked[1].score;
    assert!(alpha.investment_attitude_score > 50.0);
    assert!(beta.investment_attitude_score < 50.0);
    assert!(beta.china_investment_score < 50.0);
    assert_eq!(alpha.total_keywords_count, 2);
    // Alpha has non-China mass and no China mass
    assert_eq!(alpha.non_china_investment_density_normalized, 100.0);
    assert_eq!(alpha.china_investment_density_normalized, 0.0);
    assert!(alpha.non_china_investment_score > beta.non_china_investment_score);

    let section = YearReport::load(&h.db, 2023, TOP_KEYWORDS).await.unwrap();
    assert_eq!(section.keywords.len(), 4);
    assert!(section.keywords.iter().all(|k| k.companies == 1));
    let report = posture::output::markdown::render(&[section], "now");
    assert!(report.contains("| 1 | AAA | Alpha Industries |"));
    assert!(report.contains("| 2 | BBB | Beta Holdings |"));
    assert!(report.contains("| Companies | 2 |"));
    assert!(report.contains("| new plant | expansion | 1 |"));
}

#[tokio::test]
async fn unresolved_ticker_is_looked_up_once() {
    let h = Harness::new();
    h.seed_filings();

    let files = posture::filing::discover(&[h.root.join("filings")], None).unwrap();
    let summary = h.builder(100_000).build_batch(&files).await;

    let tickers: Vec<_> = summary.reports.iter().filter_map(|r| r.ticker.clone()).collect();
    assert!(tickers.contains(&"CCC".to_string()));

    let cache = TickerCache::load(h.root.join("tickers.json"));
    assert_eq!(
        cache.get("Cee Corp", "3"),
        posture::ticker::cache::CacheLookup::Hit("CCC".into())
    );
}

#[tokio::test]
async fn oversized_filing_is_chunked_and_merged() {
    let h = Harness::new();
    let paragraphs: Vec<String> = (0..8)
        .map(|i| format!("Paragraph {i} talks about a new plant in region number {i}."))
        .collect();
    h.write_filing(
        "9_2022-06-30_BIG_Big_Co_10-K_2022-08-01.txt",
        &paragraphs.join("\n\n"),
    );

    let files = posture::filing::discover(&[h.root.join("filings")], None).unwrap();
    // ~15 tokens per paragraph; a 40-token limit forces several chunks
    let summary = h.builder(40).build_batch(&files).await;
    assert_eq!(summary.segments(), 8);

    let corpus = h.db.get_corpus_texts(2022).await.unwrap();
    let texts: Vec<&str> = corpus.iter().map(|s| s.text.as_str()).collect();
    let expected: Vec<&str> = paragraphs.iter().map(String::as_str).collect();
    assert_eq!(texts, expected);
}

#[tokio::test]
async fn tfidf_without_keywords_asks_for_mining_first() {
    let h = Harness::new();
    let err = posture::pipeline::tfidf::run(&h.db, &[2023]).await.unwrap_err();
    assert!(err.to_string().contains("posture keywords"));
}

#[tokio::test]
async fn rerunning_the_scoring_stages_is_stable() {
    let h = Harness::new();
    h.seed_filings();
    let files = posture::filing::discover(&[h.root.join("filings")], None).unwrap();
    h.builder(100_000).build_batch(&files).await;
    h.miner().mine_years(&[2023]).await.unwrap();

    let weights = PostureWeights::default();
    posture::pipeline::tfidf::run(&h.db, &[2023]).await.unwrap();
    posture::pipeline::scores::run(&h.db, &[2023], &weights).await.unwrap();
    let first = h.db.get_scored_companies(2023).await.unwrap();

    posture::pipeline::tfidf::run(&h.db, &[2023]).await.unwrap();
    posture::pipeline::scores::run(&h.db, &[2023], &weights).await.unwrap();
    let second = h.db.get_scored_companies(2023).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.db.get_tfidf_scores(2023).await.unwrap().len(), 4);
}

// ============================================================
// Side views: keyword frequency, diagnosis
// ============================================================

#[tokio::test]
async fn frequency_reads_the_stored_filings() {
    let h = Harness::new();
    h.seed_filings();
    let files = posture::filing::discover(&[h.root.join("filings")], None).unwrap();
    h.builder(100_000).build_batch(&files).await;

    let counter = FrequencyCounter::new(&[("capacity", &["capacity"]), ("plant", &["plant"])])
        .unwrap();
    let rows = posture::pipeline::frequency::run(&h.db, &[2023], &counter)
        .await
        .unwrap();

    let tickers: Vec<&str> = rows.iter().map(|r| r.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["AAA", "BBB", "CCC"]);
    assert_eq!(rows[0].counts, vec![1, 1]);
    assert_eq!(rows[1].counts, vec![1, 1]);
    assert_eq!(rows[2].counts, vec![0, 0]);

    let families: Vec<&str> = counter.family_names().collect();
    let csv = posture::output::csv::frequency_csv(&families, &rows);
    assert_eq!(csv.lines().count(), 4);
}

#[tokio::test]
async fn diagnose_finds_filings_added_after_the_build() {
    let h = Harness::new();
    h.seed_filings();
    let files = posture::filing::discover(&[h.root.join("filings")], None).unwrap();
    h.builder(100_000).build_batch(&files).await;

    h.write_filing("7_2023-12-31_LATE_Late_Co_10-K_2024-04-01.txt", "Arrived later.");
    let files = posture::filing::discover(&[h.root.join("filings")], None).unwrap();
    let diagnosis = posture::status::diagnose(&h.db, &files, Some(2023))
        .await
        .unwrap();

    let year = &diagnosis.years[0];
    assert_eq!(year.files_on_disk, 4);
    assert_eq!(year.companies, 3);
    assert!(year.failed.is_empty());
    assert_eq!(year.unprocessed.len(), 1);
    assert!(year.unprocessed[0].ends_with("7_2023-12-31_LATE_Late_Co_10-K_2024-04-01.txt"));
}
