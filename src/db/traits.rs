// Database trait — backend-agnostic async interface for all DB operations.
//
// Implementor: SqliteDatabase (wraps rusqlite). All methods are async so a
// sync backend behind a Mutex and a native async backend fit behind the
// same interface.
//
// The trait mirrors the queries.rs function signatures. Pipelines hold an
// `Arc<dyn Database>` and never touch a Connection directly.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use super::models::{
    CompanyRecord, CorpusSegment, Keyword, MinedKeyword, QuantScore, ScoredCompany, Segment,
    TfIdfRow, YearSummary,
};

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- Companies and corpus ---

    /// Save or update a company's filing record.
    async fn save_company(&self, company: &CompanyRecord) -> Result<()>;

    /// Store one document's extraction, replacing anything previously stored
    /// for the same (ticker, year) in a single transaction. If any insert
    /// fails the previous rows are kept. Returns the number of segments saved.
    async fn save_document(
        &self,
        ticker: &str,
        year: i32,
        structured: &Map<String, Value>,
        segments: &[Segment],
    ) -> Result<usize>;

    /// Append classified segments for a company-year.
    async fn save_text_segments(&self, ticker: &str, year: i32, segments: &[Segment])
        -> Result<usize>;

    /// Every segment of a year, with its ticker and category.
    async fn get_corpus_texts(&self, year: i32) -> Result<Vec<CorpusSegment>>;

    /// Every company on record for a year, ordered by ticker.
    async fn get_companies(&self, year: i32) -> Result<Vec<CompanyRecord>>;

    /// Companies of a year with no stored segments.
    async fn get_companies_without_segments(&self, year: i32) -> Result<Vec<CompanyRecord>>;

    // --- Keywords ---

    async fn get_all_keywords(&self) -> Result<Vec<Keyword>>;

    /// Insert keywords with ignore-on-duplicate semantics. Returns the
    /// number inserted.
    async fn save_keywords(&self, keywords: &[MinedKeyword]) -> Result<usize>;

    // --- Derived scores ---

    /// Replace the year's TF-IDF rows wholesale.
    async fn save_tfidf_scores(&self, year: i32, rows: &[TfIdfRow]) -> Result<()>;

    async fn get_tfidf_scores(&self, year: i32) -> Result<Vec<TfIdfRow>>;

    /// Save or overwrite one (ticker, year) score row.
    async fn save_quantitative_scores(&self, score: &QuantScore) -> Result<()>;

    /// A year's scores with company names, ranked by attitude score.
    async fn get_scored_companies(&self, year: i32) -> Result<Vec<ScoredCompany>>;

    // --- Status ---

    async fn get_years(&self) -> Result<Vec<i32>>;

    async fn year_summary(&self, year: i32) -> Result<YearSummary>;

    async fn keyword_count(&self) -> Result<i64>;
}
