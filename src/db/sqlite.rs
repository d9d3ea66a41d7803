// SqliteDatabase — rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Send.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
//
// Other processes may hold the database file (a second `posture build`, a
// report open in a SQLite browser). Writes that hit "database is locked" or
// "busy" are retried with waits of 2, 4, 6, 8 seconds. The mutex is released
// while waiting.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::warn;

use super::models::{
    CompanyRecord, CorpusSegment, Keyword, MinedKeyword, QuantScore, ScoredCompany, Segment,
    TfIdfRow, YearSummary,
};
use super::queries;
use super::traits::Database;

/// Maximum attempts for a write that keeps hitting lock contention.
const LOCK_RETRY_ATTEMPTS: u32 = 5;

/// Base wait between lock retries; attempt n waits n times this.
const LOCK_RETRY_STEP: Duration = Duration::from_secs(2);

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
    lock_retry_step: Duration,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            lock_retry_step: LOCK_RETRY_STEP,
        }
    }

    /// Override the lock retry step (tests use zero).
    pub fn with_lock_retry_step(mut self, step: Duration) -> Self {
        self.lock_retry_step = step;
        self
    }

    /// Run a write, retrying on lock contention.
    async fn write<T, F>(&self, operation: &str, f: F) -> Result<T>
    where
        F: Fn(&Connection) -> Result<T> + Send + Sync,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = {
                let conn = self.conn.lock().await;
                f(&conn)
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt < LOCK_RETRY_ATTEMPTS && is_lock_error(&e) => {
                    let wait = self.lock_retry_step * attempt;
                    warn!(
                        operation,
                        attempt,
                        max_attempts = LOCK_RETRY_ATTEMPTS,
                        wait_secs = wait.as_secs_f64(),
                        "Database locked, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e.context(format!("{operation} failed"))),
            }
        }
    }
}

/// Is this a SQLite lock/busy error anywhere in the chain?
pub fn is_lock_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(rusqlite::Error::SqliteFailure(e, _)) = cause.downcast_ref::<rusqlite::Error>()
        {
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) {
                return true;
            }
        }
        let message = cause.to_string().to_lowercase();
        message.contains("database is locked") || message.contains("busy")
    })
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn save_company(&self, company: &CompanyRecord) -> Result<()> {
        self.write("save_company", |conn| queries::upsert_company(conn, company))
            .await
    }

    async fn save_document(
        &self,
        ticker: &str,
        year: i32,
        structured: &Map<String, Value>,
        segments: &[Segment],
    ) -> Result<usize> {
        self.write("save_document", |conn| {
            queries::replace_document(conn, ticker, year, structured, segments)
        })
        .await
    }

    async fn save_text_segments(
        &self,
        ticker: &str,
        year: i32,
        segments: &[Segment],
    ) -> Result<usize> {
        self.write("save_text_segments", |conn| {
            queries::append_segments(conn, ticker, year, segments)
        })
        .await
    }

    async fn get_corpus_texts(&self, year: i32) -> Result<Vec<CorpusSegment>> {
        let conn = self.conn.lock().await;
        queries::get_corpus_segments(&conn, year)
    }

    async fn get_companies(&self, year: i32) -> Result<Vec<CompanyRecord>> {
        let conn = self.conn.lock().await;
        queries::companies_for_year(&conn, year)
    }

    async fn get_companies_without_segments(&self, year: i32) -> Result<Vec<CompanyRecord>> {
        let conn = self.conn.lock().await;
        queries::companies_without_segments(&conn, year)
    }

    async fn get_all_keywords(&self) -> Result<Vec<Keyword>> {
        let conn = self.conn.lock().await;
        queries::get_all_keywords(&conn)
    }

    async fn save_keywords(&self, keywords: &[MinedKeyword]) -> Result<usize> {
        self.write("save_keywords", |conn| queries::save_keywords(conn, keywords))
            .await
    }

    async fn save_tfidf_scores(&self, year: i32, rows: &[TfIdfRow]) -> Result<()> {
        self.write("save_tfidf_scores", |conn| {
            queries::replace_tfidf_scores(conn, year, rows)
        })
        .await
    }

    async fn get_tfidf_scores(&self, year: i32) -> Result<Vec<TfIdfRow>> {
        let conn = self.conn.lock().await;
        queries::get_tfidf_scores(&conn, year)
    }

    async fn save_quantitative_scores(&self, score: &QuantScore) -> Result<()> {
        self.write("save_quantitative_scores", |conn| {
            queries::upsert_quant_score(conn, score)
        })
        .await
    }

    async fn get_scored_companies(&self, year: i32) -> Result<Vec<ScoredCompany>> {
        let conn = self.conn.lock().await;
        queries::get_scored_companies(&conn, year)
    }

    async fn get_years(&self) -> Result<Vec<i32>> {
        let conn = self.conn.lock().await;
        queries::get_years(&conn)
    }

    async fn year_summary(&self, year: i32) -> Result<YearSummary> {
        let conn = self.conn.lock().await;
        queries::year_summary(&conn, year)
    }

    async fn keyword_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        queries::keyword_count(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{KeywordCategory, SegmentCategory};
    use crate::db::schema::create_tables;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn test_db() -> SqliteDatabase {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        SqliteDatabase::new(conn).with_lock_retry_step(Duration::ZERO)
    }

    fn segment(text: &str) -> Segment {
        Segment {
            text: text.to_string(),
            category: SegmentCategory::Expansion,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_trait_table_count() {
        let db = test_db().await;
        assert_eq!(db.table_count().await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_trait_save_document_replaces_corpus() {
        let db = test_db().await;
        let structured = json!({"geographic_segments": [{"region": "Asia"}]});
        let structured = structured.as_object().unwrap();

        db.save_document("ACME", 2023, structured, &[segment("a"), segment("b")])
            .await
            .unwrap();
        let saved = db
            .save_document("ACME", 2023, structured, &[segment("c")])
            .await
            .unwrap();
        assert_eq!(saved, 1);

        let corpus = db.get_corpus_texts(2023).await.unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus[0].text, "c");
    }

    #[tokio::test]
    async fn test_failed_segment_insert_keeps_previous_document() {
        let db = test_db().await;
        let structured = json!({"geographic_segments": [{"region": "Asia"}]});
        let structured = structured.as_object().unwrap();
        db.save_document("ACME", 2023, structured, &[segment("a")])
            .await
            .unwrap();

        db.conn
            .lock()
            .await
            .execute_batch(
                "CREATE TRIGGER reject_boom BEFORE INSERT ON corpus_segments
                 WHEN NEW.text_segment = 'boom'
                 BEGIN SELECT RAISE(ABORT, 'segment rejected'); END;",
            )
            .unwrap();

        let replacement = json!({"geographic_segments": [{"region": "Europe"}]});
        let result = db
            .save_document(
                "ACME",
                2023,
                replacement.as_object().unwrap(),
                &[segment("b"), segment("boom")],
            )
            .await;
        assert!(result.is_err());

        let corpus = db.get_corpus_texts(2023).await.unwrap();
        let texts: Vec<&str> = corpus.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["a"]);

        let conn = db.conn.lock().await;
        let region: String = conn
            .query_row(
                "SELECT region FROM geographic_segments WHERE ticker = 'ACME' AND data_year = 2023",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(region, "Asia");
    }

    #[tokio::test]
    async fn test_trait_keywords_roundtrip() {
        let db = test_db().await;
        let inserted = db
            .save_keywords(&[MinedKeyword {
                keyword: "new plant".to_string(),
                category: KeywordCategory::Expansion,
                context: "we built a new plant".to_string(),
                method: "llm".to_string(),
            }])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(db.keyword_count().await.unwrap(), 1);
        assert_eq!(db.get_all_keywords().await.unwrap()[0].keyword, "new plant");
    }

    #[tokio::test]
    async fn test_write_retries_lock_errors() {
        let db = test_db().await;
        let calls = AtomicU32::new(0);
        let value = db
            .write("test", |_| {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    anyhow::bail!("database is locked")
                }
                Ok(7)
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_write_gives_up_after_five_attempts() {
        let db = test_db().await;
        let calls = AtomicU32::new(0);
        let result: Result<()> = db
            .write("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("database is locked")
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), LOCK_RETRY_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_write_does_not_retry_other_errors() {
        let db = test_db().await;
        let calls = AtomicU32::new(0);
        let result: Result<()> = db
            .write("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("no such table: nope")
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_is_lock_error_detects_sqlite_codes() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(is_lock_error(&anyhow::Error::new(err)));
        assert!(is_lock_error(&anyhow::anyhow!("database is locked")));
        assert!(!is_lock_error(&anyhow::anyhow!("disk I/O error")));
    }
}
