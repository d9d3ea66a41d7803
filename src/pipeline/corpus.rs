// Corpus builder: filings on disk -> extracted, classified corpus in the DB.
//
// Per document: parse the file name, resolve the ticker if the name lacks
// one, read and normalize the text, extract, then persist the company
// record, structured data and segments. Rebuilding a document replaces
// what was stored for its (ticker, year), but only when the new extraction
// produced segments; an empty or failed extraction leaves the old corpus.
//
// Documents in a batch run concurrently. The extraction gate inside the
// client bounds in-flight service calls, so the batch itself is not
// throttled here. One document's failure never affects another's.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use tracing::{error, info, warn};

use crate::db::models::CompanyRecord;
use crate::db::Database;
use crate::extraction::ExtractionClient;
use crate::filing::{self, FilingMetadata};
use crate::ticker::TickerResolver;

/// How one document fared.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    Success { segments: usize },
    /// Extraction finished but produced no segments.
    Empty,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct DocumentReport {
    pub path: PathBuf,
    /// None if the document failed before a ticker was known.
    pub ticker: Option<String>,
    pub year: Option<i32>,
    pub outcome: DocumentOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub reports: Vec<DocumentReport>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, DocumentOutcome::Success { .. }))
    }

    pub fn empty(&self) -> usize {
        self.count(|o| matches!(o, DocumentOutcome::Empty))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DocumentOutcome::Failed(_)))
    }

    pub fn segments(&self) -> usize {
        self.reports
            .iter()
            .map(|r| match r.outcome {
                DocumentOutcome::Success { segments } => segments,
                _ => 0,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&DocumentOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

pub struct CorpusBuilder {
    db: Arc<dyn Database>,
    client: ExtractionClient,
    resolver: TickerResolver,
}

impl CorpusBuilder {
    pub fn new(db: Arc<dyn Database>, client: ExtractionClient, resolver: TickerResolver) -> Self {
        Self {
            db,
            client,
            resolver,
        }
    }

    /// Build the corpus for every file in `paths`.
    pub async fn build_batch(&self, paths: &[PathBuf]) -> BatchSummary {
        info!(documents = paths.len(), "Building corpus");
        let pb = super::progress_bar(paths.len(), "Extracting");

        let reports = join_all(paths.iter().map(|path| {
            let pb = &pb;
            async move {
                let report = self.build_document(path).await;
                pb.inc(1);
                report
            }
        }))
        .await;
        pb.finish_and_clear();

        let summary = BatchSummary { reports };
        info!(
            total = summary.total(),
            succeeded = summary.succeeded(),
            empty = summary.empty(),
            failed = summary.failed(),
            segments = summary.segments(),
            "Corpus batch finished"
        );
        summary
    }

    /// Rebuild companies of `year` that have no stored segments, using the
    /// file path recorded when they were first built.
    pub async fn retry_failed(&self, year: i32, limit: Option<usize>) -> Result<BatchSummary> {
        let mut companies = self.db.get_companies_without_segments(year).await?;
        if let Some(limit) = limit {
            companies.truncate(limit);
        }

        let paths: Vec<PathBuf> = companies
            .iter()
            .filter_map(|c| {
                if c.file_path.is_empty() {
                    warn!(ticker = c.ticker, year, "No file path stored, cannot retry");
                    None
                } else {
                    Some(PathBuf::from(&c.file_path))
                }
            })
            .collect();

        info!(year, companies = paths.len(), "Retrying companies without segments");
        Ok(self.build_batch(&paths).await)
    }

    /// Build one document. Never fails; problems become `DocumentOutcome::Failed`.
    pub async fn build_document(&self, path: &Path) -> DocumentReport {
        let mut report = DocumentReport {
            path: path.to_path_buf(),
            ticker: None,
            year: None,
            outcome: DocumentOutcome::Empty,
        };

        let meta = match FilingMetadata::from_path(path) {
            Ok(meta) => meta,
            Err(e) => {
                error!(path = %path.display(), error = %format!("{e:#}"), "Skipping filing");
                report.outcome = DocumentOutcome::Failed(format!("{e:#}"));
                return report;
            }
        };
        report.year = Some(meta.year);

        let ticker = if meta.needs_ticker_resolution {
            self.resolver
                .resolve_or_placeholder(&meta.company_name, &meta.cik)
                .await
        } else {
            meta.ticker.to_uppercase()
        };
        report.ticker = Some(ticker.clone());

        report.outcome = match self.extract_and_store(path, &meta, &ticker).await {
            Ok(0) => {
                error!(ticker, year = meta.year, path = %path.display(), "Extraction produced no segments");
                DocumentOutcome::Empty
            }
            Ok(segments) => {
                info!(ticker, year = meta.year, segments, "Document stored");
                DocumentOutcome::Success { segments }
            }
            Err(e) => {
                error!(ticker, year = meta.year, path = %path.display(), error = %format!("{e:#}"), "Document failed");
                DocumentOutcome::Failed(format!("{e:#}"))
            }
        };
        report
    }

    async fn extract_and_store(
        &self,
        path: &Path,
        meta: &FilingMetadata,
        ticker: &str,
    ) -> Result<usize> {
        let text = filing::read_filing(path)?;
        anyhow::ensure!(!text.is_empty(), "Filing {} is empty", path.display());

        let result = self.client.extract(&text, ticker).await;

        // The company row is stored even for an empty extraction so that
        // retry_failed can find it later.
        let company = CompanyRecord {
            ticker: ticker.to_string(),
            year: meta.year,
            cik: meta.cik.clone(),
            company_name: meta.company_name.clone(),
            fiscal_year_end: meta.fiscal_year_end.clone(),
            report_date: meta.report_date.clone(),
            file_path: path.display().to_string(),
        };
        self.db.save_company(&company).await?;

        if result.is_empty() {
            return Ok(0);
        }

        self.db
            .save_document(ticker, meta.year, &result.structured_data, &result.text_segments)
            .await
    }
}
