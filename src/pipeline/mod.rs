// Pipelines — the stages that move filings from disk to scores.
//
//   corpus    filings -> extraction -> companies, structured data, segments
//   keywords  segments -> mined keyword list (shared across years)
//   tfidf     keywords x year corpus -> per-company keyword weights
//   scores    keyword weights -> posture scores
//   frequency stored filings -> fixed keyword family counts
//
// Each stage reads its inputs from the database and writes its outputs
// back, so stages can be rerun independently.

pub mod corpus;
pub mod frequency;
pub mod keywords;
pub mod scores;
pub mod tfidf;

use std::sync::Arc;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use crate::db::Database;

/// The years to process: the requested ones, or every year in the database.
pub async fn resolve_years(db: &Arc<dyn Database>, requested: &[i32]) -> Result<Vec<i32>> {
    let mut years = if requested.is_empty() {
        db.get_years().await?
    } else {
        requested.to_vec()
    };
    years.sort_unstable();
    years.dedup();
    Ok(years)
}

/// A progress bar in the house style.
pub(crate) fn progress_bar(len: usize, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let template = format!("  {label} [{{bar:30}}] {{pos}}/{{len}} ({{eta}})");
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}
