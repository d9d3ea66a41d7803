// TF-IDF stage: weigh every stored keyword against each year's corpus and
// record which companies use it.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::db::Database;
use crate::scoring::TfIdfEngine;

/// Recompute and replace TF-IDF rows for each year. Returns
/// `(year, rows)` per year processed.
pub async fn run(db: &Arc<dyn Database>, years: &[i32]) -> Result<Vec<(i32, usize)>> {
    let keywords = db.get_all_keywords().await?;
    if keywords.is_empty() {
        anyhow::bail!("No keywords stored. Run `posture keywords` first.");
    }

    let engine = TfIdfEngine::new(&keywords);
    info!(keywords = engine.keyword_count(), years = years.len(), "Computing TF-IDF");

    let mut counts = Vec::with_capacity(years.len());
    for &year in years {
        let corpus = db.get_corpus_texts(year).await?;
        if corpus.is_empty() {
            warn!(year, "No corpus segments for year");
        }

        let rows = engine.compute(year, &corpus);
        db.save_tfidf_scores(year, &rows).await?;
        info!(year, segments = corpus.len(), rows = rows.len(), "TF-IDF rows saved");
        counts.push((year, rows.len()));
    }
    Ok(counts)
}
