// Scoring stage: TF-IDF rows -> per-company posture scores.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::db::Database;
use crate::scoring::{score_year, PostureWeights};

/// Score each year and upsert the results. Returns `(year, companies)`
/// per year processed.
pub async fn run(
    db: &Arc<dyn Database>,
    years: &[i32],
    weights: &PostureWeights,
) -> Result<Vec<(i32, usize)>> {
    let mut counts = Vec::with_capacity(years.len());
    for &year in years {
        let rows = db.get_tfidf_scores(year).await?;
        if rows.is_empty() {
            warn!(year, "No TF-IDF rows for year. Run `posture tfidf` first.");
        }

        let scores = score_year(year, &rows, weights);
        for score in &scores {
            db.save_quantitative_scores(score).await?;
        }
        info!(year, companies = scores.len(), "Scores saved");
        counts.push((year, scores.len()));
    }
    Ok(counts)
}
