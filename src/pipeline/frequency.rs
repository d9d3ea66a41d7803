// Frequency stage: stored companies -> their filings' full text -> fixed
// keyword family counts.
//
// Works from the file path recorded when each company was built, so it
// needs no extraction and no language service. Companies whose filing is
// gone or empty are skipped with a warning.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::db::Database;
use crate::filing;
use crate::scoring::frequency::{FrequencyCounter, FrequencyRow};

/// Count keyword families for every company of each year, in year then
/// ticker order.
pub async fn run(
    db: &Arc<dyn Database>,
    years: &[i32],
    counter: &FrequencyCounter,
) -> Result<Vec<FrequencyRow>> {
    let mut rows = Vec::new();
    for &year in years {
        let companies = db.get_companies(year).await?;
        if companies.is_empty() {
            warn!(year, "No companies on record for year");
            continue;
        }

        let pb = super::progress_bar(companies.len(), &format!("Counting {year}"));
        let before = rows.len();
        for company in companies {
            pb.inc(1);
            if company.file_path.is_empty() {
                warn!(ticker = company.ticker, year, "No file path stored, skipping");
                continue;
            }

            let text = match filing::read_filing(Path::new(&company.file_path)) {
                Ok(text) if !text.is_empty() => text,
                Ok(_) => {
                    warn!(ticker = company.ticker, year, "Filing is empty, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(ticker = company.ticker, year, error = %format!("{e:#}"), "Filing unreadable, skipping");
                    continue;
                }
            };

            let (counts, total_words) = counter.count(&text);
            rows.push(FrequencyRow {
                year,
                ticker: company.ticker,
                company_name: company.company_name,
                total_words,
                counts,
            });
        }
        pb.finish_and_clear();
        info!(year, companies = rows.len() - before, "Keyword frequencies counted");
    }
    Ok(rows)
}
