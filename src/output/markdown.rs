// Markdown report: per year, a summary of the scores, the ranked score
// table, and the keywords carrying the most TF-IDF weight.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::db::models::ScoredCompany;
use crate::db::Database;
use crate::scoring::summary::{keyword_stats, summarize_scores, KeywordStat};

/// Keywords listed per year.
pub const TOP_KEYWORDS: usize = 30;

/// Everything the report shows for one year.
#[derive(Debug, Clone, Default)]
pub struct YearReport {
    pub year: i32,
    /// Ranked by attitude score.
    pub companies: Vec<ScoredCompany>,
    pub keywords: Vec<KeywordStat>,
}

impl YearReport {
    pub async fn load(db: &Arc<dyn Database>, year: i32, top_keywords: usize) -> Result<Self> {
        let companies = db.get_scored_companies(year).await?;
        let rows = db.get_tfidf_scores(year).await?;
        Ok(Self {
            year,
            companies,
            keywords: keyword_stats(&rows, top_keywords),
        })
    }
}

/// Render the report and write it to `output_path`. Returns the path written.
pub fn generate_report(years: &[YearReport], output_path: &str) -> Result<String> {
    let report = render(years, &chrono::Utc::now().format("%Y-%m-%d %H:%M UTC").to_string());

    if let Some(parent) = Path::new(output_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report directory for {output_path}"))?;
        }
    }
    std::fs::write(output_path, report)
        .with_context(|| format!("Failed to write report to {output_path}"))?;

    Ok(output_path.to_string())
}

/// The report body. `generated_at` is passed in so rendering is deterministic.
pub fn render(years: &[YearReport], generated_at: &str) -> String {
    let mut out = String::from("# Investment Posture Report\n\n");
    out.push_str(&format!("Generated {generated_at}.\n\n"));
    out.push_str(
        "Attitude and China scores run 0-100 with 50 as neutral; sparse keyword \
         evidence pulls them toward 50. The non-China score is relative to the \
         same year's peers. Densities are each region's share of keyword mass.\n\n",
    );

    if years.iter().all(|y| y.companies.is_empty()) {
        out.push_str("_No scored companies._\n");
        return out;
    }

    for year in years {
        out.push_str(&format!("## {}\n\n", year.year));
        if year.companies.is_empty() {
            out.push_str("_No scored companies._\n\n");
            continue;
        }
        render_summary(&mut out, &year.companies);
        render_scores(&mut out, &year.companies);
        render_keywords(&mut out, &year.keywords);
    }

    out
}

fn render_summary(out: &mut String, companies: &[ScoredCompany]) {
    let Some(s) = summarize_scores(companies) else {
        return;
    };

    out.push_str("### Summary\n\n");
    out.push_str("| Metric | Value |\n|---|---:|\n");
    out.push_str(&format!("| Companies | {} |\n", s.companies));
    out.push_str(&format!("| Mean attitude | {:.2} |\n", s.avg_attitude));
    out.push_str(&format!("| Mean China score | {:.2} |\n", s.avg_china));
    out.push_str(&format!("| Mean non-China score | {:.2} |\n", s.avg_non_china));
    out.push_str(&format!("| Mean China density | {:.2} |\n", s.avg_china_density));
    out.push_str(&format!(
        "| Mean non-China density | {:.2} |\n",
        s.avg_non_china_density
    ));
    out.push_str(&format!(
        "| Attitude range | {:.2} - {:.2} |\n\n",
        s.min_attitude, s.max_attitude
    ));
}

fn render_scores(out: &mut String, companies: &[ScoredCompany]) {
    out.push_str("### Scores\n\n");
    out.push_str(
        "| Rank | Ticker | Company | Attitude | Expansion | Contraction | China | \
         Non-China | China density | Non-China density | Keywords |\n",
    );
    out.push_str("|---:|---|---|---:|---:|---:|---:|---:|---:|---:|---:|\n");
    for (i, company) in companies.iter().enumerate() {
        let s = &company.score;
        out.push_str(&format!(
            "| {} | {} | {} | {:.1} | {:.1} | {:.1} | {:.1} | {:.1} | {:.2} | {:.2} | {} |\n",
            i + 1,
            s.ticker,
            escape_cell(&company.company_name),
            s.investment_attitude_score,
            s.expansion_score,
            s.contraction_score,
            s.china_investment_score,
            s.non_china_investment_score,
            s.china_investment_density,
            s.non_china_investment_density,
            s.total_keywords_count,
        ));
    }
    out.push('\n');
}

fn render_keywords(out: &mut String, keywords: &[KeywordStat]) {
    out.push_str("### Top keywords\n\n");
    if keywords.is_empty() {
        out.push_str("_No TF-IDF rows._\n\n");
        return;
    }

    out.push_str("| Keyword | Category | Companies | Mean TF-IDF | Max TF-IDF |\n");
    out.push_str("|---|---|---:|---:|---:|\n");
    for k in keywords {
        out.push_str(&format!(
            "| {} | {} | {} | {:.4} | {:.4} |\n",
            escape_cell(&k.keyword),
            k.category.as_str(),
            k.companies,
            k.avg_tfidf,
            k.max_tfidf,
        ));
    }
    out.push('\n');
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
