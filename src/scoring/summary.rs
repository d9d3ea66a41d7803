// Year-level summaries for the report: headline score figures and the
// keywords that carry the most TF-IDF weight.

use std::collections::{BTreeMap, BTreeSet};

use crate::db::models::{KeywordCategory, ScoredCompany, TfIdfRow};

/// Headline figures for one year's scored companies.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSummary {
    pub companies: usize,
    pub avg_attitude: f64,
    pub avg_china: f64,
    pub avg_non_china: f64,
    pub avg_china_density: f64,
    pub avg_non_china_density: f64,
    pub min_attitude: f64,
    pub max_attitude: f64,
}

/// Averages and attitude range across a year. None when nobody was scored.
pub fn summarize_scores(companies: &[ScoredCompany]) -> Option<ScoreSummary> {
    if companies.is_empty() {
        return None;
    }

    let n = companies.len() as f64;
    let mean = |f: fn(&ScoredCompany) -> f64| companies.iter().map(f).sum::<f64>() / n;
    let attitudes = companies.iter().map(|c| c.score.investment_attitude_score);

    Some(ScoreSummary {
        companies: companies.len(),
        avg_attitude: mean(|c| c.score.investment_attitude_score),
        avg_china: mean(|c| c.score.china_investment_score),
        avg_non_china: mean(|c| c.score.non_china_investment_score),
        avg_china_density: mean(|c| c.score.china_investment_density),
        avg_non_china_density: mean(|c| c.score.non_china_investment_density),
        min_attitude: attitudes.clone().fold(f64::INFINITY, f64::min),
        max_attitude: attitudes.fold(f64::NEG_INFINITY, f64::max),
    })
}

/// How widely one keyword shows up in a year and how much weight it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordStat {
    pub keyword: String,
    pub category: KeywordCategory,
    /// Distinct companies with a TF-IDF row for this keyword.
    pub companies: usize,
    pub avg_tfidf: f64,
    pub max_tfidf: f64,
}

/// Keywords of one year ranked by mean TF-IDF, highest first, keeping at
/// most `limit`. Ties fall back to keyword order.
pub fn keyword_stats(rows: &[TfIdfRow], limit: usize) -> Vec<KeywordStat> {
    struct Acc<'a> {
        category: KeywordCategory,
        tickers: BTreeSet<&'a str>,
        sum: f64,
        rows: usize,
        max: f64,
    }

    let mut groups: BTreeMap<(&str, &str), Acc> = BTreeMap::new();
    for row in rows {
        let acc = groups
            .entry((row.keyword.as_str(), row.category.as_str()))
            .or_insert_with(|| Acc {
                category: row.category,
                tickers: BTreeSet::new(),
                sum: 0.0,
                rows: 0,
                max: f64::NEG_INFINITY,
            });
        acc.tickers.insert(row.ticker.as_str());
        acc.sum += row.tfidf;
        acc.rows += 1;
        acc.max = acc.max.max(row.tfidf);
    }

    let mut stats: Vec<KeywordStat> = groups
        .into_iter()
        .map(|((keyword, _), acc)| KeywordStat {
            keyword: keyword.to_string(),
            category: acc.category,
            companies: acc.tickers.len(),
            avg_tfidf: acc.sum / acc.rows as f64,
            max_tfidf: acc.max,
        })
        .collect();

    stats.sort_by(|a, b| {
        b.avg_tfidf
            .total_cmp(&a.avg_tfidf)
            .then_with(|| a.keyword.cmp(&b.keyword))
    });
    stats.truncate(limit);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::QuantScore;

    fn scored(ticker: &str, attitude: f64, china: f64, china_density: f64) -> ScoredCompany {
        ScoredCompany {
            company_name: format!("{ticker} Inc"),
            score: QuantScore {
                ticker: ticker.to_string(),
                year: 2023,
                investment_attitude_score: attitude,
                china_investment_score: china,
                non_china_investment_score: 50.0,
                china_investment_density: china_density,
                non_china_investment_density: 100.0 - china_density,
                ..QuantScore::default()
            },
        }
    }

    fn row(ticker: &str, keyword: &str, tfidf: f64) -> TfIdfRow {
        TfIdfRow {
            ticker: ticker.to_string(),
            year: 2023,
            keyword: keyword.to_string(),
            category: KeywordCategory::Expansion,
            tf: tfidf,
            idf: 1.0,
            tfidf,
        }
    }

    #[test]
    fn test_summary_averages_and_range() {
        let summary = summarize_scores(&[
            scored("A", 80.0, 40.0, 20.0),
            scored("B", 30.0, 60.0, 40.0),
            scored("C", 55.0, 50.0, 30.0),
        ])
        .unwrap();

        assert_eq!(summary.companies, 3);
        assert!((summary.avg_attitude - 55.0).abs() < 1e-9);
        assert!((summary.avg_china - 50.0).abs() < 1e-9);
        assert!((summary.avg_china_density - 30.0).abs() < 1e-9);
        assert!((summary.avg_non_china_density - 70.0).abs() < 1e-9);
        assert_eq!(summary.min_attitude, 30.0);
        assert_eq!(summary.max_attitude, 80.0);
    }

    #[test]
    fn test_summary_of_empty_year() {
        assert!(summarize_scores(&[]).is_none());
    }

    #[test]
    fn test_keyword_stats_rank_by_mean() {
        let rows = vec![
            row("A", "new plant", 0.2),
            row("B", "new plant", 0.4),
            row("A", "capex", 0.5),
            row("C", "hiring", 0.1),
        ];
        let stats = keyword_stats(&rows, 10);

        let order: Vec<&str> = stats.iter().map(|s| s.keyword.as_str()).collect();
        assert_eq!(order, vec!["capex", "new plant", "hiring"]);

        let plant = &stats[1];
        assert_eq!(plant.companies, 2);
        assert!((plant.avg_tfidf - 0.3).abs() < 1e-12);
        assert_eq!(plant.max_tfidf, 0.4);
    }

    #[test]
    fn test_keyword_stats_respect_limit() {
        let rows: Vec<TfIdfRow> = (0..30)
            .map(|i| row("A", &format!("kw{i:02}"), i as f64))
            .collect();
        let stats = keyword_stats(&rows, 5);
        assert_eq!(stats.len(), 5);
        assert_eq!(stats[0].keyword, "kw29");
    }
}
