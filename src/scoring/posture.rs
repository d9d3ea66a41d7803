// Investment posture scores — NSS with log-density correction.
//
// Each company's TF-IDF rows are summed per keyword category. Two stance
// scores (overall attitude, China attitude) use a normalized sentiment
// score (NSS) mapped to 0-100 and pulled toward 50 when the company's total
// keyword mass is small:
//
//   NSS    = (pos_d - neg_d) / (pos_d + neg_d + eps)
//   mid    = (NSS + 1) * 50
//   factor = ln(1 + k * total)
//   score  = clamp(50 + (mid - 50) * factor, 0, 100)
//
// The non-China score is different in kind: it measures attention, not
// stance, as a z-score of the company's non-China density against every
// other company in the same year.

use std::collections::BTreeMap;

use crate::db::models::{KeywordCategory, QuantScore, TfIdfRow};

/// Configurable constants for the posture formulas.
pub struct PostureWeights {
    /// Density correction constant k (default 5.0). Larger values let
    /// sparse evidence move scores further from neutral.
    pub density_k: f64,
    /// Guards every division (default 1e-9).
    pub eps: f64,
}

impl Default for PostureWeights {
    fn default() -> Self {
        Self {
            density_k: 5.0,
            eps: 1e-9,
        }
    }
}

/// Per-company TF-IDF mass by category.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CategorySums {
    pub expansion: f64,
    pub contraction: f64,
    pub china_positive: f64,
    pub china_negative: f64,
    pub non_china: f64,
    /// Number of rows summed, including rows of unknown category.
    pub keyword_count: u32,
}

impl CategorySums {
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a TfIdfRow>) -> Self {
        let mut sums = Self::default();
        for row in rows {
            sums.keyword_count += 1;
            match row.category {
                KeywordCategory::Expansion => sums.expansion += row.tfidf,
                KeywordCategory::Contraction => sums.contraction += row.tfidf,
                KeywordCategory::ChinaPositive => sums.china_positive += row.tfidf,
                KeywordCategory::ChinaNegative => sums.china_negative += row.tfidf,
                KeywordCategory::NonChinaRegions => sums.non_china += row.tfidf,
                KeywordCategory::Unknown => {}
            }
        }
        sums
    }

    /// Sum of the five categories plus eps.
    pub fn total(&self, eps: f64) -> f64 {
        self.expansion + self.contraction + self.china_positive + self.china_negative + self.non_china
            + eps
    }
}

/// Density-corrected NSS score in [0, 100].
pub fn density_corrected_nss(positive: f64, negative: f64, total: f64, weights: &PostureWeights) -> f64 {
    let eps = weights.eps;
    let pos_d = positive / total;
    let neg_d = negative / total;
    let nss = (pos_d - neg_d) / (pos_d + neg_d + eps);
    let mid = (nss + 1.0) * 50.0;
    let factor = (weights.density_k * total).ln_1p();
    (50.0 + (mid - 50.0) * factor).clamp(0.0, 100.0)
}

/// China and non-China shares of total mass (percent), plus the pair
/// normalized so the larger one is 100. Both normalized values are 50 when
/// neither region has any mass.
pub fn investment_densities(sums: &CategorySums, total: f64) -> (f64, f64, f64, f64) {
    let china = sums.china_positive / total * 100.0;
    let non_china = sums.non_china / total * 100.0;
    let max = china.max(non_china);
    if max > 0.0 {
        (china, non_china, china / max * 100.0, non_china / max * 100.0)
    } else {
        (china, non_china, 50.0, 50.0)
    }
}

/// Population mean and standard deviation.
fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Score every company with at least one TF-IDF row in the year.
///
/// Two passes: the first collects each company's non-China density to get
/// the year's distribution, the second produces the scores. Output is
/// ordered by ticker.
pub fn score_year(year: i32, rows: &[TfIdfRow], weights: &PostureWeights) -> Vec<QuantScore> {
    let mut grouped: BTreeMap<&str, Vec<&TfIdfRow>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.ticker.as_str()).or_default().push(row);
    }

    let companies: Vec<(&str, CategorySums, f64)> = grouped
        .into_iter()
        .map(|(ticker, rows)| {
            let sums = CategorySums::from_rows(rows);
            let total = sums.total(weights.eps);
            (ticker, sums, total)
        })
        .collect();

    let nc_densities: Vec<f64> = companies
        .iter()
        .map(|(_, sums, total)| sums.non_china / total)
        .collect();
    let (nc_mean, nc_std) = mean_std(&nc_densities);
    let nc_std = nc_std + weights.eps;

    companies
        .into_iter()
        .zip(nc_densities)
        .map(|((ticker, sums, total), nc_d)| {
            let attitude = density_corrected_nss(sums.expansion, sums.contraction, total, weights);
            let china = density_corrected_nss(sums.china_positive, sums.china_negative, total, weights);
            let z = (nc_d - nc_mean) / nc_std;
            let non_china = (z * 10.0 + 50.0).clamp(0.0, 100.0);
            let (china_d, non_china_d, china_norm, non_china_norm) = investment_densities(&sums, total);

            QuantScore {
                ticker: ticker.to_string(),
                year,
                investment_attitude_score: attitude,
                expansion_score: sums.expansion,
                contraction_score: sums.contraction,
                china_investment_score: china,
                china_positive_score: sums.china_positive,
                china_negative_score: sums.china_negative,
                non_china_investment_score: non_china,
                non_china_raw_score: sums.non_china,
                china_investment_density: china_d,
                non_china_investment_density: non_china_d,
                china_investment_density_normalized: china_norm,
                non_china_investment_density_normalized: non_china_norm,
                total_keywords_count: sums.keyword_count,
            }
        })
        .collect()
}
