// Keyword frequency — whole-word counts of fixed keyword families in a
// filing's full text, with a per-1000-word rate.
//
// Unlike the mined keyword lexicon this list never changes, so counts are
// comparable across years. Each family has spelling variants; a variant
// matches only on word boundaries ("risk" does not match "brisket"), and a
// family's count is the sum over its variants.

use anyhow::{Context, Result};
use regex_lite::Regex;

/// The fixed keyword families and their variants.
pub const KEYWORD_FAMILIES: &[(&str, &[&str])] = &[
    ("cost", &["cost", "costs"]),
    ("efficiency", &["efficiency", "efficient", "efficiently"]),
    ("profit", &["profit", "profits", "profitability", "profitable"]),
    ("resilience", &["resilience", "resilient"]),
    ("security", &["security", "secure"]),
    ("risk", &["risk", "risks", "risky"]),
    ("uncertainty", &["uncertainty", "uncertain", "uncertainties"]),
    ("diversification", &["diversification", "diversify", "diversified"]),
    ("localization", &["localization", "localize", "localized", "localisation"]),
    ("flexibility", &["flexibility", "flexible"]),
    ("continuity", &["continuity", "continuous"]),
    (
        "critical_inputs",
        &["critical input", "critical inputs", "critical material", "critical materials"],
    ),
    ("reconfiguration", &["reconfiguration", "reconfigure", "reconfigured"]),
    ("de_risking", &["de-risking", "de-risk", "derisking", "derisk"]),
    ("realignment", &["realignment", "realign", "realigned"]),
    ("volatility", &["volatility", "volatile"]),
];

/// One company-year's counts, in family order.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyRow {
    pub year: i32,
    pub ticker: String,
    pub company_name: String,
    pub total_words: usize,
    pub counts: Vec<usize>,
}

impl FrequencyRow {
    /// Occurrences per 1000 words of the family at `index`, rounded to two
    /// decimals. Zero for an empty text.
    pub fn per_thousand(&self, index: usize) -> f64 {
        per_thousand(self.counts[index], self.total_words)
    }
}

pub fn per_thousand(count: usize, total_words: usize) -> f64 {
    if total_words == 0 {
        return 0.0;
    }
    (count as f64 / total_words as f64 * 1000.0 * 100.0).round() / 100.0
}

/// Compiled matchers for a list of keyword families.
pub struct FrequencyCounter {
    families: Vec<(String, Vec<Regex>)>,
}

impl FrequencyCounter {
    pub fn new(families: &[(&str, &[&str])]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(families.len());
        for (name, variants) in families {
            let mut patterns = Vec::with_capacity(variants.len());
            for variant in *variants {
                let pattern = format!(r"\b{}\b", regex_lite::escape(&variant.to_lowercase()));
                patterns.push(
                    Regex::new(&pattern)
                        .with_context(|| format!("Bad keyword variant {variant:?}"))?,
                );
            }
            compiled.push((name.to_string(), patterns));
        }
        Ok(Self { families: compiled })
    }

    /// The built-in keyword families.
    pub fn standard() -> Result<Self> {
        Self::new(KEYWORD_FAMILIES)
    }

    pub fn family_names(&self) -> impl Iterator<Item = &str> {
        self.families.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Case-insensitive whole-word counts per family, plus the text's word
    /// count (whitespace separated).
    pub fn count(&self, text: &str) -> (Vec<usize>, usize) {
        let lower = text.to_lowercase();
        let counts = self
            .families
            .iter()
            .map(|(_, patterns)| patterns.iter().map(|re| re.find_iter(&lower).count()).sum())
            .collect();
        (counts, lower.split_whitespace().count())
    }
}

/// Per-year aggregate of one family's counts across companies.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilySummary {
    pub mean: f64,
    /// Upper median: the middle element of the sorted counts.
    pub median: usize,
    pub max: usize,
    pub total: usize,
}

/// Mean, median, max and total of each family's counts over `rows`, in
/// family order. Empty when there are no rows.
pub fn summarize_counts(rows: &[FrequencyRow], families: usize) -> Vec<FamilySummary> {
    if rows.is_empty() {
        return Vec::new();
    }

    (0..families)
        .map(|i| {
            let mut counts: Vec<usize> = rows.iter().map(|r| r.counts[i]).collect();
            counts.sort_unstable();
            let total: usize = counts.iter().sum();
            FamilySummary {
                mean: (total as f64 / counts.len() as f64 * 100.0).round() / 100.0,
                median: counts[counts.len() / 2],
                max: counts[counts.len() - 1],
                total,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(counts: Vec<usize>) -> FrequencyRow {
        FrequencyRow {
            year: 2023,
            ticker: "ACME".to_string(),
            company_name: "Acme".to_string(),
            total_words: 100,
            counts,
        }
    }

    #[test]
    fn test_variants_match_whole_words_only() {
        let counter = FrequencyCounter::new(&[("risk", &["risk", "risks", "risky"])]).unwrap();
        let (counts, words) = counter.count("Risk and risks abound. Brisket is risky; asterisks aren't.");
        assert_eq!(counts, vec![3]);
        assert_eq!(words, 9);
    }

    #[test]
    fn test_phrase_and_hyphenated_variants() {
        let counter = FrequencyCounter::new(&[
            ("critical_inputs", &["critical input", "critical inputs"]),
            ("de_risking", &["de-risking", "de-risk"]),
        ])
        .unwrap();
        let (counts, _) = counter.count(
            "Critical inputs are scarce. One critical input matters. \
             We de-risk by de-risking the chain.",
        );
        assert_eq!(counts, vec![2, 2]);
    }

    #[test]
    fn test_standard_families_compile_in_order() {
        let counter = FrequencyCounter::standard().unwrap();
        assert_eq!(counter.len(), KEYWORD_FAMILIES.len());
        assert_eq!(counter.family_names().next(), Some("cost"));
        let (counts, _) = counter.count("Costs rose while the volatile market stayed volatile.");
        assert_eq!(counts[0], 1);
        assert_eq!(counts[counter.len() - 1], 2);
    }

    #[test]
    fn test_per_thousand_rounds_and_guards_empty_text() {
        assert_eq!(per_thousand(1, 3), 333.33);
        assert_eq!(per_thousand(5, 0), 0.0);
        assert_eq!(row(vec![7]).per_thousand(0), 70.0);
    }

    #[test]
    fn test_summarize_counts() {
        let rows = vec![row(vec![1, 0]), row(vec![4, 0]), row(vec![2, 3]), row(vec![9, 0])];
        let summary = summarize_counts(&rows, 2);
        assert_eq!(summary[0].total, 16);
        assert_eq!(summary[0].mean, 4.0);
        // sorted [1, 2, 4, 9], upper middle
        assert_eq!(summary[0].median, 4);
        assert_eq!(summary[0].max, 9);
        assert_eq!(summary[1].total, 3);
        assert!(summarize_counts(&[], 2).is_empty());
    }
}
