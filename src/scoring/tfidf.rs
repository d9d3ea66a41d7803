// Year-scoped TF-IDF over the classified corpus.
//
// Weights are corpus-wide: the whole year's segments form one document for
// term frequency, and each segment is a document for IDF. A company's rows
// only record which surviving keywords occur in its own text; every row
// carries the year-global weight.
//
// Matching is plain substring search on lowercased text, so multi-word
// phrases work without a tokenizer. A keyword can also match inside a
// longer word ("risk" in "brisket"); that approximation is accepted.

use std::collections::{BTreeMap, HashSet};

use crate::db::models::{CorpusSegment, Keyword, KeywordCategory, TfIdfRow};

/// Year-global weight of one keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordWeight {
    pub keyword: String,
    pub category: KeywordCategory,
    pub tf: f64,
    pub idf: f64,
    pub tfidf: f64,
}

pub struct TfIdfEngine {
    keywords: Vec<Keyword>,
}

impl TfIdfEngine {
    /// Keywords are lowercased and trimmed; empty keywords are dropped and
    /// duplicates keep their first category.
    pub fn new(keywords: &[Keyword]) -> Self {
        let mut seen = HashSet::new();
        let keywords = keywords
            .iter()
            .filter_map(|kw| {
                let text = kw.keyword.trim().to_lowercase();
                if text.is_empty() || !seen.insert(text.clone()) {
                    return None;
                }
                Some(Keyword {
                    keyword: text,
                    category: kw.category,
                })
            })
            .collect();
        Self { keywords }
    }

    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }

    /// Weights for every keyword with a positive TF-IDF over `texts`.
    ///
    /// `texts` are one year's segment texts; empty ones are ignored.
    pub fn weights(&self, texts: &[&str]) -> Vec<KeywordWeight> {
        let segments: Vec<String> = texts
            .iter()
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect();
        if segments.is_empty() {
            return Vec::new();
        }

        let full_corpus = segments.join(" ");
        let total_words = full_corpus.split_whitespace().count();
        let total_segments = segments.len() as f64;

        self.keywords
            .iter()
            .filter_map(|kw| {
                let tf = if total_words > 0 {
                    full_corpus.matches(kw.keyword.as_str()).count() as f64 / total_words as f64
                } else {
                    0.0
                };

                let segment_count = segments
                    .iter()
                    .filter(|s| s.contains(kw.keyword.as_str()))
                    .count();
                // Absent from every segment: idf 0, so the keyword is skipped
                let idf = if segment_count > 0 {
                    (total_segments / segment_count as f64).ln()
                } else {
                    0.0
                };

                let tfidf = tf * idf;
                (tfidf > 0.0).then(|| KeywordWeight {
                    keyword: kw.keyword.clone(),
                    category: kw.category,
                    tf,
                    idf,
                    tfidf,
                })
            })
            .collect()
    }

    /// All TF-IDF rows for one year's corpus, ordered by ticker then by
    /// keyword order.
    pub fn compute(&self, year: i32, corpus: &[CorpusSegment]) -> Vec<TfIdfRow> {
        let texts: Vec<&str> = corpus.iter().map(|s| s.text.as_str()).collect();
        let weights = self.weights(&texts);
        if weights.is_empty() {
            return Vec::new();
        }

        let mut by_company: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for segment in corpus {
            by_company
                .entry(segment.ticker.as_str())
                .or_default()
                .push(segment.text.as_str());
        }

        let mut rows = Vec::new();
        for (ticker, texts) in by_company {
            let company_text = texts.join(" ").to_lowercase();
            for weight in &weights {
                if company_text.contains(weight.keyword.as_str()) {
                    rows.push(TfIdfRow {
                        ticker: ticker.to_string(),
                        year,
                        keyword: weight.keyword.clone(),
                        category: weight.category,
                        tf: weight.tf,
                        idf: weight.idf,
                        tfidf: weight.tfidf,
                    });
                }
            }
        }
        rows
    }
}
