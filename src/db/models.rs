// Data models — Rust structs that map to database rows.
//
// These are the types that flow through the application. They're separate
// from the database queries so other modules can use them without depending
// on rusqlite directly.

use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize a field that the extraction service may send as `null`.
/// Missing and null both become the type's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Stance of a classified text segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentCategory {
    Expansion,
    Contraction,
    #[default]
    Neutral,
    /// Anything the service invents outside the three known labels.
    #[serde(other)]
    Other,
}

impl SegmentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentCategory::Expansion => "expansion",
            SegmentCategory::Contraction => "contraction",
            SegmentCategory::Neutral => "neutral",
            SegmentCategory::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "expansion" => SegmentCategory::Expansion,
            "contraction" => SegmentCategory::Contraction,
            "neutral" => SegmentCategory::Neutral,
            _ => SegmentCategory::Other,
        }
    }
}

/// Subject area of a classified text segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentType {
    Investment,
    Trade,
    SupplyChain,
    Policy,
    #[default]
    #[serde(other)]
    Other,
}

impl SegmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Investment => "investment",
            SegmentType::Trade => "trade",
            SegmentType::SupplyChain => "supply_chain",
            SegmentType::Policy => "policy",
            SegmentType::Other => "other",
        }
    }
}

/// A verbatim passage lifted from a filing, with its classification.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: SegmentCategory,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub segment_type: SegmentType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_section: String,
}

/// A segment as read back from the corpus for one year.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusSegment {
    pub ticker: String,
    pub text: String,
    pub category: SegmentCategory,
}

/// The keyword categories that feed the posture scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordCategory {
    Expansion,
    Contraction,
    ChinaPositive,
    ChinaNegative,
    NonChinaRegions,
    #[serde(other)]
    Unknown,
}

impl KeywordCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeywordCategory::Expansion => "expansion",
            KeywordCategory::Contraction => "contraction",
            KeywordCategory::ChinaPositive => "china_positive",
            KeywordCategory::ChinaNegative => "china_negative",
            KeywordCategory::NonChinaRegions => "non_china_regions",
            KeywordCategory::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "expansion" => KeywordCategory::Expansion,
            "contraction" => KeywordCategory::Contraction,
            "china_positive" => KeywordCategory::ChinaPositive,
            "china_negative" => KeywordCategory::ChinaNegative,
            "non_china_regions" => KeywordCategory::NonChinaRegions,
            _ => KeywordCategory::Unknown,
        }
    }
}

impl std::fmt::Display for KeywordCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A scoring keyword, shared across all years. `keyword` is always lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub keyword: String,
    pub category: KeywordCategory,
}

/// A keyword as mined from the corpus, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinedKeyword {
    pub keyword: String,
    pub category: KeywordCategory,
    pub context: String,
    pub method: String,
}

/// One (company, keyword) membership row carrying the year-wide weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfIdfRow {
    pub ticker: String,
    pub year: i32,
    pub keyword: String,
    pub category: KeywordCategory,
    pub tf: f64,
    pub idf: f64,
    pub tfidf: f64,
}

/// The scores persisted for one company in one year.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuantScore {
    pub ticker: String,
    pub year: i32,
    pub investment_attitude_score: f64,
    pub expansion_score: f64,
    pub contraction_score: f64,
    pub china_investment_score: f64,
    pub china_positive_score: f64,
    pub china_negative_score: f64,
    pub non_china_investment_score: f64,
    pub non_china_raw_score: f64,
    pub china_investment_density: f64,
    pub non_china_investment_density: f64,
    pub china_investment_density_normalized: f64,
    pub non_china_investment_density_normalized: f64,
    pub total_keywords_count: u32,
}

/// A company's filing record for one year.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub ticker: String,
    pub year: i32,
    pub cik: String,
    pub company_name: String,
    pub fiscal_year_end: String,
    pub report_date: String,
    pub file_path: String,
}

/// Row counts for one year, used by `status`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YearSummary {
    pub year: i32,
    pub companies: i64,
    pub companies_with_segments: i64,
    pub segments: i64,
    pub tfidf_rows: i64,
    pub scores: i64,
}

/// A score row joined with its company name, for reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCompany {
    pub company_name: String,
    pub score: QuantScore,
}
