// Filing documents — metadata from file names, text loading, discovery.
//
// Filings arrive as plain-text files named
//
//   {cik}_{fiscal_year_end}_{ticker}_{company name words...}_{form}_{report_date}.txt
//
// where the company name's spaces were replaced by underscores. The data
// year is the leading component of the fiscal year end.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex_lite::Regex;
use walkdir::WalkDir;

/// Ticker placeholders that mean "look it up".
const UNRESOLVED_TICKERS: &[&str] = &["", "none", "unknown"];

#[derive(Debug, Clone, PartialEq)]
pub struct FilingMetadata {
    pub cik: String,
    pub fiscal_year_end: String,
    pub ticker: String,
    pub company_name: String,
    pub form_type: String,
    pub report_date: String,
    pub year: i32,
    pub needs_ticker_resolution: bool,
}

impl FilingMetadata {
    pub fn from_path(path: &Path) -> Result<Self> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("Filing path has no usable file name: {}", path.display()))?;
        Self::parse_stem(stem)
    }

    pub fn parse_stem(stem: &str) -> Result<Self> {
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() < 6 {
            anyhow::bail!(
                "Unrecognized filing name {stem:?}: expected \
                 cik_fiscalYearEnd_ticker_company..._form_reportDate"
            );
        }

        let fiscal_year_end = parts[1];
        let year = fiscal_year_end
            .split('-')
            .next()
            .and_then(|lead| lead.get(..4))
            .and_then(|digits| digits.parse::<i32>().ok())
            .with_context(|| format!("No year in fiscal year end {fiscal_year_end:?} of {stem:?}"))?;

        let ticker = parts[2].trim();
        let n = parts.len();

        Ok(Self {
            cik: parts[0].to_string(),
            fiscal_year_end: fiscal_year_end.to_string(),
            ticker: ticker.to_string(),
            company_name: parts[3..n - 2].join(" "),
            form_type: parts[n - 2].to_string(),
            report_date: parts[n - 1].to_string(),
            year,
            needs_ticker_resolution: UNRESOLVED_TICKERS.contains(&ticker.to_lowercase().as_str()),
        })
    }
}

/// Collapse blank-line runs to one paragraph break and space runs to one
/// space, so paragraph splitting and token estimates see clean text.
pub fn normalize_text(raw: &str) -> String {
    static BLANK_LINES: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();

    let blank_lines =
        BLANK_LINES.get_or_init(|| Regex::new(r"\n\s*\n+").expect("static pattern"));
    let spaces = SPACES.get_or_init(|| Regex::new(r" +").expect("static pattern"));

    let text = raw.replace("\r\n", "\n");
    let text = blank_lines.replace_all(&text, "\n\n");
    let text = spaces.replace_all(&text, " ");
    text.trim().to_string()
}

/// Read and normalize a filing's text.
pub fn read_filing(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read filing {}", path.display()))?;
    Ok(normalize_text(&raw))
}

/// Expand the given paths into a list of filing files.
///
/// Files are taken as given. Directories are walked recursively for `.txt`
/// files, sorted by path, and truncated to `limit` per directory.
pub fn discover(paths: &[PathBuf], limit: Option<usize>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        if !path.is_dir() {
            anyhow::bail!("No such file or directory: {}", path.display());
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(path).follow_links(true) {
            let entry =
                entry.with_context(|| format!("Failed to walk {}", path.display()))?;
            let is_txt = entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
            if entry.file_type().is_file() && is_txt {
                found.push(entry.into_path());
            }
        }
        found.sort();
        if let Some(limit) = limit {
            found.truncate(limit);
        }
        files.extend(found);
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_name() {
        let meta = FilingMetadata::parse_stem(
            "0000320193_2023-09-30_AAPL_Apple_Inc._10-K_2023-11-03",
        )
        .unwrap();
        assert_eq!(meta.cik, "0000320193");
        assert_eq!(meta.ticker, "AAPL");
        assert_eq!(meta.company_name, "Apple Inc.");
        assert_eq!(meta.form_type, "10-K");
        assert_eq!(meta.report_date, "2023-11-03");
        assert_eq!(meta.year, 2023);
        assert!(!meta.needs_ticker_resolution);
    }

    #[test]
    fn test_parse_compact_fiscal_year_end() {
        let meta =
            FilingMetadata::parse_stem("123_20221231_None_Acme_Widgets_Co_10-K_20230301").unwrap();
        assert_eq!(meta.year, 2022);
        assert_eq!(meta.company_name, "Acme Widgets Co");
        assert!(meta.needs_ticker_resolution);
    }

    #[test]
    fn test_blank_and_unknown_tickers_need_resolution() {
        for ticker in ["", "UNKNOWN", "none"] {
            let stem = format!("123_2022-12-31_{ticker}_Acme_10-K_2023-03-01");
            assert!(FilingMetadata::parse_stem(&stem).unwrap().needs_ticker_resolution);
        }
    }

    #[test]
    fn test_short_name_is_rejected() {
        assert!(FilingMetadata::parse_stem("123_2022_ACME_10-K").is_err());
    }

    #[test]
    fn test_missing_year_is_rejected() {
        assert!(FilingMetadata::parse_stem("123_FY_ACME_Acme_10-K_2023-03-01").is_err());
    }

    #[test]
    fn test_normalize_text_collapses_whitespace() {
        let raw = "Item 1.  Business\r\n\r\n\r\n   \nWe   make   widgets.\n\n\nItem 7.";
        assert_eq!(
            normalize_text(raw),
            "Item 1. Business\n\nWe make widgets.\n\nItem 7."
        );
    }

    #[test]
    fn test_discover_walks_sorted_txt_with_limit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        for name in ["b.txt", "a.txt", "sub/c.txt", "notes.md"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }

        let all = discover(&[dir.path().to_path_buf()], None).unwrap();
        let names: Vec<String> = all
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub/c.txt"]);

        let limited = discover(&[dir.path().to_path_buf()], Some(2)).unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_discover_missing_path_fails() {
        assert!(discover(&[PathBuf::from("/definitely/not/here")], None).is_err());
    }
}
