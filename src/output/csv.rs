// CSV export for keyword frequencies: one detail file with a row per
// company-year, and a summary file with a row per year.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::scoring::frequency::{summarize_counts, FrequencyRow};

/// Write the detail and summary files. The summary goes next to `output_path`
/// with `_summary` added to the file stem. Returns both paths.
pub fn write_frequency(
    families: &[&str],
    rows: &[FrequencyRow],
    output_path: &str,
) -> Result<(PathBuf, PathBuf)> {
    let detail = PathBuf::from(output_path);
    let summary = summary_path(&detail);

    if let Some(parent) = detail.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for {output_path}"))?;
        }
    }

    std::fs::write(&detail, frequency_csv(families, rows))
        .with_context(|| format!("Failed to write {}", detail.display()))?;
    std::fs::write(&summary, frequency_summary_csv(families, rows))
        .with_context(|| format!("Failed to write {}", summary.display()))?;

    Ok((detail, summary))
}

/// `year,ticker,company_name,total_words` then `{family}_count,{family}_freq`
/// for each family.
pub fn frequency_csv(families: &[&str], rows: &[FrequencyRow]) -> String {
    let mut header = vec![
        "year".to_string(),
        "ticker".to_string(),
        "company_name".to_string(),
        "total_words".to_string(),
    ];
    for name in families {
        header.push(format!("{name}_count"));
        header.push(format!("{name}_freq"));
    }

    let mut out = record(&header);
    for row in rows {
        let mut fields = vec![
            row.year.to_string(),
            row.ticker.clone(),
            row.company_name.clone(),
            row.total_words.to_string(),
        ];
        for (i, count) in row.counts.iter().enumerate() {
            fields.push(count.to_string());
            fields.push(row.per_thousand(i).to_string());
        }
        out.push_str(&record(&fields));
    }
    out
}

/// `year,companies` then mean, median, max and total counts per family.
pub fn frequency_summary_csv(families: &[&str], rows: &[FrequencyRow]) -> String {
    let mut header = vec!["year".to_string(), "companies".to_string()];
    for name in families {
        for stat in ["mean", "median", "max", "total"] {
            header.push(format!("{name}_{stat}"));
        }
    }

    let mut by_year: BTreeMap<i32, Vec<FrequencyRow>> = BTreeMap::new();
    for row in rows {
        by_year.entry(row.year).or_default().push(row.clone());
    }

    let mut out = record(&header);
    for (year, year_rows) in by_year {
        let mut fields = vec![year.to_string(), year_rows.len().to_string()];
        for family in summarize_counts(&year_rows, families.len()) {
            fields.push(family.mean.to_string());
            fields.push(family.median.to_string());
            fields.push(family.max.to_string());
            fields.push(family.total.to_string());
        }
        out.push_str(&record(&fields));
    }
    out
}

fn summary_path(detail: &Path) -> PathBuf {
    let stem = detail
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "keyword-frequency".to_string());
    let name = match detail.extension() {
        Some(ext) => format!("{stem}_summary.{}", ext.to_string_lossy()),
        None => format!("{stem}_summary"),
    };
    detail.with_file_name(name)
}

fn record(fields: &[String]) -> String {
    let mut line = fields.iter().map(|f| field(f)).collect::<Vec<_>>().join(",");
    line.push('\n');
    line
}

/// Quote a field if it holds a comma, quote or line break.
fn field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
