// System status display — DB size, years on record, per-year progress.
//
// `diagnose` adds the disk side: which filings never made it into the
// database at all, next to the companies whose extraction came back empty.

use anyhow::Result;
use colored::Colorize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::db::models::CompanyRecord;
use crate::db::Database;
use crate::filing::FilingMetadata;

/// Display system status to the terminal.
pub async fn show(db: &Arc<dyn Database>, db_display_path: &str) -> Result<()> {
    // Database file size
    let file_size = std::fs::metadata(db_display_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_display_path, file_size);

    let keywords = db.keyword_count().await?;
    if keywords == 0 {
        println!("Keywords: none mined yet");
        println!("  Run `posture keywords` after building the corpus");
    } else {
        println!("Keywords: {keywords}");
    }

    let years = db.get_years().await?;
    if years.is_empty() {
        println!("Years: none");
        println!("  Run `posture build <filings>` to extract a corpus");
        return Ok(());
    }

    println!(
        "\n  {:>6} {:>10} {:>14} {:>10} {:>10} {:>8}",
        "Year".dimmed(),
        "Companies".dimmed(),
        "With segments".dimmed(),
        "Segments".dimmed(),
        "TF-IDF".dimmed(),
        "Scores".dimmed(),
    );
    for year in years {
        let summary = db.year_summary(year).await?;
        let missing = summary.companies - summary.companies_with_segments;
        let with_segments = format!("{:>14}", summary.companies_with_segments);
        println!(
            "  {:>6} {:>10} {} {:>10} {:>10} {:>8}",
            summary.year,
            summary.companies,
            if missing > 0 {
                with_segments.yellow()
            } else {
                with_segments.normal()
            },
            summary.segments,
            summary.tfidf_rows,
            summary.scores,
        );
    }

    Ok(())
}

/// One year's filings on disk compared with what the database holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YearDiagnosis {
    pub year: i32,
    pub files_on_disk: usize,
    pub companies: i64,
    pub companies_with_segments: i64,
    /// Companies on record whose extraction stored no segments.
    pub failed: Vec<CompanyRecord>,
    /// Files whose name matches no stored company's file path.
    pub unprocessed: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnosis {
    pub years: Vec<YearDiagnosis>,
    /// Files whose name doesn't parse as a filing, so they have no year.
    pub unrecognized: Vec<PathBuf>,
}

/// Compare `files` with the database, year by year. With `only_year`, other
/// years' files are ignored and that year is reported even with no files.
pub async fn diagnose(
    db: &Arc<dyn Database>,
    files: &[PathBuf],
    only_year: Option<i32>,
) -> Result<Diagnosis> {
    let mut by_year: BTreeMap<i32, Vec<PathBuf>> = BTreeMap::new();
    let mut unrecognized = Vec::new();
    for file in files {
        match FilingMetadata::from_path(file) {
            Ok(meta) if !matches!(only_year, Some(y) if y != meta.year) => {
                by_year.entry(meta.year).or_default().push(file.clone());
            }
            Ok(_) => {}
            Err(_) => unrecognized.push(file.clone()),
        }
    }
    if let Some(year) = only_year {
        by_year.entry(year).or_default();
    }

    let mut years = Vec::with_capacity(by_year.len());
    for (year, year_files) in by_year {
        let summary = db.year_summary(year).await?;
        let stored: BTreeSet<String> = db
            .get_companies(year)
            .await?
            .iter()
            .filter_map(|c| file_name(Path::new(&c.file_path)))
            .collect();

        let unprocessed = year_files
            .iter()
            .filter(|f| !matches!(file_name(f), Some(name) if stored.contains(&name)))
            .cloned()
            .collect();

        years.push(YearDiagnosis {
            year,
            files_on_disk: year_files.len(),
            companies: summary.companies,
            companies_with_segments: summary.companies_with_segments,
            failed: db.get_companies_without_segments(year).await?,
            unprocessed,
        });
    }

    Ok(Diagnosis {
        years,
        unrecognized,
    })
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Whether a database file exists at `db_path`.
pub fn is_initialized(db_path: &str) -> bool {
    Path::new(db_path).exists()
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
