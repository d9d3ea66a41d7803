// Colored terminal output for score tables, batch summaries, keyword
// frequencies and diagnoses.
//
// This module handles all terminal-specific formatting: colors and tables.
// main.rs delegates here.

use std::collections::BTreeMap;
use std::path::Path;

use colored::Colorize;

use super::truncate_chars;
use crate::db::models::{CompanyRecord, ScoredCompany};
use crate::pipeline::corpus::{BatchSummary, DocumentOutcome};
use crate::scoring::frequency::{per_thousand, FrequencyRow};
use crate::status::Diagnosis;

/// Rows listed per section before the rest are counted.
const LIST_LIMIT: usize = 20;

/// Display one year's ranked score table.
pub fn display_score_table(year: i32, companies: &[ScoredCompany]) {
    if companies.is_empty() {
        println!("No scores for {year}. Run `posture score` first.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Investment Posture {year} ({} companies) ===", companies.len()).bold()
    );
    println!();

    println!(
        "  {:>4}  {:<8} {:<28} {:>8} {:>7} {:>7} {:>7} {:>7} {:>5}",
        "Rank".dimmed(),
        "Ticker".dimmed(),
        "Company".dimmed(),
        "Attitude".dimmed(),
        "China".dimmed(),
        "NonCN".dimmed(),
        "CN d%".dimmed(),
        "NC d%".dimmed(),
        "Kw".dimmed(),
    );
    println!("  {}", "-".repeat(96).dimmed());

    for (i, company) in companies.iter().enumerate() {
        let s = &company.score;
        println!(
            "  {:>4}. {:<8} {:<28} {} {} {:>7.1} {:>7.1} {:>7.1} {:>5}",
            i + 1,
            s.ticker,
            truncate_chars(&company.company_name, 25),
            colorize_score(s.investment_attitude_score, 8),
            colorize_score(s.china_investment_score, 7),
            s.non_china_investment_score,
            s.china_investment_density,
            s.non_china_investment_density,
            s.total_keywords_count,
        );
    }

    println!();

    let expanding = companies
        .iter()
        .filter(|c| c.score.investment_attitude_score >= 60.0)
        .count();
    let contracting = companies
        .iter()
        .filter(|c| c.score.investment_attitude_score <= 40.0)
        .count();
    if expanding > 0 {
        println!("  {} {} expanding", "+".green().bold(), expanding);
    }
    if contracting > 0 {
        println!("  {} {} contracting", "-".red().bold(), contracting);
    }
}

/// Display the outcome of a corpus build.
pub fn display_batch_summary(summary: &BatchSummary) {
    println!("\n{}", "=== Corpus Build ===".bold());
    println!("  Documents:  {}", summary.total());
    println!("  {}  {}", "Succeeded:".green(), summary.succeeded());
    println!("  {}      {}", "Empty:".yellow(), summary.empty());
    println!("  {}     {}", "Failed:".red(), summary.failed());
    println!("  Segments:   {}", summary.segments());

    let problems: Vec<_> = summary
        .reports
        .iter()
        .filter(|r| !matches!(r.outcome, DocumentOutcome::Success { .. }))
        .collect();
    if problems.is_empty() {
        return;
    }

    println!("\n  {}", "Documents needing attention:".bold());
    for report in problems {
        let name = display_name(&report.path);
        match &report.outcome {
            DocumentOutcome::Empty => {
                println!("    {} {}", "empty ".yellow(), name);
            }
            DocumentOutcome::Failed(reason) => {
                println!(
                    "    {} {} {}",
                    "failed".red(),
                    name,
                    truncate_chars(reason, 100).dimmed()
                );
            }
            DocumentOutcome::Success { .. } => {}
        }
    }

    if summary.empty() > 0 {
        println!(
            "\n{}",
            "Empty documents can be retried with `posture retry-failed --year <YEAR>`.".dimmed()
        );
    }
}

/// List companies of a year with no stored segments.
pub fn display_missing_companies(year: i32, companies: &[CompanyRecord]) {
    if companies.is_empty() {
        println!("Every {year} company has corpus segments.");
        return;
    }

    println!(
        "\n{}",
        format!("=== {year}: {} companies without segments ===", companies.len()).bold()
    );
    for company in companies {
        println!(
            "  {:<10} {:<30} {}",
            company.ticker,
            truncate_chars(&company.company_name, 28),
            company.file_path.dimmed()
        );
    }
}

/// Display per-year keyword family totals and rates.
pub fn display_frequency(families: &[&str], rows: &[FrequencyRow]) {
    if rows.is_empty() {
        println!("No filings could be read. Check the file paths in `posture diagnose`.");
        return;
    }

    let mut by_year: BTreeMap<i32, Vec<&FrequencyRow>> = BTreeMap::new();
    for row in rows {
        by_year.entry(row.year).or_default().push(row);
    }

    for (year, year_rows) in by_year {
        let words: usize = year_rows.iter().map(|r| r.total_words).sum();
        println!(
            "\n{}",
            format!("=== Keyword Frequency {year} ({} companies) ===", year_rows.len()).bold()
        );
        println!(
            "\n  {:<18} {:>8} {:>10} {:>8} {:>10}",
            "Keyword".dimmed(),
            "Total".dimmed(),
            "Companies".dimmed(),
            "Max".dimmed(),
            "Per 1k".dimmed(),
        );
        println!("  {}", "-".repeat(58).dimmed());
        for (i, name) in families.iter().enumerate() {
            let total: usize = year_rows.iter().map(|r| r.counts[i]).sum();
            let mentioning = year_rows.iter().filter(|r| r.counts[i] > 0).count();
            let max = year_rows.iter().map(|r| r.counts[i]).max().unwrap_or(0);
            println!(
                "  {:<18} {:>8} {:>10} {:>8} {:>10.2}",
                name,
                total,
                mentioning,
                max,
                per_thousand(total, words)
            );
        }
    }
}

/// Display a disk-versus-database comparison.
pub fn display_diagnosis(diagnosis: &Diagnosis) {
    for year in &diagnosis.years {
        println!("\n{}", format!("=== Diagnosis {} ===", year.year).bold());
        println!("  Files on disk:       {}", year.files_on_disk);
        println!("  Companies on record: {}", year.companies);
        println!("  {}       {}", "With segments:".green(), year.companies_with_segments);
        println!("  {}    {}", "Without segments:".yellow(), year.failed.len());
        println!("  {}         {}", "Unprocessed:".red(), year.unprocessed.len());

        if !year.failed.is_empty() {
            println!("\n  {}", "Companies without segments:".bold());
            for company in year.failed.iter().take(LIST_LIMIT) {
                println!(
                    "    {:<10} {}",
                    company.ticker,
                    truncate_chars(&company.company_name, 40)
                );
            }
            print_more(year.failed.len());
        }

        if !year.unprocessed.is_empty() {
            println!("\n  {}", "Files never processed:".bold());
            for path in year.unprocessed.iter().take(LIST_LIMIT) {
                println!("    {}", display_name(path));
            }
            print_more(year.unprocessed.len());
        }

        if !year.failed.is_empty() {
            println!(
                "\n{}",
                format!("Retry the empty ones with `posture retry-failed --year {}`.", year.year)
                    .dimmed()
            );
        }
        if !year.unprocessed.is_empty() {
            println!("{}", "Build the unprocessed files with `posture build <paths>`.".dimmed());
        }
    }

    if !diagnosis.unrecognized.is_empty() {
        println!(
            "\n{}",
            format!("{} files with unrecognized names:", diagnosis.unrecognized.len()).yellow()
        );
        for path in diagnosis.unrecognized.iter().take(LIST_LIMIT) {
            println!("    {}", display_name(path));
        }
        print_more(diagnosis.unrecognized.len());
    }
}

fn print_more(total: usize) {
    if total > LIST_LIMIT {
        println!("    {}", format!("... and {} more", total - LIST_LIMIT).dimmed());
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Color a 0-100 stance score: green above neutral, red below.
fn colorize_score(score: f64, width: usize) -> colored::ColoredString {
    let text = format!("{score:>width$.1}");
    if score >= 60.0 {
        text.green()
    } else if score <= 40.0 {
        text.red()
    } else {
        text.normal()
    }
}
