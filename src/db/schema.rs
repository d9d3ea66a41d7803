// Database schema — table creation and migrations.
//
// We use a simple version-based migration approach: a `schema_version` table
// tracks which migrations have run, and each migration is a function that
// executes SQL statements.
//
// Every year-scoped table carries a `data_year` column; years never share
// rows, and all derived data is queried one year at a time.

use anyhow::{Context, Result};
use rusqlite::Connection;

use super::normalize::DIMENSIONS;

/// Create all tables if they don't exist yet.
///
/// This is idempotent — safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Shared across all years; keyword text is lowercase
        CREATE TABLE IF NOT EXISTS keywords (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            keyword TEXT NOT NULL UNIQUE,
            keyword_category TEXT NOT NULL,
            extraction_method TEXT,
            context TEXT
        );

        CREATE TABLE IF NOT EXISTS companies (
            ticker TEXT NOT NULL,
            data_year INTEGER NOT NULL,
            cik TEXT,
            company_name TEXT,
            fiscal_year_end TEXT,
            report_date TEXT,
            file_path TEXT,
            processed_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (ticker, data_year)
        );

        -- Verbatim passages, one row per classified segment
        CREATE TABLE IF NOT EXISTS corpus_segments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticker TEXT NOT NULL,
            data_year INTEGER NOT NULL,
            text_segment TEXT NOT NULL,
            segment_type TEXT,
            segment_category TEXT,
            source_section TEXT
        );

        -- Rebuilt wholesale per year
        CREATE TABLE IF NOT EXISTS tfidf_scores (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticker TEXT NOT NULL,
            data_year INTEGER NOT NULL,
            keyword TEXT NOT NULL,
            keyword_category TEXT NOT NULL,
            tf REAL NOT NULL,
            idf REAL NOT NULL,
            tfidf REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS quantitative_scores (
            ticker TEXT NOT NULL,
            data_year INTEGER NOT NULL,
            investment_attitude_score REAL,        -- 0 to 100
            expansion_score REAL,
            contraction_score REAL,
            china_investment_score REAL,           -- 0 to 100
            china_positive_score REAL,
            china_negative_score REAL,
            non_china_investment_score REAL,       -- 0 to 100, relative to the year
            non_china_raw_score REAL,
            china_investment_density REAL,
            non_china_investment_density REAL,
            china_investment_density_normalized REAL,
            non_china_investment_density_normalized REAL,
            total_keywords_count INTEGER,
            calculated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (ticker, data_year)
        );

        CREATE TABLE IF NOT EXISTS foreign_investments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticker TEXT NOT NULL,
            data_year INTEGER NOT NULL,
            investment_type TEXT,
            target_country TEXT,
            target_region TEXT,
            investment_amount REAL,                -- millions of USD
            investment_purpose TEXT,
            description TEXT
        );

        CREATE TABLE IF NOT EXISTS global_trade (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticker TEXT NOT NULL,
            data_year INTEGER NOT NULL,
            total_revenue REAL,
            international_revenue REAL,
            international_revenue_pct REAL,
            major_markets TEXT                     -- JSON array
        );

        CREATE TABLE IF NOT EXISTS geographic_segments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticker TEXT NOT NULL,
            data_year INTEGER NOT NULL,
            region TEXT,
            country TEXT,
            revenue REAL,
            revenue_pct REAL
        );

        CREATE TABLE IF NOT EXISTS supply_chain (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticker TEXT NOT NULL,
            data_year INTEGER NOT NULL,
            supplier_countries TEXT,               -- JSON array
            manufacturing_locations TEXT,          -- JSON array
            distribution_centers TEXT,             -- JSON array
            sourcing_strategy TEXT,
            risk_factors TEXT
        );

        CREATE TABLE IF NOT EXISTS policy_impacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticker TEXT NOT NULL,
            data_year INTEGER NOT NULL,
            policy_type TEXT,
            policy_description TEXT,
            impact_description TEXT,
            mentioned_countries TEXT,              -- JSON array
            decoupling_indicators TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_corpus_year_ticker
            ON corpus_segments(data_year, ticker);

        CREATE INDEX IF NOT EXISTS idx_tfidf_year_ticker
            ON tfidf_scores(data_year, ticker);

        CREATE INDEX IF NOT EXISTS idx_tfidf_keyword
            ON tfidf_scores(keyword);
        ",
    )
    .context("Failed to create database tables")?;

    for table in DIMENSIONS {
        conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{name}_year_ticker ON {name}(data_year, ticker);",
            name = table.name
        ))
        .with_context(|| format!("Failed to index {}", table.name))?;
    }

    // Record initial schema version if not already set
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    // Migration v2: original amount strings alongside the normalized figures,
    // so unit conversions made by the service can be audited.
    run_migration(conn, 2, |c| {
        c.execute_batch(
            "ALTER TABLE foreign_investments ADD COLUMN investment_amount_original TEXT;
             ALTER TABLE global_trade ADD COLUMN total_revenue_original TEXT;
             ALTER TABLE global_trade ADD COLUMN international_revenue_original TEXT;
             ALTER TABLE geographic_segments ADD COLUMN revenue_original TEXT;",
        )
    })?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
/// The migration function receives the connection and should execute its SQL.
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
