// Database queries — CRUD operations for all tables.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.

use anyhow::Result;
use rusqlite::{params, params_from_iter, Connection};
use serde_json::{Map, Value};

use super::models::{
    CompanyRecord, CorpusSegment, Keyword, KeywordCategory, MinedKeyword, QuantScore,
    ScoredCompany, Segment, SegmentCategory, TfIdfRow, YearSummary,
};
use super::normalize::{self, DIMENSIONS};

// --- Companies ---

/// Save or update a company's filing record for its year.
pub fn upsert_company(conn: &Connection, company: &CompanyRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO companies (ticker, data_year, cik, company_name, fiscal_year_end, report_date, file_path, processed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'))
         ON CONFLICT(ticker, data_year) DO UPDATE SET
            cik = ?3,
            company_name = ?4,
            fiscal_year_end = ?5,
            report_date = ?6,
            file_path = ?7,
            processed_at = datetime('now')",
        params![
            company.ticker,
            company.year,
            company.cik,
            company.company_name,
            company.fiscal_year_end,
            company.report_date,
            company.file_path,
        ],
    )?;
    Ok(())
}

fn company_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CompanyRecord> {
    Ok(CompanyRecord {
        ticker: row.get(0)?,
        year: row.get(1)?,
        cik: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        company_name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        fiscal_year_end: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        report_date: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        file_path: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
    })
}

/// Every company of a year, ordered by ticker.
pub fn companies_for_year(conn: &Connection, year: i32) -> Result<Vec<CompanyRecord>> {
    let mut stmt = conn.prepare(
        "SELECT ticker, data_year, cik, company_name, fiscal_year_end, report_date, file_path
         FROM companies
         WHERE data_year = ?1
         ORDER BY ticker",
    )?;

    let rows = stmt.query_map(params![year], company_from_row)?;

    let mut companies = Vec::new();
    for row in rows {
        companies.push(row?);
    }
    Ok(companies)
}

/// Companies of a year that have no corpus segments stored.
pub fn companies_without_segments(conn: &Connection, year: i32) -> Result<Vec<CompanyRecord>> {
    let mut stmt = conn.prepare(
        "SELECT c.ticker, c.data_year, c.cik, c.company_name, c.fiscal_year_end, c.report_date, c.file_path
         FROM companies c
         WHERE c.data_year = ?1
           AND NOT EXISTS (
               SELECT 1 FROM corpus_segments s
               WHERE s.ticker = c.ticker AND s.data_year = c.data_year
           )
         ORDER BY c.ticker",
    )?;

    let rows = stmt.query_map(params![year], company_from_row)?;

    let mut companies = Vec::new();
    for row in rows {
        companies.push(row?);
    }
    Ok(companies)
}

// --- Corpus ---

/// Remove a document's corpus segments and structured rows.
fn clear_document(conn: &Connection, ticker: &str, year: i32) -> Result<()> {
    conn.execute(
        "DELETE FROM corpus_segments WHERE ticker = ?1 AND data_year = ?2",
        params![ticker, year],
    )?;
    for table in DIMENSIONS {
        conn.execute(
            &format!("DELETE FROM {} WHERE ticker = ?1 AND data_year = ?2", table.name),
            params![ticker, year],
        )?;
    }
    Ok(())
}

/// Replace a document's segments and structured rows in one transaction.
/// Nothing is cleared unless every insert succeeds.
pub fn replace_document(
    conn: &Connection,
    ticker: &str,
    year: i32,
    structured: &Map<String, Value>,
    segments: &[Segment],
) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    clear_document(&tx, ticker, year)?;
    insert_structured_data(&tx, ticker, year, structured)?;
    let saved = insert_segments(&tx, ticker, year, segments)?;
    tx.commit()?;
    Ok(saved)
}

/// Append segments for a company-year in their own transaction.
pub fn append_segments(
    conn: &Connection,
    ticker: &str,
    year: i32,
    segments: &[Segment],
) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let saved = insert_segments(&tx, ticker, year, segments)?;
    tx.commit()?;
    Ok(saved)
}

/// Insert classified segments for a company-year. Returns the number saved.
/// The caller owns the transaction.
fn insert_segments(
    conn: &Connection,
    ticker: &str,
    year: i32,
    segments: &[Segment],
) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO corpus_segments
            (ticker, data_year, text_segment, segment_type, segment_category, source_section)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for segment in segments {
        stmt.execute(params![
            ticker,
            year,
            segment.text,
            segment.segment_type.as_str(),
            segment.category.as_str(),
            segment.source_section,
        ])?;
    }
    Ok(segments.len())
}

/// Normalize and store every structured dimension for a company-year.
/// Returns the number of rows written across all dimension tables.
fn insert_structured_data(
    conn: &Connection,
    ticker: &str,
    year: i32,
    structured: &Map<String, Value>,
) -> Result<usize> {
    let mut written = 0;

    for table in DIMENSIONS {
        let rows = normalize::rows(table, structured);
        if rows.is_empty() {
            continue;
        }

        let columns: Vec<&str> = table.columns.iter().map(|(name, _)| *name).collect();
        let placeholders: Vec<String> = (3..columns.len() + 3).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} (ticker, data_year, {}) VALUES (?1, ?2, {})",
            table.name,
            columns.join(", "),
            placeholders.join(", ")
        );
        let mut stmt = conn.prepare(&sql)?;

        for values in rows {
            let mut bound: Vec<rusqlite::types::Value> = Vec::with_capacity(values.len() + 2);
            bound.push(ticker.to_string().into());
            bound.push(i64::from(year).into());
            bound.extend(values);
            stmt.execute(params_from_iter(bound))?;
            written += 1;
        }
    }

    Ok(written)
}

/// Every segment of a year, in insertion order.
pub fn get_corpus_segments(conn: &Connection, year: i32) -> Result<Vec<CorpusSegment>> {
    let mut stmt = conn.prepare(
        "SELECT ticker, text_segment, segment_category
         FROM corpus_segments
         WHERE data_year = ?1
         ORDER BY id",
    )?;

    let rows = stmt.query_map(params![year], |row| {
        let category: Option<String> = row.get(2)?;
        Ok(CorpusSegment {
            ticker: row.get(0)?,
            text: row.get(1)?,
            category: category
                .as_deref()
                .map(SegmentCategory::parse)
                .unwrap_or_default(),
        })
    })?;

    let mut segments = Vec::new();
    for row in rows {
        segments.push(row?);
    }
    Ok(segments)
}

// --- Keywords ---

/// Every stored keyword, in insertion order.
pub fn get_all_keywords(conn: &Connection) -> Result<Vec<Keyword>> {
    let mut stmt = conn.prepare("SELECT keyword, keyword_category FROM keywords ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        let category: String = row.get(1)?;
        Ok(Keyword {
            keyword: row.get(0)?,
            category: KeywordCategory::parse(&category),
        })
    })?;

    let mut keywords = Vec::new();
    for row in rows {
        keywords.push(row?);
    }
    Ok(keywords)
}

/// Insert keywords, ignoring any whose text is already stored.
/// Returns the number actually inserted.
pub fn save_keywords(conn: &Connection, keywords: &[MinedKeyword]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO keywords (keyword, keyword_category, extraction_method, context)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for kw in keywords {
            inserted += stmt.execute(params![
                kw.keyword,
                kw.category.as_str(),
                kw.method,
                kw.context,
            ])?;
        }
    }
    tx.commit()?;
    Ok(inserted)
}

// --- TF-IDF ---

/// Replace a year's TF-IDF rows with `rows`.
pub fn replace_tfidf_scores(conn: &Connection, year: i32, rows: &[TfIdfRow]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM tfidf_scores WHERE data_year = ?1", params![year])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO tfidf_scores (ticker, data_year, keyword, keyword_category, tf, idf, tfidf)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for row in rows {
            stmt.execute(params![
                row.ticker,
                year,
                row.keyword,
                row.category.as_str(),
                row.tf,
                row.idf,
                row.tfidf,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// A year's TF-IDF rows, grouped by ticker.
pub fn get_tfidf_scores(conn: &Connection, year: i32) -> Result<Vec<TfIdfRow>> {
    let mut stmt = conn.prepare(
        "SELECT ticker, data_year, keyword, keyword_category, tf, idf, tfidf
         FROM tfidf_scores
         WHERE data_year = ?1
         ORDER BY ticker, id",
    )?;

    let rows = stmt.query_map(params![year], |row| {
        let category: String = row.get(3)?;
        Ok(TfIdfRow {
            ticker: row.get(0)?,
            year: row.get(1)?,
            keyword: row.get(2)?,
            category: KeywordCategory::parse(&category),
            tf: row.get(4)?,
            idf: row.get(5)?,
            tfidf: row.get(6)?,
        })
    })?;

    let mut scores = Vec::new();
    for row in rows {
        scores.push(row?);
    }
    Ok(scores)
}

// --- Quantitative scores ---

/// Save or replace a company-year score row.
pub fn upsert_quant_score(conn: &Connection, score: &QuantScore) -> Result<()> {
    conn.execute(
        "INSERT INTO quantitative_scores (
            ticker, data_year,
            investment_attitude_score, expansion_score, contraction_score,
            china_investment_score, china_positive_score, china_negative_score,
            non_china_investment_score, non_china_raw_score,
            china_investment_density, non_china_investment_density,
            china_investment_density_normalized, non_china_investment_density_normalized,
            total_keywords_count, calculated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, datetime('now'))
         ON CONFLICT(ticker, data_year) DO UPDATE SET
            investment_attitude_score = ?3,
            expansion_score = ?4,
            contraction_score = ?5,
            china_investment_score = ?6,
            china_positive_score = ?7,
            china_negative_score = ?8,
            non_china_investment_score = ?9,
            non_china_raw_score = ?10,
            china_investment_density = ?11,
            non_china_investment_density = ?12,
            china_investment_density_normalized = ?13,
            non_china_investment_density_normalized = ?14,
            total_keywords_count = ?15,
            calculated_at = datetime('now')",
        params![
            score.ticker,
            score.year,
            score.investment_attitude_score,
            score.expansion_score,
            score.contraction_score,
            score.china_investment_score,
            score.china_positive_score,
            score.china_negative_score,
            score.non_china_investment_score,
            score.non_china_raw_score,
            score.china_investment_density,
            score.non_china_investment_density,
            score.china_investment_density_normalized,
            score.non_china_investment_density_normalized,
            score.total_keywords_count,
        ],
    )?;
    Ok(())
}

/// A year's scores joined with company names, ranked by attitude score.
pub fn get_scored_companies(conn: &Connection, year: i32) -> Result<Vec<ScoredCompany>> {
    let mut stmt = conn.prepare(
        "SELECT q.ticker, q.data_year,
                q.investment_attitude_score, q.expansion_score, q.contraction_score,
                q.china_investment_score, q.china_positive_score, q.china_negative_score,
                q.non_china_investment_score, q.non_china_raw_score,
                q.china_investment_density, q.non_china_investment_density,
                q.china_investment_density_normalized, q.non_china_investment_density_normalized,
                q.total_keywords_count, c.company_name
         FROM quantitative_scores q
         LEFT JOIN companies c ON c.ticker = q.ticker AND c.data_year = q.data_year
         WHERE q.data_year = ?1
         ORDER BY q.investment_attitude_score DESC, q.ticker",
    )?;

    let rows = stmt.query_map(params![year], |row| {
        Ok(ScoredCompany {
            company_name: row.get::<_, Option<String>>(15)?.unwrap_or_default(),
            score: QuantScore {
                ticker: row.get(0)?,
                year: row.get(1)?,
                investment_attitude_score: row.get(2)?,
                expansion_score: row.get(3)?,
                contraction_score: row.get(4)?,
                china_investment_score: row.get(5)?,
                china_positive_score: row.get(6)?,
                china_negative_score: row.get(7)?,
                non_china_investment_score: row.get(8)?,
                non_china_raw_score: row.get(9)?,
                china_investment_density: row.get(10)?,
                non_china_investment_density: row.get(11)?,
                china_investment_density_normalized: row.get(12)?,
                non_china_investment_density_normalized: row.get(13)?,
                total_keywords_count: row.get(14)?,
            },
        })
    })?;

    let mut scores = Vec::new();
    for row in rows {
        scores.push(row?);
    }
    Ok(scores)
}

// --- Status ---

/// Years that have any company or corpus data, ascending.
pub fn get_years(conn: &Connection) -> Result<Vec<i32>> {
    let mut stmt = conn.prepare(
        "SELECT data_year FROM companies
         UNION
         SELECT data_year FROM corpus_segments
         ORDER BY data_year",
    )?;
    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut years = Vec::new();
    for row in rows {
        years.push(row?);
    }
    Ok(years)
}

/// Row counts for one year.
pub fn year_summary(conn: &Connection, year: i32) -> Result<YearSummary> {
    let count = |sql: &str| -> Result<i64> {
        Ok(conn.query_row(sql, params![year], |row| row.get(0))?)
    };

    Ok(YearSummary {
        year,
        companies: count("SELECT COUNT(*) FROM companies WHERE data_year = ?1")?,
        companies_with_segments: count(
            "SELECT COUNT(DISTINCT ticker) FROM corpus_segments WHERE data_year = ?1",
        )?,
        segments: count("SELECT COUNT(*) FROM corpus_segments WHERE data_year = ?1")?,
        tfidf_rows: count("SELECT COUNT(*) FROM tfidf_scores WHERE data_year = ?1")?,
        scores: count("SELECT COUNT(*) FROM quantitative_scores WHERE data_year = ?1")?,
    })
}

/// Number of stored keywords.
pub fn keyword_count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM keywords", [], |row| row.get(0))?)
}
