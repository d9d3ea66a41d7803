use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::info;

use posture::config::Config;
use posture::db::{Database, SqliteDatabase};
use posture::extraction::chat::ChatCompletionsService;
use posture::extraction::retry::RetryPolicy;
use posture::extraction::{ExtractionClient, ExtractionService};
use posture::output::markdown::{YearReport, TOP_KEYWORDS};
use posture::pipeline::corpus::CorpusBuilder;
use posture::pipeline::keywords::KeywordMiner;
use posture::scoring::frequency::FrequencyCounter;
use posture::scoring::PostureWeights;
use posture::ticker::{TickerCache, TickerResolver};

/// Posture: investment stance scoring from annual-report filings.
///
/// Extracts classified passages from filings with a language model, mines
/// keywords from them, and scores each company's expansion, contraction and
/// China exposure year by year.
#[derive(Parser)]
#[command(name = "posture", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Extract a corpus from filing files or directories
    Build {
        /// Filing files, or directories searched recursively for .txt files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Max filings to take from each directory
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Re-extract companies of a year that have no corpus segments
    RetryFailed {
        #[arg(long)]
        year: i32,

        /// Max companies to retry
        #[arg(long)]
        limit: Option<usize>,

        /// Only list the companies, don't retry them
        #[arg(long)]
        list: bool,
    },

    /// Mine scoring keywords from the corpus
    Keywords {
        /// Years to mine (default: every year in the database)
        #[arg(long, num_args = 1..)]
        years: Vec<i32>,
    },

    /// Compute TF-IDF keyword weights
    Tfidf {
        /// Years to compute (default: every year in the database)
        #[arg(long, num_args = 1..)]
        years: Vec<i32>,
    },

    /// Compute posture scores from TF-IDF weights
    Score {
        /// Years to score (default: every year in the database)
        #[arg(long, num_args = 1..)]
        years: Vec<i32>,
    },

    /// Build, mine keywords, compute TF-IDF, score and report in one go
    Run {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Max filings to take from each directory
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show score tables and write a Markdown report
    Report {
        /// Years to report (default: every year in the database)
        #[arg(long, num_args = 1..)]
        years: Vec<i32>,

        /// Where to write the Markdown report
        #[arg(long, default_value = "output/posture-report.md")]
        output: String,
    },

    /// Count fixed keyword families in each stored company's filing
    Frequency {
        /// Years to count (default: every year in the database)
        #[arg(long, num_args = 1..)]
        years: Vec<i32>,

        /// Where to write the per-company CSV (a _summary CSV goes beside it)
        #[arg(long, default_value = "output/keyword-frequency.csv")]
        output: String,
    },

    /// Show system status (DB stats, years, progress per year)
    Status,

    /// Compare filings on disk with the database: unprocessed files and
    /// companies whose extraction stored nothing
    Diagnose {
        /// Filing files, or directories searched recursively for .txt files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Only diagnose this year
        #[arg(long)]
        year: Option<i32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("posture=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            info!("Initializing Posture database...");
            let config = Config::load()?;
            let db = init_database(&config)?;
            let table_count = db.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nPosture is ready. Next step: set up your .env file");
            println!("  (see .env.example for required variables)");
            println!("\nThen run: posture build <filings-dir>");
        }

        Commands::Build { paths, limit } => {
            let config = Config::load()?;
            config.require_api_key()?;
            let db = open_database(&config)?;
            build(&config, &db, &paths, limit).await?;
        }

        Commands::RetryFailed { year, limit, list } => {
            let config = Config::load()?;
            let db = open_database(&config)?;

            if list {
                let missing = db.get_companies_without_segments(year).await?;
                posture::output::terminal::display_missing_companies(year, &missing);
                return Ok(());
            }

            config.require_api_key()?;
            let builder = corpus_builder(&config, &db)?;
            let summary = builder.retry_failed(year, limit).await?;
            if summary.total() == 0 {
                println!("Nothing to retry: every {year} company has corpus segments.");
            } else {
                posture::output::terminal::display_batch_summary(&summary);
            }
        }

        Commands::Keywords { years } => {
            let config = Config::load()?;
            config.require_api_key()?;
            let db = open_database(&config)?;
            let years = posture::pipeline::resolve_years(&db, &years).await?;
            mine_keywords(&config, &db, &years).await?;
        }

        Commands::Tfidf { years } => {
            let config = Config::load()?;
            let db = open_database(&config)?;
            let years = posture::pipeline::resolve_years(&db, &years).await?;
            compute_tfidf(&db, &years).await?;
        }

        Commands::Score { years } => {
            let config = Config::load()?;
            config.require_scoring()?;
            let db = open_database(&config)?;
            let years = posture::pipeline::resolve_years(&db, &years).await?;
            compute_scores(&config, &db, &years).await?;
        }

        Commands::Run { paths, limit } => {
            let config = Config::load()?;
            config.require_api_key()?;
            config.require_scoring()?;
            let db = init_database(&config)?;

            let built_years = build(&config, &db, &paths, limit).await?;
            if built_years.is_empty() {
                anyhow::bail!("No filing produced a usable year. Nothing to score.");
            }

            mine_keywords(&config, &db, &built_years).await?;
            compute_tfidf(&db, &built_years).await?;
            compute_scores(&config, &db, &built_years).await?;
            report(&db, &built_years, "output/posture-report.md").await?;
        }

        Commands::Report { years, output } => {
            let config = Config::load()?;
            let db = open_database(&config)?;
            let years = posture::pipeline::resolve_years(&db, &years).await?;
            report(&db, &years, &output).await?;
        }

        Commands::Status => {
            let config = Config::load()?;
            if !posture::status::is_initialized(&config.db_path) {
                println!("Database: not initialized");
                println!("\nRun `posture init` to set up the database.");
                return Ok(());
            }
            let db = open_database(&config)?;
            posture::status::show(&db, &config.db_path).await?;
        }

        Commands::Frequency { years, output } => {
            let config = Config::load()?;
            let db = open_database(&config)?;
            let years = posture::pipeline::resolve_years(&db, &years).await?;
            keyword_frequency(&db, &years, &output).await?;
        }

        Commands::Diagnose { paths, year } => {
            let config = Config::load()?;
            let db = open_database(&config)?;
            let files = posture::filing::discover(&paths, None)?;
            let diagnosis = posture::status::diagnose(&db, &files, year).await?;
            posture::output::terminal::display_diagnosis(&diagnosis);
        }
    }

    Ok(())
}

/// Build the corpus and print the summary. Returns the years touched.
async fn build(
    config: &Config,
    db: &Arc<dyn Database>,
    paths: &[PathBuf],
    limit: Option<usize>,
) -> Result<Vec<i32>> {
    let files = posture::filing::discover(paths, limit)?;
    if files.is_empty() {
        println!("No filings found.");
        return Ok(Vec::new());
    }

    println!(
        "Extracting {} filings ({} concurrent calls)...",
        files.len(),
        config.max_concurrent
    );
    let builder = corpus_builder(config, db)?;
    let summary = builder.build_batch(&files).await;
    posture::output::terminal::display_batch_summary(&summary);

    let years: BTreeSet<i32> = summary.reports.iter().filter_map(|r| r.year).collect();
    Ok(years.into_iter().collect())
}

async fn mine_keywords(config: &Config, db: &Arc<dyn Database>, years: &[i32]) -> Result<()> {
    println!("Mining keywords for {} year(s)...", years.len());
    let (service, gate) = extraction_service(config)?;
    let miner = KeywordMiner::new(
        Arc::clone(db),
        service,
        gate,
        RetryPolicy::with_max_retries(config.max_retries),
        config.keyword_batch_size,
    );
    let inserted = miner.mine_years(years).await?;
    println!(
        "  {} new keywords ({} total)",
        inserted,
        db.keyword_count().await?
    );
    Ok(())
}

async fn compute_tfidf(db: &Arc<dyn Database>, years: &[i32]) -> Result<()> {
    println!("Computing TF-IDF...");
    for (year, rows) in posture::pipeline::tfidf::run(db, years).await? {
        println!("  {year}: {rows} keyword rows");
    }
    Ok(())
}

async fn compute_scores(config: &Config, db: &Arc<dyn Database>, years: &[i32]) -> Result<()> {
    println!("Scoring...");
    let weights = PostureWeights {
        density_k: config.density_k,
        ..PostureWeights::default()
    };
    for (year, companies) in posture::pipeline::scores::run(db, years, &weights).await? {
        println!("  {year}: {companies} companies scored");
    }
    Ok(())
}

async fn report(db: &Arc<dyn Database>, years: &[i32], output: &str) -> Result<()> {
    if years.is_empty() {
        println!("No years in the database. Run `posture build` first.");
        return Ok(());
    }

    let mut sections = Vec::with_capacity(years.len());
    for &year in years {
        let section = YearReport::load(db, year, TOP_KEYWORDS).await?;
        posture::output::terminal::display_score_table(year, &section.companies);
        sections.push(section);
    }

    let report_path = posture::output::markdown::generate_report(&sections, output)?;
    println!(
        "\n{}",
        format!("Markdown report saved to: {report_path}").bold()
    );
    Ok(())
}

async fn keyword_frequency(db: &Arc<dyn Database>, years: &[i32], output: &str) -> Result<()> {
    if years.is_empty() {
        println!("No years in the database. Run `posture build` first.");
        return Ok(());
    }

    let counter = FrequencyCounter::standard()?;
    println!(
        "Counting {} keyword families for {} year(s)...",
        counter.len(),
        years.len()
    );
    let rows = posture::pipeline::frequency::run(db, years, &counter).await?;
    let families: Vec<&str> = counter.family_names().collect();
    posture::output::terminal::display_frequency(&families, &rows);
    if rows.is_empty() {
        return Ok(());
    }

    let (detail, summary) = posture::output::csv::write_frequency(&families, &rows, output)?;
    println!(
        "\n{}",
        format!("Frequency CSV saved to: {}", detail.display()).bold()
    );
    println!("Summary CSV saved to: {}", summary.display());
    Ok(())
}

/// The language service and the gate shared by every caller of it.
fn extraction_service(config: &Config) -> Result<(Arc<dyn ExtractionService>, Arc<Semaphore>)> {
    let service = ChatCompletionsService::new(
        &config.api_base_url,
        &config.api_key,
        &config.model,
        config.temperature,
        config.request_timeout,
    )?;
    Ok((Arc::new(service), Arc::new(Semaphore::new(config.max_concurrent))))
}

fn corpus_builder(config: &Config, db: &Arc<dyn Database>) -> Result<CorpusBuilder> {
    let (service, gate) = extraction_service(config)?;
    let client = ExtractionClient::new(
        Arc::clone(&service),
        Arc::clone(&gate),
        RetryPolicy::with_max_retries(config.max_retries),
        config.max_tokens,
    );
    let cache = Arc::new(TickerCache::load(&config.ticker_cache_path));
    info!(path = %cache.path().display(), entries = cache.len(), "Ticker cache loaded");
    let resolver = TickerResolver::new(cache, service, gate);
    Ok(CorpusBuilder::new(Arc::clone(db), client, resolver))
}

/// Open an existing database.
fn open_database(config: &Config) -> Result<Arc<dyn Database>> {
    let conn = posture::db::open(&config.db_path)?;
    Ok(Arc::new(SqliteDatabase::new(conn)))
}

/// Open the database, creating it and its tables if needed.
fn init_database(config: &Config) -> Result<Arc<dyn Database>> {
    let conn = posture::db::initialize(&config.db_path)?;
    Ok(Arc::new(SqliteDatabase::new(conn)))
}
