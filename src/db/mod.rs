// Database layer — SQLite storage for companies, corpus, keywords and scores.
//
// We use rusqlite with the "bundled" feature so there's no system SQLite
// dependency. The database file lives wherever POSTURE_DB_PATH points
// (defaults to ./posture.db).

pub mod models;
pub mod normalize;
pub mod queries;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteDatabase;
pub use traits::Database;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// How long SQLite itself waits on a locked file before reporting busy.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Open (or create) the database and run migrations.
///
/// This is the main entry point — called by `posture init` and by any
/// command that writes to the database.
pub fn initialize(db_path: &str) -> Result<Connection> {
    // Create parent directories if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for database: {}", db_path))?;
        }
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;
    configure(&conn)?;

    // Run schema creation / migrations
    schema::create_tables(&conn)?;

    Ok(conn)
}

/// Open an existing database (fails if it doesn't exist yet).
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        anyhow::bail!(
            "Database not found at {}. Run `posture init` first.",
            db_path
        );
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;
    configure(&conn)?;

    // Pick up migrations added since the file was created
    schema::create_tables(&conn)?;

    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    // WAL lets report/status readers run alongside a build
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}
