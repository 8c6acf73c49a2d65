//! SQLite result sink
//!
//! Each saved report becomes one row in `runs`, one row per attempted page
//! in `pages`, and one row per discovered link in `links`. The database can
//! hold many runs.

use crate::output::traits::{OutputResult, ResultSink};
use crate::output::CrawlReport;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// SQL schema for the results database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawl
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_url TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    duration_ms INTEGER NOT NULL,
    status TEXT NOT NULL,
    cancelled INTEGER NOT NULL,
    config_hash TEXT,
    pages_fetched INTEGER NOT NULL,
    pages_failed INTEGER NOT NULL,
    pages_skipped INTEGER NOT NULL,
    bytes_fetched INTEGER NOT NULL,
    retries INTEGER NOT NULL,
    frontier_remaining INTEGER NOT NULL
);

-- Every attempted page
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    final_url TEXT NOT NULL,
    source TEXT NOT NULL,
    status TEXT NOT NULL,
    status_code INTEGER,
    content_type TEXT,
    depth INTEGER NOT NULL,
    attempts INTEGER NOT NULL,
    elapsed_ms INTEGER NOT NULL,
    bytes INTEGER NOT NULL,
    fetched_at TEXT NOT NULL,
    error TEXT,
    title TEXT,
    record TEXT,
    UNIQUE(run_id, url)
);

CREATE INDEX IF NOT EXISTS idx_pages_run ON pages(run_id);
CREATE INDEX IF NOT EXISTS idx_pages_status ON pages(status);

-- Links found on each page
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id INTEGER NOT NULL REFERENCES pages(id),
    url TEXT NOT NULL,
    internal INTEGER NOT NULL,
    followed INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_links_page ON links(page_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Opens (or creates) a results database
pub fn open_database(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
    ",
    )?;

    initialize_schema(&conn)?;

    Ok(conn)
}

/// Writes reports to a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteSink {
    path: PathBuf,
}

impl SqliteSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ResultSink for SqliteSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn save(&self, report: &CrawlReport) -> OutputResult<()> {
        let mut conn = open_database(&self.path)?;
        let run_id = write_report(&mut conn, report)?;
        tracing::debug!("Stored run {} in {}", run_id, self.path.display());
        Ok(())
    }
}

/// Inserts a report in a single transaction and returns the run ID
pub fn write_report(conn: &mut Connection, report: &CrawlReport) -> OutputResult<i64> {
    let tx = conn.transaction()?;
    let stats = &report.stats;

    tx.execute(
        "INSERT INTO runs (start_url, started_at, finished_at, duration_ms, status, cancelled,
                           config_hash, pages_fetched, pages_failed, pages_skipped,
                           bytes_fetched, retries, frontier_remaining)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            report.start_url.as_str(),
            report.started_at.to_rfc3339(),
            report.finished_at.to_rfc3339(),
            report.duration_ms as i64,
            report.status.as_str(),
            report.cancelled,
            report.config_hash,
            stats.pages_fetched as i64,
            stats.pages_failed as i64,
            stats.pages_skipped as i64,
            stats.bytes_fetched as i64,
            stats.retries as i64,
            report.frontier_remaining as i64,
        ],
    )?;
    let run_id = tx.last_insert_rowid();

    {
        let mut insert_page = tx.prepare(
            "INSERT INTO pages (run_id, url, final_url, source, status, status_code, content_type,
                                depth, attempts, elapsed_ms, bytes, fetched_at, error, title, record)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )?;
        let mut insert_link = tx.prepare(
            "INSERT INTO links (page_id, url, internal, followed) VALUES (?1, ?2, ?3, ?4)",
        )?;

        for page in &report.pages {
            let record = page
                .record
                .as_ref()
                .map(|r| serde_json::to_string(&r.data))
                .transpose()?;
            let title = page.record.as_ref().and_then(|r| r.title.clone());

            insert_page.execute(params![
                run_id,
                page.url.as_str(),
                page.final_url.as_str(),
                page.source.as_str(),
                page.status.as_str(),
                page.status_code,
                page.content_type,
                page.depth,
                page.attempts,
                page.elapsed_ms as i64,
                page.bytes as i64,
                page.fetched_at.to_rfc3339(),
                page.error.as_ref().map(|e| e.to_string()),
                title,
                record,
            ])?;
            let page_id = tx.last_insert_rowid();

            for link in &page.links {
                insert_link.execute(params![page_id, link.url.as_str(), link.internal, link.followed])?;
            }
        }
    }

    tx.commit()?;
    Ok(run_id)
}
