//! SQLite output
//!
//! Records are keyed by their field fingerprint, so rerunning a crawl into
//! the same database file only adds records it has not stored before.

use crate::crawler::CrawlReport;
use crate::dedup::fingerprint;
use crate::output::traits::{OutputResult, RecordSink};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// File name of the database inside the output directory
pub const SQLITE_FILE_NAME: &str = "records.db";

/// SQL schema for the output database
pub const SCHEMA_SQL: &str = r#"
-- Extracted records
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    fingerprint TEXT NOT NULL UNIQUE,
    fields TEXT NOT NULL,
    scraped_at TEXT NOT NULL
);

-- URLs that did not yield a record
CREATE TABLE IF NOT EXISTS crawl_errors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    status TEXT NOT NULL,
    status_code INTEGER,
    message TEXT NOT NULL,
    attempts INTEGER NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_url ON records(url);
CREATE INDEX IF NOT EXISTS idx_crawl_errors_status ON crawl_errors(status);
"#;

/// Writes a run into a SQLite database
pub struct SqliteSink {
    path: PathBuf,
}

impl SqliteSink {
    /// Creates a sink writing `records.db` inside `directory`
    pub fn new(directory: &Path) -> Self {
        Self {
            path: directory.join(SQLITE_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the database and makes sure the schema exists
    pub fn open(&self) -> OutputResult<Connection> {
        let conn = Connection::open(&self.path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(conn)
    }
}

impl RecordSink for SqliteSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn write(&self, report: &CrawlReport) -> OutputResult<()> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let recorded_at = Utc::now().to_rfc3339();
        let mut inserted = 0;

        {
            let mut insert_record = tx.prepare(
                "INSERT OR IGNORE INTO records (url, fingerprint, fields, scraped_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for record in &report.records {
                let key = fingerprint(&record.fields)?;
                let fields = serde_json::to_string(&record.fields)?;
                inserted += insert_record.execute(params![
                    record.url,
                    key,
                    fields,
                    record.scraped_at.to_rfc3339()
                ])?;
            }

            let mut insert_error = tx.prepare(
                "INSERT INTO crawl_errors (url, status, status_code, message, attempts, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for error in &report.errors {
                insert_error.execute(params![
                    error.url,
                    error.status.as_str(),
                    error.status_code,
                    error.message,
                    error.attempts,
                    recorded_at
                ])?;
            }
        }

        tx.commit()?;

        tracing::info!(
            "Stored {} new record(s) and {} error(s) in {}",
            inserted,
            report.errors.len(),
            self.path.display()
        );
        Ok(())
    }
}
