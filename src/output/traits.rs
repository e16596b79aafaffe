//! Output sink traits and errors
//!
//! This module defines the interface implemented by every persistence
//! backend that receives the results of a crawl.

use crate::crawler::CrawlReport;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Trait for record sinks
///
/// A sink receives the finished report of a run and persists its records
/// and errors.
pub trait RecordSink {
    /// Short name used in log messages
    fn name(&self) -> &'static str;

    /// Persists the records and errors of `report`
    ///
    /// # Arguments
    ///
    /// * `report` - The finished crawl report
    fn write(&self, report: &CrawlReport) -> OutputResult<()>;
}
