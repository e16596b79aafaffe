//! Output module for persisting crawl results
//!
//! This module handles:
//! - Writing records and errors as a JSON document
//! - Storing records and errors in a SQLite database
//! - Computing and printing run statistics

mod json_sink;
mod sqlite_sink;
pub mod stats;
mod traits;

pub use json_sink::{JsonSink, JSON_FILE_NAME};
pub use sqlite_sink::{SqliteSink, SQLITE_FILE_NAME};
pub use stats::{print_statistics, CrawlStatistics};
pub use traits::{OutputError, OutputResult, RecordSink};

use crate::config::{OutputConfig, OutputFormat};
use crate::crawler::CrawlReport;
use std::path::Path;

/// Builds one sink per configured output format
pub fn sinks_for(config: &OutputConfig) -> Vec<Box<dyn RecordSink>> {
    let directory = Path::new(&config.directory);
    let mut sinks: Vec<Box<dyn RecordSink>> = Vec::new();

    for format in &config.formats {
        if sinks.iter().any(|s| s.name() == format_name(*format)) {
            continue;
        }
        match format {
            OutputFormat::Json => sinks.push(Box::new(JsonSink::new(directory))),
            OutputFormat::Sqlite => sinks.push(Box::new(SqliteSink::new(directory))),
        }
    }

    sinks
}

fn format_name(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Json => "json",
        OutputFormat::Sqlite => "sqlite",
    }
}

/// Writes `report` to every format configured in `config`
///
/// # Arguments
///
/// * `report` - The finished crawl report
/// * `config` - Output directory and formats
///
/// # Returns
///
/// * `Ok(())` - Every sink wrote successfully
/// * `Err(OutputError)` - The first sink failure
pub fn write_outputs(report: &CrawlReport, config: &OutputConfig) -> OutputResult<()> {
    std::fs::create_dir_all(&config.directory)?;

    for sink in sinks_for(config) {
        tracing::debug!("Writing {} output", sink.name());
        sink.write(report)?;
    }

    Ok(())
}
