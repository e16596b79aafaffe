//! JSON document output

use crate::crawler::{CrawlError, CrawlReport};
use crate::extract::Record;
use crate::output::traits::{OutputResult, RecordSink};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// File name of the JSON document inside the output directory
pub const JSON_FILE_NAME: &str = "records.json";

#[derive(Serialize)]
struct JsonDocument<'a> {
    records: &'a [Record],
    errors: &'a [CrawlError],
    duplicates: usize,
}

/// Writes a run as one pretty-printed JSON document
pub struct JsonSink {
    path: PathBuf,
}

impl JsonSink {
    /// Creates a sink writing `records.json` inside `directory`
    pub fn new(directory: &Path) -> Self {
        Self {
            path: directory.join(JSON_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for JsonSink {
    fn name(&self) -> &'static str {
        "json"
    }

    fn write(&self, report: &CrawlReport) -> OutputResult<()> {
        let document = JsonDocument {
            records: &report.records,
            errors: &report.errors,
            duplicates: report.duplicates,
        };

        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut writer, &document)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        tracing::info!(
            "Wrote {} record(s) to {}",
            report.records.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::CrawlStatistics;
    use crate::state::FetchStatus;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    #[test]
    fn test_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonSink::new(dir.path());

        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), json!("Widget"));
        let report = CrawlReport {
            records: vec![Record::new("https://example.com/a", fields)],
            errors: vec![CrawlError {
                url: "https://example.com/b".to_string(),
                status: FetchStatus::HttpError,
                status_code: Some(500),
                message: "HTTP 500".to_string(),
                attempts: 1,
            }],
            duplicates: 2,
            statistics: CrawlStatistics::default(),
        };

        sink.write(&report).unwrap();

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(sink.path()).unwrap()).unwrap();
        assert_eq!(written["duplicates"], 2);
        assert_eq!(written["records"][0]["fields"]["title"], "Widget");
        assert_eq!(written["records"][0]["url"], "https://example.com/a");
        assert_eq!(written["errors"][0]["status"], "http_error");
        assert_eq!(written["errors"][0]["status_code"], 500);
    }
}
