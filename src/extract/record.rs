use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// One extracted record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Page the record was extracted from (post-redirect)
    pub url: String,

    /// Extracted field values keyed by field name
    pub fields: BTreeMap<String, Value>,

    pub scraped_at: DateTime<Utc>,
}

impl Record {
    pub fn new(url: impl Into<String>, fields: BTreeMap<String, Value>) -> Self {
        Self {
            url: url.into(),
            fields,
            scraped_at: Utc::now(),
        }
    }
}
