//! Structured field extraction
//!
//! Field specs come from the `[fields.*]` config tables and are evaluated
//! through the [`Query`] capability.

mod field;
mod query;
mod record;

pub use field::{default_field_map, AttributeMode, FieldMap, FieldSpec};
pub use query::{ExtractError, HtmlQuery, Query};
pub use record::Record;
