//! The "query structured fields from markup" capability
//!
//! [`HtmlQuery`] is the default implementation over scraper. Anything that
//! can answer a [`FieldSpec`] against a markup string can stand in for it.

use crate::extract::{AttributeMode, FieldMap, FieldSpec};
use crate::url::resolve_link;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// Attributes whose values are resolved against the page URL
const URL_ATTRIBUTES: [&str; 3] = ["href", "src", "action"];

/// Field extraction errors
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Extracts field values from markup
pub trait Query: Send + Sync {
    /// Evaluates one field against `markup`
    ///
    /// `base` is the page URL used to resolve link-like attributes.
    fn query(&self, markup: &str, base: Option<&Url>, spec: &FieldSpec)
        -> Result<Value, ExtractError>;

    /// Evaluates every field of a field map
    ///
    /// A field whose extraction fails is logged and set to null; the other
    /// fields are unaffected.
    fn extract(&self, markup: &str, base: Option<&Url>, fields: &FieldMap) -> BTreeMap<String, Value> {
        fields
            .iter()
            .map(|(name, spec)| {
                let value = self.query(markup, base, spec).unwrap_or_else(|e| {
                    tracing::warn!("Failed to extract field '{}': {}", name, e);
                    Value::Null
                });
                (name.clone(), value)
            })
            .collect()
    }
}

/// CSS-selector queries over HTML documents
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlQuery;

impl HtmlQuery {
    pub fn new() -> Self {
        Self
    }

    fn select(&self, document: &Html, base: Option<&Url>, spec: &FieldSpec) -> Result<Value, ExtractError> {
        let selector = Selector::parse(&spec.selector).map_err(|e| ExtractError::InvalidSelector {
            selector: spec.selector.clone(),
            message: e.to_string(),
        })?;

        let mut values = document
            .select(&selector)
            .filter_map(|element| element_value(element, &spec.attribute, base));

        if spec.multiple {
            let all: Vec<Value> = values.map(Value::String).collect();
            if all.is_empty() {
                if let Some(default) = &spec.default {
                    return Ok(default.clone());
                }
            }
            Ok(Value::Array(all))
        } else {
            Ok(values
                .next()
                .map(Value::String)
                .or_else(|| spec.default.clone())
                .unwrap_or(Value::Null))
        }
    }
}

impl Query for HtmlQuery {
    fn query(&self, markup: &str, base: Option<&Url>, spec: &FieldSpec) -> Result<Value, ExtractError> {
        let document = Html::parse_document(markup);
        self.select(&document, base, spec)
    }

    fn extract(&self, markup: &str, base: Option<&Url>, fields: &FieldMap) -> BTreeMap<String, Value> {
        let document = Html::parse_document(markup);
        fields
            .iter()
            .map(|(name, spec)| {
                let value = self.select(&document, base, spec).unwrap_or_else(|e| {
                    tracing::warn!("Failed to extract field '{}': {}", name, e);
                    Value::Null
                });
                (name.clone(), value)
            })
            .collect()
    }
}

/// Reads the configured value from one matched element
///
/// Elements without the requested attribute are skipped.
fn element_value(element: ElementRef<'_>, mode: &AttributeMode, base: Option<&Url>) -> Option<String> {
    match mode {
        AttributeMode::Text => Some(element.text().collect::<String>().trim().to_string()),
        AttributeMode::Html => Some(element.html()),
        AttributeMode::Attr(name) => {
            let raw = element.value().attr(name)?;
            if URL_ATTRIBUTES.contains(&name.as_str()) {
                if let Some(resolved) = base.and_then(|b| resolve_link(raw, b)) {
                    return Some(resolved.to_string());
                }
            }
            Some(raw.to_string())
        }
    }
}
