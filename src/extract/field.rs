use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// What to take from each element matched by a field selector
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum AttributeMode {
    /// Trimmed text content
    #[default]
    Text,
    /// Outer HTML of the element
    Html,
    /// Value of the named attribute (`attr:<name>`)
    Attr(String),
}

impl TryFrom<String> for AttributeMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim() {
            "text" => Ok(Self::Text),
            "html" => Ok(Self::Html),
            other => match other.strip_prefix("attr:") {
                Some(name) if !name.trim().is_empty() => Ok(Self::Attr(name.trim().to_string())),
                _ => Err(format!(
                    "unknown attribute mode '{}', expected text, html or attr:<name>",
                    other
                )),
            },
        }
    }
}

impl From<AttributeMode> for String {
    fn from(mode: AttributeMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for AttributeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Html => write!(f, "html"),
            Self::Attr(name) => write!(f, "attr:{}", name),
        }
    }
}

/// Declarative description of one extracted field
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FieldSpec {
    /// CSS selector locating the field's element(s)
    pub selector: String,

    #[serde(default)]
    pub attribute: AttributeMode,

    /// Collect every match into an array instead of taking the first
    #[serde(default)]
    pub multiple: bool,

    /// Value used when nothing matches
    #[serde(default)]
    pub default: Option<Value>,
}

impl FieldSpec {
    /// Single text field
    pub fn text(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attribute: AttributeMode::Text,
            multiple: false,
            default: None,
        }
    }

    /// Single outer-HTML field
    pub fn html(selector: impl Into<String>) -> Self {
        Self {
            attribute: AttributeMode::Html,
            ..Self::text(selector)
        }
    }

    /// Single attribute field
    pub fn attr(selector: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            attribute: AttributeMode::Attr(name.into()),
            ..Self::text(selector)
        }
    }

    /// Switches the field to multiple mode
    pub fn all(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Field name to field spec, in name order
pub type FieldMap = BTreeMap<String, FieldSpec>;

/// Field used when none are configured: the document `<title>`
pub fn default_field_map() -> FieldMap {
    let mut fields = FieldMap::new();
    fields.insert("title".to_string(), FieldSpec::text("title"));
    fields
}
