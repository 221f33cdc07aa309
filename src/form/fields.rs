//! Field kinds and parsing of submitted values
//!
//! Every field starts from a [`TextField`]; secret and host fields wrap it
//! and change how values are shown or parsed.

use crate::form::schema::{FieldKind, FieldSpec};
use crate::form::value::{FieldValue, Pair};
use crate::store::{EXISTING_VALUE, has_value};
use anyhow::{Result, anyhow};
use indexmap::IndexMap;
use serde_json::Value;
use url::Url;

/// Domain and port of a URL, or the value itself when it is not a URL
#[must_use]
pub fn get_domain(value: &str) -> String {
    match Url::parse(value) {
        Ok(url) => match (url.host_str(), url.port()) {
            (Some(host), Some(port)) if !host.is_empty() => format!("{host}:{port}"),
            (Some(host), None) if !host.is_empty() => host.to_owned(),
            _ => value.to_owned(),
        },
        Err(_) => value.to_owned(),
    }
}

/// Text of a raw submitted value
///
/// Repeated values contribute their first entry; objects have no text.
#[must_use]
pub fn raw_text(raw: Option<&Value>) -> String {
    match raw {
        None | Some(Value::Null | Value::Object(_)) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Array(items)) => raw_text(items.first()),
    }
}

/// Whether a raw submitted value is the stored-secret token
#[must_use]
pub fn is_existing(raw: Option<&Value>) -> bool {
    matches!(raw, Some(Value::String(text)) if text == EXISTING_VALUE)
}

/// Result of parsing a raw value: the value to keep and an optional error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    pub value: FieldValue,
    pub error: Option<String>,
}

impl Parsed {
    const fn ok(value: FieldValue) -> Self {
        Self { value, error: None }
    }

    const fn invalid(value: FieldValue, error: String) -> Self {
        Self {
            value,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextField {
    pub label: String,
    pub required: bool,
}

impl TextField {
    fn from_spec(name: &str, spec: &FieldSpec) -> Self {
        Self {
            label: spec.label.clone().unwrap_or_else(|| name.to_owned()),
            required: spec.required,
        }
    }

    fn parse(&self, raw: Option<&Value>) -> Parsed {
        let text = raw_text(raw).trim().to_owned();
        if self.required && text.is_empty() {
            return Parsed::invalid(FieldValue::Text(text), format!("{} is required.", self.label));
        }
        Parsed::ok(FieldValue::Text(text))
    }
}

/// Text field whose stored value is never shown
#[derive(Debug, Clone)]
pub struct SecretField {
    pub base: TextField,
}

/// Text field reduced to the domain and port of a URL
#[derive(Debug, Clone)]
pub struct HostField {
    pub base: TextField,
}

impl HostField {
    fn parse(&self, raw: Option<&Value>) -> Parsed {
        let parsed = self.base.parse(raw);
        if parsed.error.is_some() {
            return parsed;
        }
        Parsed::ok(FieldValue::Text(get_domain(parsed.value.as_text())))
    }
}

#[derive(Debug, Clone)]
pub struct ChoiceField {
    pub base: TextField,
    pub choices: IndexMap<String, String>,
}

impl ChoiceField {
    fn parse(&self, raw: Option<&Value>) -> Parsed {
        let parsed = self.base.parse(raw);
        let text = parsed.value.as_text();
        if parsed.error.is_none() && !text.is_empty() && !self.choices.contains_key(text) {
            let error = format!("{} has an invalid choice: {text}.", self.base.label);
            return Parsed::invalid(parsed.value, error);
        }
        parsed
    }
}

#[derive(Debug, Clone)]
pub struct FlagField {
    pub label: String,
}

impl FlagField {
    fn parse(raw: Option<&Value>) -> Parsed {
        let flag = match raw {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(other) => has_value(Some(&raw_text(Some(other)))),
        };
        Parsed::ok(FieldValue::Flag(flag))
    }
}

/// Repeated key/value rows, each parsed by its own sub-fields
#[derive(Debug, Clone)]
pub struct MapField {
    pub label: String,
    pub key: Box<Field>,
    pub value: Box<Field>,
}

impl MapField {
    fn parse(&self, raw: Option<&Value>) -> Parsed {
        let mut pairs = Vec::new();
        let mut error = None;
        for (key, value) in map_rows(raw) {
            let key = self.key.parse(key);
            let value = self.value.parse(value);
            if error.is_none() {
                error = key.error.or(value.error);
            }
            pairs.push(Pair::new(key.value.as_text(), value.value.as_text()));
        }
        Parsed {
            value: FieldValue::Pairs(pairs),
            error,
        }
    }
}

/// Split a raw map value into rows of raw key and value
///
/// Rows come either as a list of `{key, value}` objects or as one object of
/// parallel `key`/`value` lists; a scalar in place of a list applies to
/// every row. A bare scalar is a single row with an empty key.
fn map_rows(raw: Option<&Value>) -> Vec<(Option<&Value>, Option<&Value>)> {
    match raw {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Object(row) => (row.get("key"), row.get("value")),
                other => (None, Some(other)),
            })
            .collect(),
        Some(Value::Object(columns)) => {
            let key = columns.get("key");
            let value = columns.get("value");
            let count = column_len(key).max(column_len(value));
            (0..count)
                .map(|index| (column_item(key, index), column_item(value, index)))
                .collect()
        }
        Some(scalar) => vec![(None, Some(scalar))],
    }
}

fn column_len(column: Option<&Value>) -> usize {
    match column {
        None | Some(Value::Null) => 0,
        Some(Value::Array(items)) => items.len(),
        Some(_) => 1,
    }
}

fn column_item(column: Option<&Value>, index: usize) -> Option<&Value> {
    match column {
        Some(Value::Array(items)) => items.get(index),
        other => other,
    }
}

/// A parsed form field
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Field {
    Text(TextField),
    Secret(SecretField),
    Host(HostField),
    Choice(ChoiceField),
    Flag(FlagField),
    Map(MapField),
}

impl Field {
    /// Build a field from its schema entry
    ///
    /// # Errors
    ///
    /// Returns an error if a map field lacks its sub-fields.
    pub fn from_spec(name: &str, spec: &FieldSpec) -> Result<Self> {
        let base = TextField::from_spec(name, spec);
        let field = match spec.kind {
            FieldKind::String => Self::Text(base),
            FieldKind::Secret => Self::Secret(SecretField { base }),
            FieldKind::Host => Self::Host(HostField { base }),
            FieldKind::Choice => Self::Choice(ChoiceField {
                base,
                choices: spec.choices.clone().unwrap_or_default(),
            }),
            FieldKind::Flag => Self::Flag(FlagField { label: base.label }),
            FieldKind::Map => {
                let (Some(key), Some(value)) = (spec.key.as_deref(), spec.value.as_deref()) else {
                    return Err(anyhow!("Map field '{name}' needs both a key and a value field"));
                };
                Self::Map(MapField {
                    label: base.label,
                    key: Box::new(Self::from_spec("key", key)?),
                    value: Box::new(Self::from_spec("value", value)?),
                })
            }
        };
        Ok(field)
    }

    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        match self {
            Self::Text(_) => FieldKind::String,
            Self::Secret(_) => FieldKind::Secret,
            Self::Host(_) => FieldKind::Host,
            Self::Choice(_) => FieldKind::Choice,
            Self::Flag(_) => FieldKind::Flag,
            Self::Map(_) => FieldKind::Map,
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Text(base)
            | Self::Secret(SecretField { base })
            | Self::Host(HostField { base })
            | Self::Choice(ChoiceField { base, .. }) => &base.label,
            Self::Flag(FlagField { label }) | Self::Map(MapField { label, .. }) => label,
        }
    }

    #[must_use]
    pub const fn required(&self) -> bool {
        match self {
            Self::Text(base)
            | Self::Secret(SecretField { base })
            | Self::Host(HostField { base })
            | Self::Choice(ChoiceField { base, .. }) => base.required,
            Self::Flag(_) | Self::Map(_) => false,
        }
    }

    #[must_use]
    pub const fn empty(&self) -> FieldValue {
        FieldValue::empty(self.kind())
    }

    /// Parse a raw submitted value
    #[must_use]
    pub fn parse(&self, raw: Option<&Value>) -> Parsed {
        match self {
            Self::Text(base) | Self::Secret(SecretField { base }) => base.parse(raw),
            Self::Host(field) => field.parse(raw),
            Self::Choice(field) => field.parse(raw),
            Self::Flag(_) => FlagField::parse(raw),
            Self::Map(field) => field.parse(raw),
        }
    }

    /// Value as shown to the user; stored secrets are replaced by a token
    #[must_use]
    pub fn display(&self, value: &FieldValue) -> FieldValue {
        match self {
            Self::Secret(_) if !value.as_text().is_empty() => FieldValue::text(EXISTING_VALUE),
            _ => value.clone(),
        }
    }
}
