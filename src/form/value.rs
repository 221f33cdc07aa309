//! Values carried by form fields

use crate::form::schema::FieldKind;
use crate::store::{EXISTING_VALUE, has_value};
use serde::{Deserialize, Serialize};

/// One row of a map field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub key: String,
    pub value: String,
}

impl Pair {
    #[must_use]
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Current or original value of a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
    Pairs(Vec<Pair>),
}

impl Default for FieldValue {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl FieldValue {
    /// Empty value of a field kind
    #[must_use]
    pub const fn empty(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Flag => Self::Flag(false),
            FieldKind::Map => Self::Pairs(Vec::new()),
            FieldKind::String | FieldKind::Secret | FieldKind::Choice | FieldKind::Host => {
                Self::Text(String::new())
            }
        }
    }

    #[must_use]
    pub fn text<S: Into<String>>(value: S) -> Self {
        Self::Text(value.into())
    }

    /// Text of the value; flags and maps have none
    #[must_use]
    pub fn as_text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Flag(_) | Self::Pairs(_) => "",
        }
    }

    /// Truthiness of the value
    #[must_use]
    pub fn as_flag(&self) -> bool {
        match self {
            Self::Flag(flag) => *flag,
            Self::Text(text) => has_value(Some(text)),
            Self::Pairs(pairs) => !pairs.is_empty(),
        }
    }

    /// Rows of a map value; other values have none
    #[must_use]
    pub fn as_pairs(&self) -> &[Pair] {
        match self {
            Self::Pairs(pairs) => pairs,
            Self::Flag(_) | Self::Text(_) => &[],
        }
    }

    /// Whether this is the token standing in for a stored secret
    #[must_use]
    pub fn is_existing(&self) -> bool {
        matches!(self, Self::Text(text) if text == EXISTING_VALUE)
    }

    /// Convert to the shape of a field kind, dropping absent text values
    #[must_use]
    pub fn normalize(self, kind: FieldKind) -> Self {
        match (kind, self) {
            (FieldKind::Flag, value) => Self::Flag(value.as_flag()),
            (FieldKind::Map, value @ Self::Pairs(_)) => value,
            (FieldKind::Map, _) => Self::empty(kind),
            (_, Self::Text(text)) if has_value(Some(&text)) => Self::Text(text),
            (_, _) => Self::empty(kind),
        }
    }
}
