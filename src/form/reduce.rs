//! Reduction of bound form instances into one submission

use crate::form::builder::FormInstance;
use crate::form::value::{FieldValue, Pair};
use indexmap::IndexMap;
use serde::Serialize;

/// Value of a field across all instances of its group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Merged {
    /// Field of a plain group
    Single(FieldValue),
    /// Field of a repeated group, one value per instance in order
    Repeated(Vec<FieldValue>),
}

impl Merged {
    fn at(&self, index: usize) -> Option<&FieldValue> {
        match self {
            Self::Single(value) => (index == 0).then_some(value),
            Self::Repeated(values) => values.get(index),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Repeated(values) => values.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalized record of a valid submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Submission {
    fields: IndexMap<String, Merged>,
}

impl Submission {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Merged> {
        self.fields.get(name)
    }

    /// Text of a field; the first instance for repeated fields
    #[must_use]
    pub fn text(&self, name: &str) -> &str {
        self.text_at(name, 0)
    }

    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.flag_at(name, 0)
    }

    /// Rows of a map field, or `None` if the field was not submitted
    #[must_use]
    pub fn pairs(&self, name: &str) -> Option<&[Pair]> {
        self.value_at(name, 0).map(FieldValue::as_pairs)
    }

    /// Number of instances that submitted a field
    #[must_use]
    pub fn repeated_len(&self, name: &str) -> usize {
        self.fields.get(name).map_or(0, Merged::len)
    }

    #[must_use]
    pub fn text_at(&self, name: &str, index: usize) -> &str {
        self.value_at(name, index).map_or("", FieldValue::as_text)
    }

    #[must_use]
    pub fn flag_at(&self, name: &str, index: usize) -> bool {
        self.value_at(name, index).is_some_and(FieldValue::as_flag)
    }

    #[must_use]
    pub fn pairs_at(&self, name: &str, index: usize) -> &[Pair] {
        self.value_at(name, index)
            .map(FieldValue::as_pairs)
            .unwrap_or_default()
    }

    fn value_at(&self, name: &str, index: usize) -> Option<&FieldValue> {
        self.fields.get(name).and_then(|merged| merged.at(index))
    }

    fn push(&mut self, name: &str, value: FieldValue, repeated: bool) {
        if !repeated {
            self.fields.insert(name.to_owned(), Merged::Single(value));
            return;
        }
        let entry = self
            .fields
            .entry(name.to_owned())
            .or_insert_with(|| Merged::Repeated(Vec::new()));
        match entry {
            Merged::Repeated(values) => values.push(value),
            Merged::Single(_) => *entry = Merged::Repeated(vec![value]),
        }
    }
}

impl FromIterator<(String, Merged)> for Submission {
    fn from_iter<I: IntoIterator<Item = (String, Merged)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Outcome of reducing all form instances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    pub all_valid: bool,
    /// Merged values; empty unless every instance is valid
    pub merged: Submission,
}

/// Merge the values of all instances when every instance is valid
///
/// Plain groups contribute scalar values, repeated groups contribute one
/// value per instance, in instance order.
#[must_use]
pub fn reduce(forms: &[FormInstance<'_>]) -> Reduction {
    if !forms.iter().all(FormInstance::is_valid) {
        return Reduction {
            all_valid: false,
            merged: Submission::default(),
        };
    }

    let mut merged = Submission::default();
    for form in forms {
        for field in &form.fields {
            merged.push(field.name(), field.value.clone(), form.group.cloneable);
        }
    }
    Reduction {
        all_valid: true,
        merged,
    }
}
