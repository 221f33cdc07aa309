//! Presentation model of form instances
//!
//! Views carry everything a renderer needs: labels, hints, choices and the
//! current value of every field, with stored secrets masked.

use crate::form::builder::{BoundField, FormInstance};
use crate::form::schema::FieldKind;
use crate::form::value::FieldValue;
use indexmap::IndexMap;
use serde::Serialize;

/// One rendered field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldView {
    pub name: String,
    pub kind: FieldKind,
    pub label: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longer_hint: Option<String>,
    pub expand: bool,
    pub multiline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<IndexMap<String, String>>,
    pub value: FieldValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&BoundField<'_>> for FieldView {
    fn from(bound: &BoundField<'_>) -> Self {
        let def = bound.def;
        Self {
            name: def.name.clone(),
            kind: def.field.kind(),
            label: def.field.label().to_owned(),
            required: def.field.required(),
            placeholder: def.spec.placeholder.clone(),
            hint: def.spec.hint.clone(),
            longer_hint: def.spec.longer_hint.clone(),
            expand: def.spec.expand,
            multiline: def.spec.multiline,
            choices: def.spec.choices.clone(),
            value: def.field.display(&bound.value),
            error: bound.error.clone(),
        }
    }
}

/// One rendered form instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormView {
    pub id: String,
    pub group: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub sequence: usize,
    pub cloneable: bool,
    pub fields: Vec<FieldView>,
}

impl From<&FormInstance<'_>> for FormView {
    fn from(form: &FormInstance<'_>) -> Self {
        Self {
            id: form.id.clone(),
            group: form.group.name.clone(),
            label: form.group.label.clone(),
            icon: form.group.icon.clone(),
            sequence: form.sequence,
            cloneable: form.group.cloneable,
            fields: form.fields.iter().map(FieldView::from).collect(),
        }
    }
}

/// Views of all instances in order
#[must_use]
pub fn render(forms: &[FormInstance<'_>]) -> Vec<FormView> {
    forms.iter().map(FormView::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::builder::build_forms;
    use crate::form::registry::FormRegistry;
    use crate::form::schema::Schema;
    use crate::store::{ConfigDocument, EXISTING_VALUE};

    #[test]
    fn test_secrets_are_masked() {
        let registry = FormRegistry::new(&Schema::embedded().unwrap()).unwrap();
        let mut forms = build_forms(&registry, None, &ConfigDocument::new());
        let bigboat = forms.iter_mut().find(|form| form.id == "bigboat").unwrap();
        for field in &mut bigboat.fields {
            field.value = FieldValue::text("stored");
        }

        let views = render(&forms);
        let bigboat = views.iter().find(|view| view.id == "bigboat").unwrap();
        let url = bigboat.fields.iter().find(|f| f.name == "bigboat_url").unwrap();
        let key = bigboat.fields.iter().find(|f| f.name == "bigboat_key").unwrap();
        assert_eq!(url.value, FieldValue::text("stored"));
        assert_eq!(key.value, FieldValue::text(EXISTING_VALUE));
        assert_eq!(key.kind, FieldKind::Secret);
    }

    #[test]
    fn test_repeated_instances_have_ids() {
        let registry = FormRegistry::new(&Schema::embedded().unwrap()).unwrap();
        let forms = build_forms(&registry, None, &ConfigDocument::new());
        let views = render(&forms);

        let vcs = views.iter().find(|view| view.group == "version_control").unwrap();
        assert_eq!(vcs.id, "version_control_1");
        assert!(vcs.cloneable);
        let json = serde_json::to_value(vcs).unwrap();
        assert_eq!(json["fields"][0]["name"], "version_control_type");
        assert_eq!(json["fields"][0]["kind"], "choice");
        assert!(json["fields"][0]["choices"]["gitlab"].is_string());
    }
}
