//! Declarative form schema
//!
//! The schema is a YAML document mapping group names to groups of fields,
//! in display order. It is checked against an embedded JSON Schema before
//! it is deserialized, and then validated for consistency.

use crate::config::schema::validate_against_schema;
use crate::error::AgentConfigError;
use crate::store::StoreName;
use crate::system::System;
use anyhow::{Context as _, Result, anyhow};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Schema shipped with the binary
const DEFAULT_FORM: &str = include_str!("../../res/form.yml");

/// Kind of a field, selecting how submitted values are parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Secret,
    Choice,
    Host,
    Flag,
    Map,
}

/// Credential sections owned by a repeated group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    VersionControl,
    Jenkins,
}

/// Static `[store, section, option]` lookup of a field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionPath(pub StoreName, pub String, pub String);

/// One field of a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "field")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longer_hint: Option<String>,
    #[serde(default)]
    pub expand: bool,
    #[serde(default)]
    pub multiline: bool,
    /// Map rows can be added and removed
    #[serde(default)]
    pub cloneable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<IndexMap<String, String>>,
    /// Name of the derivation rule computing the current value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<OptionPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Box<FieldSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Box<FieldSpec>>,
}

/// A group of fields shown together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub cloneable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<SectionKind>,
    pub fields: IndexMap<String, FieldSpec>,
}

/// Ordered mapping of group names to groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    pub groups: IndexMap<String, GroupSpec>,
}

impl Schema {
    /// Load the schema embedded in the binary
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded document is invalid.
    pub fn embedded() -> Result<Self> {
        Self::load_from_string(DEFAULT_FORM).context("Embedded form schema is invalid")
    }

    /// Load a schema from YAML text
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The text is not valid YAML
    /// - The document does not match the form JSON Schema
    /// - Fields are inconsistent (see [`Schema::validate`])
    pub fn load_from_string(content: &str) -> Result<Self> {
        let document: serde_json::Value = serde_yaml::from_str(content).map_err(|e| {
            if let Some(location) = e.location() {
                anyhow!(
                    "Failed to parse form schema at line {}, column {}: {}",
                    location.line(),
                    location.column(),
                    e
                )
            } else {
                anyhow!("Failed to parse form schema: {}", e)
            }
        })?;

        validate_against_schema(&document)
            .map_err(|e| AgentConfigError::configuration(e.to_string()))?;

        let schema: Self = serde_json::from_value(document)
            .map_err(|e| AgentConfigError::configuration(format!("Invalid form schema: {e}")))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Load a schema from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or invalid.
    pub fn load_from_file(system: &dyn System, path: &Path) -> Result<Self> {
        if !system.exists(path) {
            return Err(AgentConfigError::configuration(format!(
                "Form schema not found: {}",
                path.display()
            ))
            .into());
        }

        let content = system
            .read_to_string(path)
            .with_context(|| format!("Failed to read form schema: {}", path.display()))?;

        Self::load_from_string(&content)
            .with_context(|| format!("Invalid form schema in {}", path.display()))
    }

    /// Check consistency the JSON Schema cannot express
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A field name is used twice across groups
    /// - A choice field has no choices, or a map field lacks `key`/`value`
    /// - A map sub-field is itself a map
    /// - A field has both a `rule` and an `option`
    /// - A repeated group does not declare the sections it owns, or a
    ///   single group declares sections
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (group_name, group) in &self.groups {
            match (group.cloneable, group.sections) {
                (true, None) => {
                    return Err(invalid(format!(
                        "Repeated group '{group_name}' must declare the credential sections it owns"
                    )));
                }
                (false, Some(_)) => {
                    return Err(invalid(format!(
                        "Group '{group_name}' is not repeated and cannot own credential sections"
                    )));
                }
                _ => {}
            }

            for (name, field) in &group.fields {
                if !seen.insert(name.as_str()) {
                    return Err(invalid(format!("Field '{name}' is defined more than once")));
                }
                validate_field(name, field, false)?;
            }
        }
        Ok(())
    }
}

fn validate_field(name: &str, field: &FieldSpec, nested: bool) -> Result<()> {
    if field.rule.is_some() && field.option.is_some() {
        return Err(invalid(format!(
            "Field '{name}' cannot have both a rule and an option"
        )));
    }

    match field.kind {
        FieldKind::Choice if field.choices.as_ref().is_none_or(IndexMap::is_empty) => {
            Err(invalid(format!("Choice field '{name}' has no choices")))
        }
        FieldKind::Map if nested => Err(invalid(format!("Map field '{name}' cannot be nested"))),
        FieldKind::Map => match (field.key.as_deref(), field.value.as_deref()) {
            (Some(key), Some(value)) => {
                validate_field(&format!("{name}[key]"), key, true)?;
                validate_field(&format!("{name}[value]"), value, true)
            }
            _ => Err(invalid(format!(
                "Map field '{name}' needs both a key and a value field"
            ))),
        },
        _ => Ok(()),
    }
}

fn invalid(message: String) -> anyhow::Error {
    AgentConfigError::configuration(message).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::MockSystem;

    #[test]
    fn test_embedded_schema_loads() {
        let schema = Schema::embedded().unwrap();
        let groups: Vec<&str> = schema.groups.keys().map(String::as_str).collect();
        assert_eq!(groups, vec!["project", "bigboat", "version_control", "jenkins"]);

        let vcs = &schema.groups["version_control"];
        assert!(vcs.cloneable);
        assert_eq!(vcs.sections, Some(SectionKind::VersionControl));
        assert_eq!(
            vcs.fields["version_control_domain"].kind,
            FieldKind::Host
        );
    }

    #[test]
    fn test_option_path_deserializes() {
        let schema = Schema::load_from_string(
            "bigboat:\n  fields:\n    bigboat_url:\n      field: string\n      option: [settings, bigboat, host]\n",
        )
        .unwrap();
        let field = &schema.groups["bigboat"].fields["bigboat_url"];
        assert_eq!(
            field.option,
            Some(OptionPath(
                StoreName::Settings,
                "bigboat".to_owned(),
                "host".to_owned()
            ))
        );
    }

    #[test]
    fn test_yaml_error_reports_location() {
        let err = Schema::load_from_string("project:\n  fields: [\n").unwrap_err();
        assert!(err.to_string().contains("line"), "{err}");
    }

    #[test]
    fn test_choice_without_choices_rejected() {
        let err = Schema::load_from_string(
            "vcs:\n  fields:\n    vcs_type:\n      field: choice\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("has no choices"));
    }

    #[test]
    fn test_repeated_group_needs_sections() {
        let err = Schema::load_from_string(
            "vcs:\n  cloneable: true\n  fields:\n    vcs_domain:\n      field: host\n",
        )
        .unwrap_err();
        let err = err.downcast_ref::<AgentConfigError>().unwrap();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_duplicate_field_names_rejected() {
        let err = Schema::load_from_string(
            "a:\n  fields:\n    x:\n      field: string\nb:\n  fields:\n    x:\n      field: flag\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_groups_and_fields_keep_file_order() {
        let schema = Schema::load_from_string(
            "zeta:\n  fields:\n    zeta_b:\n      field: string\n    zeta_a:\n      field: string\n\
             alpha:\n  fields:\n    alpha_x:\n      field: flag\n",
        )
        .unwrap();
        let groups: Vec<&str> = schema.groups.keys().map(String::as_str).collect();
        assert_eq!(groups, vec!["zeta", "alpha"]);
        let fields: Vec<&str> = schema.groups["zeta"].fields.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["zeta_b", "zeta_a"]);
    }

    #[test]
    fn test_map_needs_key_and_value() {
        let err = Schema::load_from_string(
            "a:\n  fields:\n    rows:\n      field: map\n      key:\n        field: string\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("needs both a key and a value"));
    }

    #[test]
    fn test_load_from_missing_file() {
        let system = MockSystem::new();
        let err = Schema::load_from_file(&system, Path::new("/form.yml")).unwrap_err();
        assert!(err.to_string().contains("Form schema not found"));
    }

    #[test]
    fn test_load_from_file() {
        let system = MockSystem::new().with_file(
            "/form.yml",
            b"project:\n  fields:\n    jira_key:\n      field: string\n      required: true\n",
        );
        let schema = Schema::load_from_file(&system, Path::new("/form.yml")).unwrap();
        assert!(schema.groups["project"].fields["jira_key"].required);
    }
}
