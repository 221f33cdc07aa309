//! Field registry built once from the schema

use crate::error::AgentConfigError;
use crate::form::fields::Field;
use crate::form::rules::Rule;
use crate::form::schema::{FieldSpec, OptionPath, Schema, SectionKind};
use crate::store::ConfigDocument;
use crate::system::System;
use anyhow::Result;
use std::path::Path;
use tracing::debug;

/// Type stored in a Jenkins credentials section
pub const JENKINS_TYPE: &str = "jenkins";

/// Where the current value of a field comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    Rule(Rule),
    Option(OptionPath),
    Nothing,
}

/// A field with its parser, value source and presentation attributes
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub field: Field,
    pub source: ValueSource,
    pub spec: FieldSpec,
}

/// A group with its fields in schema order
#[derive(Debug, Clone)]
pub struct GroupDef {
    pub name: String,
    pub label: String,
    pub icon: Option<String>,
    pub cloneable: bool,
    pub sections: Option<SectionKind>,
    pub fields: Vec<FieldDef>,
}

/// Immutable registry of groups and fields, shared by every request
#[derive(Debug, Clone)]
pub struct FormRegistry {
    groups: Vec<GroupDef>,
    vcs_types: Vec<String>,
}

impl FormRegistry {
    /// Build the registry from a validated schema
    ///
    /// # Errors
    ///
    /// Returns an error if a field names an unknown derivation rule.
    pub fn new(schema: &Schema) -> Result<Self> {
        let mut groups = Vec::with_capacity(schema.groups.len());
        let mut vcs_types = Vec::new();

        for (group_name, group) in &schema.groups {
            let mut fields = Vec::with_capacity(group.fields.len());
            for (name, spec) in &group.fields {
                let source = match (spec.rule.as_deref(), spec.option.as_ref()) {
                    (Some(rule), _) => ValueSource::Rule(rule.parse().map_err(|_| {
                        AgentConfigError::configuration(format!(
                            "Field '{name}' uses unknown rule '{rule}'"
                        ))
                    })?),
                    (None, Some(option)) => ValueSource::Option(option.clone()),
                    (None, None) => ValueSource::Nothing,
                };
                if source == ValueSource::Rule(Rule::VersionControlType) {
                    vcs_types.extend(spec.choices.iter().flat_map(|c| c.keys().cloned()));
                }
                fields.push(FieldDef {
                    name: name.clone(),
                    field: Field::from_spec(name, spec)?,
                    source,
                    spec: spec.clone(),
                });
            }

            groups.push(GroupDef {
                name: group_name.clone(),
                label: group.label.clone().unwrap_or_else(|| group_name.clone()),
                icon: group.icon.clone(),
                cloneable: group.cloneable,
                sections: group.sections,
                fields,
            });
        }

        debug!(
            "Form registry with {} groups, version control types {:?}",
            groups.len(),
            vcs_types
        );
        Ok(Self { groups, vcs_types })
    }

    /// Load the schema from `path`, or the embedded schema, and build the registry
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be loaded or is invalid.
    pub fn load(system: &dyn System, path: Option<&Path>) -> Result<Self> {
        let schema = match path {
            Some(path) => Schema::load_from_file(system, path)?,
            None => Schema::embedded()?,
        };
        Self::new(&schema)
    }

    #[must_use]
    pub fn groups(&self) -> &[GroupDef] {
        &self.groups
    }

    /// Choices of the version control type field
    #[must_use]
    pub fn vcs_types(&self) -> &[String] {
        &self.vcs_types
    }

    /// Look up a field by name in any group
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.groups
            .iter()
            .flat_map(|group| group.fields.iter())
            .find(|field| field.name == name)
    }

    /// Kind of repeated group that owns a credentials section, if any
    #[must_use]
    pub fn owner(&self, credentials: &ConfigDocument, section: &str) -> Option<SectionKind> {
        match credentials.get(section, "type") {
            Some(JENKINS_TYPE) => Some(SectionKind::Jenkins),
            None => Some(SectionKind::VersionControl),
            Some(vcs_type) if self.vcs_types.iter().any(|t| t == vcs_type) => {
                Some(SectionKind::VersionControl)
            }
            Some(_) => None,
        }
    }

    /// Whether a credentials section belongs to a group of the given kind
    #[must_use]
    pub fn owns(&self, kind: SectionKind, credentials: &ConfigDocument, section: &str) -> bool {
        credentials.has_section(section) && self.owner(credentials, section) == Some(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::schema::FieldKind;

    #[test]
    fn test_embedded_registry() {
        let registry = FormRegistry::new(&Schema::embedded().unwrap()).unwrap();
        let names: Vec<&str> = registry.groups().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["project", "bigboat", "version_control", "jenkins"]);
        assert_eq!(
            registry.vcs_types(),
            ["gitlab", "github", "tfs", "git", "subversion"]
        );

        let key = registry.field("version_control_key").unwrap();
        assert_eq!(key.field.kind(), FieldKind::Secret);
        assert_eq!(key.source, ValueSource::Rule(Rule::VersionControlKey));

        let enable = registry.field("quality_report_enable").unwrap();
        assert!(matches!(enable.source, ValueSource::Option(_)));
    }

    #[test]
    fn test_unknown_rule_rejected() {
        let schema = Schema::load_from_string(
            "a:\n  fields:\n    x:\n      field: string\n      rule: no_such_rule\n",
        )
        .unwrap();
        let err = FormRegistry::new(&schema).unwrap_err();
        assert!(err.to_string().contains("unknown rule 'no_such_rule'"));
    }

    #[test]
    fn test_section_ownership() {
        let registry = FormRegistry::new(&Schema::embedded().unwrap()).unwrap();
        let credentials = ConfigDocument::parse(
            "[gitlab.example]\ntype=gitlab\n[svn.example]\nusername=u\n[jenkins.example]\ntype=jenkins\n[jira.example]\ntype=jira\n",
        );

        assert!(registry.owns(SectionKind::VersionControl, &credentials, "gitlab.example"));
        assert!(registry.owns(SectionKind::VersionControl, &credentials, "svn.example"));
        assert!(registry.owns(SectionKind::Jenkins, &credentials, "jenkins.example"));
        assert!(!registry.owns(SectionKind::VersionControl, &credentials, "jenkins.example"));
        assert_eq!(registry.owner(&credentials, "jira.example"), None);
        assert!(!registry.owns(SectionKind::VersionControl, &credentials, "missing.example"));
    }
}
