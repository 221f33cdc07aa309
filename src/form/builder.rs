//! Expansion of the schema into form instances

use crate::form::registry::{FieldDef, FormRegistry, GroupDef};
use crate::form::rules::{DeriveContext, DeriveError};
use crate::form::value::FieldValue;
use crate::store::{ConfigDocument, Storage};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// A field of one form instance with its values and validation outcome
#[derive(Debug, Clone)]
pub struct BoundField<'r> {
    pub def: &'r FieldDef,
    /// Derived value, captured before submitted data replaces it
    pub original: FieldValue,
    pub value: FieldValue,
    pub error: Option<String>,
}

impl<'r> BoundField<'r> {
    fn new(def: &'r FieldDef) -> Self {
        let empty = def.field.empty();
        Self {
            def,
            original: empty.clone(),
            value: empty,
            error: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'r str {
        &self.def.name
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// One occurrence of a group: the single instance of a plain group, or one
/// of the repeated instances of a cloneable group
#[derive(Debug, Clone)]
pub struct FormInstance<'r> {
    pub group: &'r GroupDef,
    /// Position among the instances of the group, from 1
    pub sequence: usize,
    /// `group_N` for repeated groups, the group name otherwise
    pub id: String,
    /// Position among all repeated instances, from 1; indexes credentials sections
    pub clone_index: usize,
    pub fields: Vec<BoundField<'r>>,
    /// Part of the submitted body bound to this instance
    pub body: Option<Map<String, Value>>,
}

impl<'r> FormInstance<'r> {
    fn new(group: &'r GroupDef, sequence: usize, clone_index: usize) -> Self {
        let id = if group.cloneable {
            format!("{}_{sequence}", group.name)
        } else {
            group.name.clone()
        };
        Self {
            group,
            sequence,
            id,
            clone_index,
            fields: group.fields.iter().map(BoundField::new).collect(),
            body: None,
        }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&BoundField<'r>> {
        self.fields.iter().find(|field| field.name() == name)
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.fields.iter().all(BoundField::is_valid)
    }

    /// Current values by field name
    #[must_use]
    pub fn values(&self) -> IndexMap<String, FieldValue> {
        self.fields
            .iter()
            .map(|field| (field.name().to_owned(), field.value.clone()))
            .collect()
    }

    /// Derivation context of this instance
    #[must_use]
    pub fn context<'a>(
        &self,
        settings: &'a ConfigDocument,
        credentials: &'a ConfigDocument,
        storage: &'a Storage<'a>,
        registry: &'a FormRegistry,
        submitted: Option<&'a IndexMap<String, FieldValue>>,
    ) -> DeriveContext<'a> {
        DeriveContext {
            settings,
            credentials,
            storage,
            registry,
            clone_index: self.clone_index,
            sections: self.group.sections,
            submitted,
        }
    }
}

/// Expand the schema into form instances
///
/// Repeated groups get one instance per `group_N` key of the body, or
/// without a body, one per consecutive credentials section owned by the
/// group. The first instance of every group always exists.
#[must_use]
pub fn build_forms<'r>(
    registry: &'r FormRegistry,
    body: Option<&Map<String, Value>>,
    credentials: &ConfigDocument,
) -> Vec<FormInstance<'r>> {
    let mut forms = Vec::new();
    let mut clone_index = 1;

    for group in registry.groups() {
        if !group.cloneable {
            forms.push(FormInstance::new(group, 1, 1));
            continue;
        }

        let mut sequence = 1;
        loop {
            forms.push(FormInstance::new(group, sequence, clone_index));
            sequence += 1;
            clone_index += 1;
            if !has_form(registry, group, body, credentials, sequence, clone_index) {
                break;
            }
        }
    }

    debug!("Built {} form instances", forms.len());
    forms
}

fn has_form(
    registry: &FormRegistry,
    group: &GroupDef,
    body: Option<&Map<String, Value>>,
    credentials: &ConfigDocument,
    sequence: usize,
    clone_index: usize,
) -> bool {
    if let Some(body) = body {
        return body.contains_key(&format!("{}_{sequence}", group.name));
    }
    let (Some(kind), Some(section)) = (group.sections, credentials.section_at(clone_index - 1))
    else {
        return false;
    };
    registry.owns(kind, credentials, section)
}

/// Fill every field with its value derived from the stores
///
/// A field whose rule fails is left empty.
pub fn derive_defaults(
    forms: &mut [FormInstance<'_>],
    settings: &ConfigDocument,
    credentials: &ConfigDocument,
    storage: &Storage<'_>,
    registry: &FormRegistry,
) {
    for form in forms.iter_mut() {
        let context = form.context(settings, credentials, storage, registry, None);
        for field in &mut form.fields {
            field.value = derive_or_empty(&context, field.def, &form.id);
        }
    }
}

/// Derive a field value, logging failures and falling back to empty
fn derive_or_empty(context: &DeriveContext<'_>, def: &FieldDef, form_id: &str) -> FieldValue {
    match context.derive_value(def) {
        Ok(value) => value,
        Err(err) => {
            log_derive_error(&err, def, form_id);
            def.field.empty()
        }
    }
}

pub(crate) fn log_derive_error(err: &DeriveError, def: &FieldDef, form_id: &str) {
    match err {
        DeriveError::MissingSection(_) => {
            debug!("No stored value for {} in {}: {}", def.name, form_id, err);
        }
        DeriveError::Sources { .. } | DeriveError::UnknownRule(_) => {
            warn!("Cannot derive {} in {}: {}", def.name, form_id, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::form::schema::{Schema, SectionKind};
    use crate::system::MockSystem;
    use serde_json::json;

    fn registry() -> FormRegistry {
        FormRegistry::new(&Schema::embedded().unwrap()).unwrap()
    }

    fn instance_count(forms: &[FormInstance<'_>], kind: SectionKind) -> usize {
        forms
            .iter()
            .filter(|form| form.group.sections == Some(kind))
            .count()
    }

    fn ids(forms: &[FormInstance<'_>]) -> Vec<(String, usize)> {
        forms
            .iter()
            .map(|form| (form.id.clone(), form.clone_index))
            .collect()
    }

    #[test]
    fn test_first_instance_always_present() {
        let registry = registry();
        let forms = build_forms(&registry, None, &ConfigDocument::new());
        assert_eq!(
            ids(&forms),
            vec![
                ("project".to_owned(), 1),
                ("bigboat".to_owned(), 1),
                ("version_control_1".to_owned(), 1),
                ("jenkins_1".to_owned(), 2),
            ]
        );
    }

    #[test]
    fn test_instances_follow_owned_sections() {
        let registry = registry();
        let credentials = ConfigDocument::parse(
            "[a.example]\ntype=gitlab\n[b.example]\ngithub_token=t\n[j.example]\ntype=jenkins\n",
        );
        let forms = build_forms(&registry, None, &credentials);
        assert_eq!(
            ids(&forms)[2..],
            [
                ("version_control_1".to_owned(), 1),
                ("version_control_2".to_owned(), 2),
                ("jenkins_1".to_owned(), 3),
            ]
        );
        assert_eq!(instance_count(&forms, SectionKind::VersionControl), 2);
    }

    #[test]
    fn test_instances_follow_body_keys() {
        let registry = registry();
        let body = json!({
            "jira_key": "ABC",
            "version_control_1": {},
            "version_control_2": {},
            "version_control_3": {},
            "jenkins_1": {},
            "jenkins_2": {}
        });
        let forms = build_forms(&registry, body.as_object(), &ConfigDocument::new());
        assert_eq!(instance_count(&forms, SectionKind::VersionControl), 3);
        assert_eq!(instance_count(&forms, SectionKind::Jenkins), 2);
        assert_eq!(forms.last().unwrap().clone_index, 5);
    }

    #[test]
    fn test_derive_defaults_from_stores() {
        let registry = registry();
        let system = MockSystem::new().with_file("/agent/keys/id_rsa", b"key");
        let options = Options::rooted("/agent");
        let storage = Storage::new(&system, &options);
        let settings = ConfigDocument::parse("[projects]\nABC=\n[bigboat]\nhost=http://b.example\nkey=k\n");
        let credentials =
            ConfigDocument::parse("[gitlab.example]\ngitlab_token=tok\ngroup=grp\n");

        let mut forms = build_forms(&registry, None, &credentials);
        derive_defaults(&mut forms, &settings, &credentials, &storage, &registry);

        let project = &forms[0];
        assert_eq!(project.field("jira_key").unwrap().value, FieldValue::text("ABC"));
        let vcs = &forms[2];
        assert_eq!(
            vcs.field("version_control_type").unwrap().value,
            FieldValue::text("gitlab")
        );
        assert_eq!(
            vcs.field("version_control_auth").unwrap().value,
            FieldValue::text("gitlab_api")
        );
        assert_eq!(
            vcs.field("version_control_token").unwrap().value,
            FieldValue::text("tok")
        );
        assert_eq!(
            vcs.field("version_control_key").unwrap().value,
            FieldValue::text("<existing>")
        );
        assert_eq!(
            vcs.field("version_control_unsafe").unwrap().value,
            FieldValue::Flag(false)
        );

        let jenkins = &forms[3];
        assert_eq!(jenkins.field("jenkins_host").unwrap().value, FieldValue::text(""));
    }
}
