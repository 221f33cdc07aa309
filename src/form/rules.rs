//! Derivation rules computing the current value of a field from the stores
//!
//! Version control and Jenkins fields read the credentials section matched
//! to their form instance by position: the Nth section is used by the form
//! instance with clone index N, provided it is owned by that group. Writing
//! keeps version control sections first and Jenkins sections after them so
//! that this correlation holds on the next read.

use crate::form::fields::get_domain;
use crate::form::registry::{FieldDef, FormRegistry, ValueSource};
use crate::form::schema::{FieldKind, OptionPath, SectionKind};
use crate::form::value::{FieldValue, Pair};
use crate::store::{ConfigDocument, EXISTING_VALUE, StoreName, Storage, has_value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const PROJECTS: &str = "projects";
const LEGACY_JENKINS: &str = "jenkins";

/// Named derivation rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    JiraKey,
    QualityReportName,
    VersionControlType,
    VersionControlDomain,
    VersionControlAuth,
    VersionControlUser,
    VersionControlToken,
    VersionControlKey,
    VersionControlGroup,
    VersionControlUnsafe,
    VersionControlSkipStats,
    VersionControlSource,
    VersionControlFromDate,
    VersionControlTag,
    JenkinsHost,
    JenkinsUser,
    JenkinsToken,
    JenkinsUnsafe,
}

impl Rule {
    pub const ALL: [Self; 18] = [
        Self::JiraKey,
        Self::QualityReportName,
        Self::VersionControlType,
        Self::VersionControlDomain,
        Self::VersionControlAuth,
        Self::VersionControlUser,
        Self::VersionControlToken,
        Self::VersionControlKey,
        Self::VersionControlGroup,
        Self::VersionControlUnsafe,
        Self::VersionControlSkipStats,
        Self::VersionControlSource,
        Self::VersionControlFromDate,
        Self::VersionControlTag,
        Self::JenkinsHost,
        Self::JenkinsUser,
        Self::JenkinsToken,
        Self::JenkinsUnsafe,
    ];

    /// Name used in the schema
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::JiraKey => "jira_key",
            Self::QualityReportName => "quality_report_name",
            Self::VersionControlType => "version_control_type",
            Self::VersionControlDomain => "version_control_domain",
            Self::VersionControlAuth => "version_control_auth",
            Self::VersionControlUser => "version_control_user",
            Self::VersionControlToken => "version_control_token",
            Self::VersionControlKey => "version_control_key",
            Self::VersionControlGroup => "version_control_group",
            Self::VersionControlUnsafe => "version_control_unsafe",
            Self::VersionControlSkipStats => "version_control_skip_stats",
            Self::VersionControlSource => "version_control_source",
            Self::VersionControlFromDate => "version_control_from_date",
            Self::VersionControlTag => "version_control_tag",
            Self::JenkinsHost => "jenkins_host",
            Self::JenkinsUser => "jenkins_user",
            Self::JenkinsToken => "jenkins_token",
            Self::JenkinsUnsafe => "jenkins_unsafe",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Rule {
    type Err = DeriveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|rule| rule.name() == s)
            .ok_or_else(|| DeriveError::UnknownRule(s.to_owned()))
    }
}

/// Failure to derive a field value; caught per field
#[derive(Debug, Error)]
pub enum DeriveError {
    #[error("No credentials section owned by this form at position {0}")]
    MissingSection(usize),

    #[error("Cannot read data sources of project {project}: {message}")]
    Sources { project: String, message: String },

    #[error("Unknown derivation rule: {0}")]
    UnknownRule(String),
}

/// Outcome of a rule, before it is resolved against the stores
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Derived {
    Value(FieldValue),
    Lookup {
        store: StoreName,
        section: String,
        option: String,
    },
    Columns {
        keys: Vec<String>,
        values: Vec<String>,
    },
    Nothing,
}

impl Derived {
    fn lookup(store: StoreName, section: &str, option: &str) -> Self {
        Self::Lookup {
            store,
            section: section.to_owned(),
            option: option.to_owned(),
        }
    }

    fn text<S: Into<String>>(value: S) -> Self {
        Self::Value(FieldValue::Text(value.into()))
    }

    fn flag(value: bool) -> Self {
        Self::Value(FieldValue::Flag(value))
    }
}

/// Everything a rule may consult for one form instance
pub struct DeriveContext<'a> {
    pub settings: &'a ConfigDocument,
    pub credentials: &'a ConfigDocument,
    pub storage: &'a Storage<'a>,
    pub registry: &'a FormRegistry,
    /// Position of the instance among all repeated form instances, from 1
    pub clone_index: usize,
    /// Credentials sections owned by the instance's group
    pub sections: Option<SectionKind>,
    /// Values submitted for the sibling fields, when binding a submission
    pub submitted: Option<&'a IndexMap<String, FieldValue>>,
}

impl<'a> DeriveContext<'a> {
    fn document(&self, store: StoreName) -> &'a ConfigDocument {
        match store {
            StoreName::Settings => self.settings,
            StoreName::Credentials => self.credentials,
        }
    }

    /// Section matched to the instance by position
    fn positional_section(&self) -> Result<&'a str, DeriveError> {
        let section = self
            .clone_index
            .checked_sub(1)
            .and_then(|index| self.credentials.section_at(index))
            .ok_or(DeriveError::MissingSection(self.clone_index))?;

        match self.sections {
            Some(kind) if !self.registry.owns(kind, self.credentials, section) => {
                Err(DeriveError::MissingSection(self.clone_index))
            }
            _ => Ok(section),
        }
    }

    /// Section named by a submitted sibling field when it exists, else the
    /// positional section
    ///
    /// Secrets follow their domain even when sections were reordered.
    fn credentials_section(&self, prefer: &str) -> Result<&'a str, DeriveError> {
        if let Some(domain) = self
            .submitted
            .and_then(|data| data.get(prefer))
            .map(FieldValue::as_text)
            && self.credentials.has_section(domain)
        {
            return Ok(domain);
        }
        self.positional_section()
    }

    fn credential(&self, section: &str, option: &str) -> Option<&'a str> {
        self.credentials.get(section, option)
    }

    fn has_credential(&self, section: &str, option: &str) -> bool {
        has_value(self.credential(section, option))
    }

    /// Resolve a rule outcome into a field value of the given kind
    #[must_use]
    pub fn resolve(&self, derived: Derived, kind: FieldKind) -> FieldValue {
        let value = match derived {
            Derived::Value(value) => value,
            Derived::Lookup {
                store,
                section,
                option,
            } => self
                .document(store)
                .get(&section, &option)
                .map_or_else(|| FieldValue::empty(kind), FieldValue::text),
            Derived::Columns { keys, values } => {
                let mut values = values.into_iter();
                FieldValue::Pairs(
                    keys.into_iter()
                        .map(|key| Pair::new(key, values.next().unwrap_or_default()))
                        .collect(),
                )
            }
            Derived::Nothing => FieldValue::empty(kind),
        };
        value.normalize(kind)
    }

    /// Derive the current value of a field
    ///
    /// # Errors
    ///
    /// Returns the error of the field's rule.
    pub fn derive_value(&self, def: &FieldDef) -> Result<FieldValue, DeriveError> {
        let derived = match &def.source {
            ValueSource::Rule(rule) => self.derive(*rule)?,
            ValueSource::Option(OptionPath(store, section, option)) => {
                Derived::lookup(*store, section, option)
            }
            ValueSource::Nothing => Derived::Nothing,
        };
        Ok(self.resolve(derived, def.field.kind()))
    }

    /// Apply a rule
    ///
    /// # Errors
    ///
    /// Returns an error if the rule needs a credentials section that the
    /// instance does not have, or if a data source sidecar is unreadable.
    pub fn derive(&self, rule: Rule) -> Result<Derived, DeriveError> {
        match rule {
            Rule::JiraKey => Ok(self
                .settings
                .keys(PROJECTS)
                .first()
                .map_or(Derived::Nothing, |key| Derived::text(*key))),
            Rule::QualityReportName => Ok(self.quality_report_name()),
            Rule::VersionControlType => Ok(Derived::text(self.version_control_type()?)),
            Rule::VersionControlDomain => Ok(Derived::text(self.positional_section()?)),
            Rule::VersionControlAuth => Ok(Derived::text(self.version_control_auth()?)),
            Rule::VersionControlUser => {
                let section = self.positional_section()?;
                Ok(if self.has_credential(section, "username") {
                    Derived::lookup(StoreName::Credentials, section, "username")
                } else {
                    Derived::Nothing
                })
            }
            Rule::VersionControlToken => {
                let section = self.credentials_section("version_control_domain")?;
                Ok(["password", "github_token", "gitlab_token"]
                    .into_iter()
                    .find(|option| self.has_credential(section, option))
                    .map_or(Derived::Nothing, |option| {
                        Derived::lookup(StoreName::Credentials, section, option)
                    }))
            }
            Rule::VersionControlKey => Ok(self.version_control_key()),
            Rule::VersionControlGroup => {
                let section = self.positional_section()?;
                Ok(match self.credential(section, "tfs") {
                    Some("true") => Derived::Nothing,
                    tfs if has_value(tfs) => Derived::lookup(StoreName::Credentials, section, "tfs"),
                    _ if self.has_credential(section, "group") => {
                        Derived::lookup(StoreName::Credentials, section, "group")
                    }
                    _ => Derived::Nothing,
                })
            }
            Rule::VersionControlUnsafe => {
                let section = self.positional_section()?;
                Ok(Derived::flag(self.has_credential(section, "unsafe_hosts")))
            }
            Rule::VersionControlSkipStats => {
                let section = self.positional_section()?;
                Ok(Derived::flag(self.has_credential(section, "skip_stats")))
            }
            Rule::VersionControlSource => self.version_control_source(),
            Rule::VersionControlFromDate => Ok(Derived::lookup(
                StoreName::Credentials,
                self.positional_section()?,
                "from_date",
            )),
            Rule::VersionControlTag => Ok(Derived::lookup(
                StoreName::Credentials,
                self.positional_section()?,
                "tag",
            )),
            Rule::JenkinsHost => Ok(match self.positional_section() {
                Ok(section) => Derived::text(section),
                Err(_) => self
                    .settings
                    .get(LEGACY_JENKINS, "host")
                    .map_or(Derived::Nothing, |host| Derived::text(get_domain(host))),
            }),
            Rule::JenkinsUser => Ok(match self.positional_section() {
                Ok(section) => Derived::lookup(StoreName::Credentials, section, "username"),
                Err(_) => Derived::lookup(StoreName::Settings, LEGACY_JENKINS, "username"),
            }),
            Rule::JenkinsToken => Ok(match self.credentials_section("jenkins_host") {
                Ok(section) => Derived::lookup(StoreName::Credentials, section, "password"),
                Err(_) => Derived::lookup(StoreName::Settings, LEGACY_JENKINS, "password"),
            }),
            Rule::JenkinsUnsafe => Ok(Derived::flag(match self.positional_section() {
                Ok(section) => self.has_credential(section, "unsafe_hosts"),
                Err(_) => self.legacy_jenkins_unsafe(),
            })),
        }
    }

    fn quality_report_name(&self) -> Derived {
        if !self.settings.has_section(PROJECTS) {
            return Derived::Columns {
                keys: vec![String::new()],
                values: vec![String::new()],
            };
        }
        let keys: Vec<String> = self
            .settings
            .keys(PROJECTS)
            .into_iter()
            .map(str::to_owned)
            .collect();
        let values = keys
            .iter()
            .map(|key| self.settings.get(PROJECTS, key).unwrap_or_default().to_owned())
            .collect();
        Derived::Columns { keys, values }
    }

    fn version_control_type(&self) -> Result<&'a str, DeriveError> {
        let section = self.positional_section()?;
        if let Some(vcs_type) = self.credential(section, "type")
            && has_value(Some(vcs_type))
        {
            return Ok(vcs_type);
        }
        Ok(if self.has_credential(section, "tfs") {
            "tfs"
        } else if self.has_credential(section, "gitlab_token")
            || self.has_credential(section, "group")
        {
            "gitlab"
        } else if self.has_credential(section, "github_token") {
            "github"
        } else if self.has_credential(section, "env") {
            "git"
        } else {
            "subversion"
        })
    }

    fn version_control_auth(&self) -> Result<&'a str, DeriveError> {
        let section = self.positional_section()?;
        Ok(if self.has_credential(section, "github_token") {
            "github_api"
        } else if self.has_credential(section, "gitlab_token") {
            "gitlab_api"
        } else if self.has_credential(section, "env") {
            "deploy_key"
        } else if self.has_credential(section, "username") {
            "user_pass"
        } else {
            "none"
        })
    }

    fn version_control_key(&self) -> Derived {
        let system = self.storage.system();
        let domain_key = self
            .credentials_section("version_control_domain")
            .ok()
            .is_some_and(|section| system.exists(&self.storage.domain_key_path(section)));
        if domain_key || system.exists(&self.storage.default_key_path()) {
            Derived::text(EXISTING_VALUE)
        } else {
            Derived::Nothing
        }
    }

    fn version_control_source(&self) -> Result<Derived, DeriveError> {
        let keys = self.settings.keys(PROJECTS);
        let Some(main_key) = keys.first() else {
            return Ok(Derived::Nothing);
        };
        // Collected sources replace the dummy ones once a report name is set
        if has_value(self.settings.get(PROJECTS, main_key)) {
            return Ok(Derived::Nothing);
        }

        let sources = self
            .storage
            .read_sources(main_key)
            .map_err(|e| DeriveError::Sources {
                project: (*main_key).to_owned(),
                message: format!("{e:#}"),
            })?;
        let Some(sources) = sources else {
            return Ok(Derived::Nothing);
        };

        let domain = self.positional_section()?;
        let (keys, values): (Vec<String>, Vec<String>) = sources
            .iter()
            .filter_map(|source| {
                source
                    .dummy_label(domain)
                    .map(|label| (label.to_owned(), source.url.clone()))
            })
            .unzip();
        Ok(Derived::Columns { keys, values })
    }

    /// Unsafe only for a configured HTTPS host without `verify`; no host means safe
    fn legacy_jenkins_unsafe(&self) -> bool {
        let host = self.settings.get(LEGACY_JENKINS, "host");
        has_value(host)
            && !host.is_some_and(|host| host.starts_with("http://"))
            && !has_value(self.settings.get(LEGACY_JENKINS, "verify"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::form::schema::Schema;
    use crate::system::MockSystem;

    struct Fixture {
        system: MockSystem,
        options: Options,
        registry: FormRegistry,
        settings: ConfigDocument,
        credentials: ConfigDocument,
    }

    impl Fixture {
        fn new(settings: &str, credentials: &str) -> Self {
            Self {
                system: MockSystem::new(),
                options: Options::rooted("/agent"),
                registry: FormRegistry::new(&Schema::embedded().unwrap()).unwrap(),
                settings: ConfigDocument::parse(settings),
                credentials: ConfigDocument::parse(credentials),
            }
        }

        fn derive(&self, rule: Rule, clone_index: usize, sections: SectionKind) -> Result<Derived, DeriveError> {
            let storage = Storage::new(&self.system, &self.options);
            let context = DeriveContext {
                settings: &self.settings,
                credentials: &self.credentials,
                storage: &storage,
                registry: &self.registry,
                clone_index,
                sections: Some(sections),
                submitted: None,
            };
            context.derive(rule)
        }
    }

    #[test]
    fn test_rule_names_round_trip() {
        for rule in Rule::ALL {
            assert_eq!(rule.name().parse::<Rule>().unwrap(), rule);
        }
        assert!("bogus".parse::<Rule>().is_err());
    }

    #[test]
    fn test_vcs_rules_need_an_owned_section() {
        let fixture = Fixture::new("", "[jenkins.example]\ntype=jenkins\n");
        let err = fixture
            .derive(Rule::VersionControlDomain, 1, SectionKind::VersionControl)
            .unwrap_err();
        assert!(matches!(err, DeriveError::MissingSection(1)));
    }

    #[test]
    fn test_explicit_type_wins() {
        let fixture = Fixture::new("", "[g.example]\ntype=github\ngitlab_token=t\n");
        let derived = fixture
            .derive(Rule::VersionControlType, 1, SectionKind::VersionControl)
            .unwrap();
        assert_eq!(derived, Derived::text("github"));
    }

    #[test]
    fn test_group_rule_skips_tfs_marker() {
        let fixture = Fixture::new("", "[t.example]\ntfs=true\ngroup=grp\n[u.example]\ntfs=coll\n");
        assert_eq!(
            fixture
                .derive(Rule::VersionControlGroup, 1, SectionKind::VersionControl)
                .unwrap(),
            Derived::Nothing
        );
        assert_eq!(
            fixture
                .derive(Rule::VersionControlGroup, 2, SectionKind::VersionControl)
                .unwrap(),
            Derived::lookup(StoreName::Credentials, "u.example", "tfs")
        );
    }

    #[test]
    fn test_legacy_jenkins_settings() {
        let fixture = Fixture::new(
            "[jenkins]\nhost=https://jenkins.example:8443/\nusername=ci\npassword=pw\n",
            "[g.example]\ntype=gitlab\n",
        );
        assert_eq!(
            fixture.derive(Rule::JenkinsHost, 2, SectionKind::Jenkins).unwrap(),
            Derived::text("jenkins.example:8443")
        );
        assert_eq!(
            fixture.derive(Rule::JenkinsUser, 2, SectionKind::Jenkins).unwrap(),
            Derived::lookup(StoreName::Settings, "jenkins", "username")
        );
        assert_eq!(
            fixture.derive(Rule::JenkinsUnsafe, 2, SectionKind::Jenkins).unwrap(),
            Derived::flag(true)
        );
    }

    #[test]
    fn test_legacy_jenkins_verify_or_http_is_safe() {
        let verify = Fixture::new("[jenkins]\nhost=https://j.example\nverify=1\n", "");
        assert_eq!(
            verify.derive(Rule::JenkinsUnsafe, 1, SectionKind::Jenkins).unwrap(),
            Derived::flag(false)
        );
        let http = Fixture::new("[jenkins]\nhost=http://j.example\n", "");
        assert_eq!(
            http.derive(Rule::JenkinsUnsafe, 1, SectionKind::Jenkins).unwrap(),
            Derived::flag(false)
        );
        let missing = Fixture::new("", "");
        assert_eq!(
            missing.derive(Rule::JenkinsUnsafe, 1, SectionKind::Jenkins).unwrap(),
            Derived::flag(false)
        );
        let reset = Fixture::new("[jenkins]\nhost=\nverify=\n", "");
        assert_eq!(
            reset.derive(Rule::JenkinsUnsafe, 1, SectionKind::Jenkins).unwrap(),
            Derived::flag(false)
        );
    }

    #[test]
    fn test_quality_report_name_columns() {
        let fixture = Fixture::new("[projects]\nABC=abc\nDEF=\n", "");
        assert_eq!(
            fixture
                .derive(Rule::QualityReportName, 1, SectionKind::VersionControl)
                .unwrap(),
            Derived::Columns {
                keys: vec!["ABC".to_owned(), "DEF".to_owned()],
                values: vec!["abc".to_owned(), String::new()],
            }
        );
    }

    #[test]
    fn test_resolve_lookup_normalizes() {
        let fixture = Fixture::new("[definitions]\nname=quality-report-data\n[x]\ny=-\n", "");
        let storage = Storage::new(&fixture.system, &fixture.options);
        let context = DeriveContext {
            settings: &fixture.settings,
            credentials: &fixture.credentials,
            storage: &storage,
            registry: &fixture.registry,
            clone_index: 1,
            sections: None,
            submitted: None,
        };
        assert_eq!(
            context.resolve(
                Derived::lookup(StoreName::Settings, "definitions", "name"),
                FieldKind::Flag
            ),
            FieldValue::Flag(true)
        );
        assert_eq!(
            context.resolve(Derived::lookup(StoreName::Settings, "x", "y"), FieldKind::String),
            FieldValue::text("")
        );
        assert_eq!(
            context.resolve(
                Derived::lookup(StoreName::Settings, "missing", "y"),
                FieldKind::Flag
            ),
            FieldValue::Flag(false)
        );
    }
}
