//! Writing a valid submission back to the configuration files
//!
//! All outputs are computed into a [`WritePlan`] first. Committing stages
//! every file next to its target and only then moves them into place, so a
//! missing directory or a refused write leaves the existing files alone.

use crate::error::AgentConfigError;
use crate::form::{FormInstance, FormRegistry, Pair, SectionKind, Submission};
use crate::store::{
    ConfigDocument, EXISTING_VALUE, PLACEHOLDER, Section, SourceDescriptor, StoreName, Storage,
    has_value,
};
use crate::system::{StagedFile, System};
use crate::utils::path::validate_file_component;
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const JIRA_KEY: &str = "jira_key";
const QUALITY_REPORT_NAME: &str = "quality_report_name";
const QUALITY_REPORT_ENABLE: &str = "quality_report_enable";
const QUALITY_TIME_URL: &str = "quality_time_url";
const BIGBOAT_URL: &str = "bigboat_url";
const BIGBOAT_KEY: &str = "bigboat_key";
const VCS_TYPE: &str = "version_control_type";
const VCS_DOMAIN: &str = "version_control_domain";
const VCS_AUTH: &str = "version_control_auth";
const VCS_USER: &str = "version_control_user";
const VCS_TOKEN: &str = "version_control_token";
const VCS_KEY: &str = "version_control_key";
const VCS_GROUP: &str = "version_control_group";
const VCS_SOURCE: &str = "version_control_source";
const VCS_UNSAFE: &str = "version_control_unsafe";
const VCS_SKIP_STATS: &str = "version_control_skip_stats";
const VCS_FROM_DATE: &str = "version_control_from_date";
const VCS_TAG: &str = "version_control_tag";
const JENKINS_HOST: &str = "jenkins_host";
const JENKINS_USER: &str = "jenkins_user";
const JENKINS_TOKEN: &str = "jenkins_token";
const JENKINS_UNSAFE: &str = "jenkins_unsafe";

/// A deploy key file to write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFile {
    pub path: PathBuf,
    pub contents: String,
}

/// Data source sidecar of the single project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sidecar {
    pub project: String,
    pub sources: Vec<SourceDescriptor>,
}

/// Everything one submission writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritePlan {
    pub settings: ConfigDocument,
    pub credentials: ConfigDocument,
    pub env: String,
    pub key_files: Vec<KeyFile>,
    pub sidecar: Option<Sidecar>,
}

/// Inverse of the derivation rules: turns a submission into file contents
pub struct ConfigWriter<'a> {
    storage: &'a Storage<'a>,
    registry: &'a FormRegistry,
}

impl<'a> ConfigWriter<'a> {
    #[must_use]
    pub const fn new(storage: &'a Storage<'a>, registry: &'a FormRegistry) -> Self {
        Self { storage, registry }
    }

    /// Plan and commit the files of a submission
    ///
    /// # Errors
    ///
    /// Returns an error if planning fails or any file cannot be written.
    pub fn write(
        &self,
        data: &Submission,
        prior: &[FormInstance<'_>],
        settings: &ConfigDocument,
        credentials: &ConfigDocument,
    ) -> Result<Vec<PathBuf>> {
        let plan = self.plan(data, prior, settings, credentials)?;
        self.commit(&plan)
    }

    /// Compute the new contents of all files
    ///
    /// `prior` are the bound form instances; their original values name the
    /// credentials sections that the submission replaces.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A domain or project key cannot be used as a file name
    /// - A deploy key that follows a renamed domain cannot be read
    pub fn plan(
        &self,
        data: &Submission,
        prior: &[FormInstance<'_>],
        settings: &ConfigDocument,
        credentials: &ConfigDocument,
    ) -> Result<WritePlan> {
        let projects = projects(data);
        let jira_key = data.text(JIRA_KEY);

        let settings = self.plan_settings(data, &projects, settings.clone());

        let mut kept = credentials.clone();
        for original in originals(prior, SectionKind::VersionControl, VCS_DOMAIN)
            .chain(originals(prior, SectionKind::Jenkins, JENKINS_HOST))
        {
            if kept.remove_section(original).is_some() {
                debug!("Replacing credentials section [{}]", original);
            }
        }
        for section in kept.sections().into_iter().map(str::to_owned).collect::<Vec<_>>() {
            if self.registry.owner(&kept, &section).is_some() {
                debug!("Dropping credentials section [{}]", section);
                kept.remove_section(&section);
            }
        }

        let prior_credentials = credentials;
        let mut credentials = ConfigDocument::new();
        let mut sources = Vec::new();
        let mut key_files = Vec::new();
        let mut assignments = Vec::new();

        let vcs_originals: Vec<&str> =
            originals(prior, SectionKind::VersionControl, VCS_DOMAIN).collect();
        let domains: Vec<&str> = (0..data.repeated_len(VCS_DOMAIN))
            .map(|index| data.text_at(VCS_DOMAIN, index))
            .collect();
        for index in 0..data.repeated_len(VCS_DOMAIN) {
            let source = VcsSource::from_submission(data, index);
            validate_file_component("Version control domain", source.domain)?;

            let renamed_from = vcs_originals.get(index).copied().filter(|original| {
                !domains.contains(original) && !prior_credentials.has_section(source.domain)
            });
            let key_path = self.plan_key(&source, renamed_from, &mut key_files)?;
            source.collect_sources(&mut sources);

            let (section, assignment) = source.section(index, &key_path);
            credentials.insert_section(source.domain, section);
            assignments.extend(assignment);
        }

        for index in 0..data.repeated_len(JENKINS_HOST) {
            let host = data.text_at(JENKINS_HOST, index);
            if host.is_empty() {
                continue;
            }
            credentials.insert_section(host, jenkins_section(data, index));
        }

        for section in kept.sections() {
            if let Some(options) = kept.section(section) {
                credentials.insert_section(section, options.clone());
            }
        }

        let env = env_text(&projects, jira_key, &assignments);

        let sidecar = match projects.as_slice() {
            [project]
                if !sources.is_empty()
                    && project.value.is_empty()
                    && has_value(Some(jira_key)) =>
            {
                validate_file_component("Project key", &project.key)?;
                Some(Sidecar {
                    project: project.key.clone(),
                    sources,
                })
            }
            _ => None,
        };

        Ok(WritePlan {
            settings,
            credentials,
            env,
            key_files,
            sidecar,
        })
    }

    fn plan_settings(
        &self,
        data: &Submission,
        projects: &[Pair],
        mut settings: ConfigDocument,
    ) -> ConfigDocument {
        let options = self.storage.options();
        let jira_key = data.text(JIRA_KEY);

        settings.replace_section("bigboat");
        settings.set("bigboat", "host", data.text(BIGBOAT_URL));
        settings.set("bigboat", "key", data.text(BIGBOAT_KEY));

        settings.replace_section("projects");
        for project in projects {
            settings.set("projects", &project.key, &project.value);
        }

        settings.replace_section("ssh");
        settings.set("ssh", "username", &format!("agent-{jira_key}"));
        settings.set("ssh", "host", &options.ssh_host);
        settings.set("ssh", "cert", &options.ssh_cert);

        settings.replace_section("jenkins");
        for option in ["host", "username", "password", "verify"] {
            settings.set("jenkins", option, "");
        }

        settings.remove_key("definitions", "name");
        if data.flag(QUALITY_REPORT_ENABLE) {
            settings.set("definitions", "name", "quality-report-data");
        }

        settings.remove_section("quality-time");
        let quality_time_url = data.text(QUALITY_TIME_URL);
        if !quality_time_url.is_empty() {
            settings.set("quality-time", "name", "quality-time-data");
            settings.set("quality-time", "url", quality_time_url);
        }

        settings
    }

    /// Decide which key file a source uses, queueing new key material
    ///
    /// `renamed_from` is the domain the source replaces: it is no longer
    /// submitted and the new domain had no section before. Its key follows
    /// the rename.
    fn plan_key(
        &self,
        source: &VcsSource<'_>,
        renamed_from: Option<&str>,
        key_files: &mut Vec<KeyFile>,
    ) -> Result<PathBuf> {
        let system = self.storage.system();
        let default_key = self.storage.default_key_path();
        if source.auth != "deploy_key" || source.key.is_empty() {
            return Ok(default_key);
        }

        let domain_key = self.storage.domain_key_path(source.domain);
        if source.key != EXISTING_VALUE {
            key_files.push(KeyFile {
                path: domain_key.clone(),
                contents: key_material(source.key),
            });
            return Ok(domain_key);
        }

        if system.exists(&domain_key) {
            return Ok(domain_key);
        }

        if let Some(original) = renamed_from.filter(|o| !o.is_empty() && *o != source.domain) {
            let original_key = self.storage.domain_key_path(original);
            if system.is_file(&original_key) {
                let contents = system.read_to_string(&original_key).with_context(|| {
                    format!("Failed to read deploy key: {}", original_key.display())
                })?;
                info!("Deploy key of {} follows rename to {}", original, source.domain);
                key_files.push(KeyFile {
                    path: domain_key.clone(),
                    contents,
                });
                return Ok(domain_key);
            }
        }

        Ok(default_key)
    }

    /// Stage every file of the plan, then move them into place
    ///
    /// # Errors
    ///
    /// Returns a write error if a directory cannot be created, a file cannot
    /// be staged, or a staged file cannot be moved into place.
    pub fn commit(&self, plan: &WritePlan) -> Result<Vec<PathBuf>> {
        let system = self.storage.system();
        let options = self.storage.options();

        let mut dirs = vec![options.config_path.clone()];
        if !plan.key_files.is_empty() {
            dirs.push(options.key_path.clone());
        }
        if let Some(sidecar) = &plan.sidecar {
            dirs.push(self.storage.project_export_path(&sidecar.project));
        }
        for dir in &dirs {
            system.create_dir_all(dir).map_err(|e| {
                AgentConfigError::write(format!("Cannot create directory {}: {e}", dir.display()))
            })?;
        }

        let mut outputs: Vec<(PathBuf, Vec<u8>)> = plan
            .key_files
            .iter()
            .map(|key| (key.path.clone(), key.contents.clone().into_bytes()))
            .collect();
        if let Some(sidecar) = &plan.sidecar {
            let json = serde_json::to_string(&sidecar.sources)
                .context("Failed to serialize data sources")?;
            outputs.push((self.storage.sources_path(&sidecar.project), json.into_bytes()));
        }
        outputs.push((
            self.storage.document_path(StoreName::Credentials),
            plan.credentials.to_string().into_bytes(),
        ));
        outputs.push((
            self.storage.document_path(StoreName::Settings),
            plan.settings.to_string().into_bytes(),
        ));
        outputs.push((self.storage.env_path(), plan.env.clone().into_bytes()));

        let staged = outputs
            .iter()
            .map(|(path, contents)| stage(system, path, contents))
            .collect::<Result<Vec<_>>>()?;

        let mut written = Vec::with_capacity(staged.len());
        for file in staged {
            let target = file.target().to_path_buf();
            file.commit().map_err(|e| {
                AgentConfigError::write(format!(
                    "Cannot replace {} ({} of {} files already written): {e}",
                    target.display(),
                    written.len(),
                    outputs.len()
                ))
            })?;
            debug!("Wrote {}", target.display());
            written.push(target);
        }

        info!("Updated configuration");
        Ok(written)
    }
}

fn stage(
    system: &dyn System,
    path: &Path,
    contents: &[u8],
) -> Result<Box<dyn StagedFile>> {
    system.stage(path, contents).map_err(|e| {
        AgentConfigError::write(format!("Cannot write {}: {e}", path.display())).into()
    })
}

/// Original identity values of the prior instances of one repeated group
fn originals<'f>(
    prior: &'f [FormInstance<'_>],
    kind: SectionKind,
    field: &'static str,
) -> impl Iterator<Item = &'f str> {
    prior
        .iter()
        .filter(move |form| form.group.sections == Some(kind))
        .filter_map(move |form| form.field(field))
        .map(|field| field.original.as_text())
        .filter(|original| !original.is_empty())
}

/// Project rows to write; the first row defaults to the JIRA key
fn projects(data: &Submission) -> Vec<Pair> {
    let jira_key = data.text(JIRA_KEY);
    let mut rows = data
        .pairs(QUALITY_REPORT_NAME)
        .map(<[Pair]>::to_vec)
        .unwrap_or_default();
    if rows.is_empty() {
        rows.push(Pair::new(jira_key, ""));
    }
    if rows[0].key.is_empty() {
        jira_key.clone_into(&mut rows[0].key);
    }

    let first = rows.remove(0);
    std::iter::once(first)
        .chain(rows.into_iter().filter(|row| !row.key.is_empty()))
        .collect()
}

/// Submitted values of one version control instance
struct VcsSource<'d> {
    vcs_type: &'d str,
    domain: &'d str,
    auth: &'d str,
    user: &'d str,
    token: &'d str,
    key: &'d str,
    group: &'d str,
    checkouts: &'d [Pair],
    unsafe_hosts: bool,
    skip_stats: bool,
    from_date: &'d str,
    tag: &'d str,
}

impl<'d> VcsSource<'d> {
    fn from_submission(data: &'d Submission, index: usize) -> Self {
        Self {
            vcs_type: data.text_at(VCS_TYPE, index),
            domain: data.text_at(VCS_DOMAIN, index),
            auth: data.text_at(VCS_AUTH, index),
            user: data.text_at(VCS_USER, index),
            token: data.text_at(VCS_TOKEN, index),
            key: data.text_at(VCS_KEY, index),
            group: data.text_at(VCS_GROUP, index),
            checkouts: data.pairs_at(VCS_SOURCE, index),
            unsafe_hosts: data.flag_at(VCS_UNSAFE, index),
            skip_stats: data.flag_at(VCS_SKIP_STATS, index),
            from_date: data.text_at(VCS_FROM_DATE, index),
            tag: data.text_at(VCS_TAG, index),
        }
    }

    fn collect_sources(&self, sources: &mut Vec<SourceDescriptor>) {
        let checkouts: Vec<&Pair> = self
            .checkouts
            .iter()
            .filter(|checkout| !checkout.value.is_empty())
            .collect();
        if !checkouts.is_empty() {
            sources.extend(checkouts.into_iter().map(|checkout| {
                SourceDescriptor::dummy(self.vcs_type, self.domain, &checkout.key, &checkout.value)
            }));
        } else if !self.group.is_empty() {
            sources.extend(SourceDescriptor::from_group(
                self.vcs_type,
                self.domain,
                self.group,
            ));
        }
    }

    /// Credentials section of the source and its environment assignment
    fn section(&self, index: usize, key_path: &Path) -> (Section, Option<String>) {
        let (env, assignment) = match self.auth {
            "deploy_key" | "github_api" | "gitlab_api" => {
                let variable = format!("SOURCE_{index}_CREDENTIALS_ENV");
                let assignment = format!("{variable}={}", key_path.display());
                (variable, Some(assignment))
            }
            _ => (PLACEHOLDER.to_owned(), None),
        };
        let token_for = |applies: bool| option(self.token, applies);
        let tfs_group = if self.group.is_empty() { "true" } else { self.group };

        let mut section = Section::new();
        section.insert("type".to_owned(), self.vcs_type.to_owned());
        section.insert("env".to_owned(), env);
        section.insert("username".to_owned(), option(self.user, !self.user.is_empty()));
        section.insert("password".to_owned(), token_for(matches!(self.auth, "user_pass" | "deploy_key")));
        section.insert("github_api_url".to_owned(), PLACEHOLDER.to_owned());
        section.insert("github_token".to_owned(), token_for(self.auth == "github_api"));
        section.insert("github_bots".to_owned(), PLACEHOLDER.to_owned());
        section.insert("tfs".to_owned(), option(tfs_group, self.vcs_type == "tfs"));
        section.insert("gitlab_token".to_owned(), token_for(self.auth == "gitlab_api"));
        section.insert("group".to_owned(), option(self.group, self.vcs_type == "gitlab"));
        section.insert("unsafe_hosts".to_owned(), option("true", self.unsafe_hosts));
        section.insert("skip_stats".to_owned(), option("true", self.skip_stats));
        section.insert("from_date".to_owned(), option(self.from_date, !self.from_date.is_empty()));
        section.insert("tag".to_owned(), option(self.tag, !self.tag.is_empty()));
        (section, assignment)
    }
}

fn jenkins_section(data: &Submission, index: usize) -> Section {
    let mut section = Section::new();
    section.insert("type".to_owned(), "jenkins".to_owned());
    section.insert("username".to_owned(), data.text_at(JENKINS_USER, index).to_owned());
    section.insert(
        "password".to_owned(),
        option(data.text_at(JENKINS_TOKEN, index), true),
    );
    section.insert(
        "unsafe_hosts".to_owned(),
        option("true", data.flag_at(JENKINS_UNSAFE, index)),
    );
    section
}

/// Value of a credentials option, or the placeholder when it does not apply
///
/// The stored-secret token never reaches a credentials file.
fn option(value: &str, applies: bool) -> String {
    if !applies {
        return PLACEHOLDER.to_owned();
    }
    if value == EXISTING_VALUE {
        warn!("Refusing to store the {} token as a credential", EXISTING_VALUE);
        return PLACEHOLDER.to_owned();
    }
    value.to_owned()
}

/// Key material as written to disk, ending in a newline
fn key_material(key: &str) -> String {
    let key = key.replace("\r\n", "\n");
    if key.ends_with('\n') { key } else { format!("{key}\n") }
}

fn env_text(projects: &[Pair], jira_key: &str, assignments: &[String]) -> String {
    let keys: Vec<&str> = projects.iter().map(|project| project.key.as_str()).collect();
    let mut lines = vec![
        format!("JIRA_KEY=\"{}\"", keys.join(" ")),
        format!("SSH_USERNAME=agent-{jira_key}"),
    ];
    if projects.first().is_some_and(|project| project.value.is_empty()) {
        lines.push("skip_dropin=0".to_owned());
    }
    lines.extend(assignments.iter().cloned());

    let mut text = lines.join("\n");
    text.push('\n');
    text
}
