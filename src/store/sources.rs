//! Data source descriptors kept in the `data_sources.json` sidecar
//!
//! The `name` of a descriptor carries both a label and the owning domain:
//! `"dummy <label> <domain>"` for sources entered in the form (with
//! `repository on` standing in for an empty label) and
//! `"<type> repository on <domain>"` for sources synthesized from a group.

use serde::{Deserialize, Serialize};

const DUMMY_PREFIX: &str = "dummy";
const UNLABELED: &str = "repository on";

/// One code repository known to the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    #[serde(rename = "type")]
    pub source_type: String,
    pub url: String,
    pub name: String,
}

impl SourceDescriptor {
    /// Descriptor for a repository entered explicitly in the form
    #[must_use]
    pub fn dummy(source_type: &str, domain: &str, label: &str, url: &str) -> Self {
        let label = if label.is_empty() { UNLABELED } else { label };
        Self {
            source_type: source_type.to_owned(),
            url: url.to_owned(),
            name: format!("{DUMMY_PREFIX} {label} {domain}"),
        }
    }

    /// Descriptor synthesized from a group path on GitLab or TFS
    ///
    /// Other version control types have no URL convention for groups.
    #[must_use]
    pub fn from_group(source_type: &str, domain: &str, group: &str) -> Option<Self> {
        let url = match source_type {
            "gitlab" => format!("http://{domain}/{group}/{group}.git"),
            "tfs" => format!("http://{domain}/{group}/_git/Dummy"),
            _ => return None,
        };
        Some(Self {
            source_type: source_type.to_owned(),
            url,
            name: format!("{source_type} {UNLABELED} {domain}"),
        })
    }

    /// Label of a dummy source on `domain`, or `None` if the name does not follow
    /// the dummy convention for that domain
    #[must_use]
    pub fn dummy_label(&self, domain: &str) -> Option<&str> {
        if domain.is_empty() {
            return None;
        }
        let label = self
            .name
            .strip_prefix(DUMMY_PREFIX)?
            .strip_prefix(' ')?
            .strip_suffix(domain)?
            .strip_suffix(' ')?;
        Some(if label == UNLABELED { "" } else { label })
    }
}
