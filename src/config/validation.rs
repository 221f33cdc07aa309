//! Options validation logic

use crate::config::Options;
use crate::error::AgentConfigError;
use anyhow::Result;
use std::path::Path;

/// Validate application options
///
/// # Errors
///
/// Returns an error if:
/// - One of the directories is empty
/// - The certificate path is empty
#[inline]
pub fn validate_options(options: &Options) -> Result<()> {
    validate_directory("config_path", &options.config_path)?;
    validate_directory("export_path", &options.export_path)?;
    validate_directory("key_path", &options.key_path)?;

    if options.ssh_cert.trim().is_empty() {
        return Err(AgentConfigError::configuration("ssh_cert cannot be empty").into());
    }

    if let Some(form) = options.form.as_ref()
        && form.as_os_str().is_empty()
    {
        return Err(AgentConfigError::configuration("form path cannot be empty").into());
    }

    Ok(())
}

fn validate_directory(name: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(AgentConfigError::configuration(format!("{name} cannot be empty")).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_options_are_valid() {
        assert!(validate_options(&Options::default()).is_ok());
    }

    #[test]
    fn test_empty_directory_rejected() {
        let options = Options {
            export_path: PathBuf::new(),
            ..Options::default()
        };
        let err = validate_options(&options).unwrap_err();
        assert!(err.to_string().contains("export_path cannot be empty"));
    }

    #[test]
    fn test_empty_cert_rejected() {
        let options = Options {
            ssh_cert: "  ".to_owned(),
            ..Options::default()
        };
        assert!(validate_options(&options).is_err());
    }
}
