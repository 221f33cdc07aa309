//! Path validation utilities

use crate::error::AgentConfigError;
use anyhow::Result;

/// Validate that a submitted value can be used as a single file name
///
/// Domains name deploy key files and project keys name export
/// directories, so neither may contain separators or traversal.
///
/// # Errors
///
/// Returns a validation error if the name is empty, contains a path
/// separator or NUL byte, or is `.` or `..`.
pub fn validate_file_component(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(AgentConfigError::validation(format!("{kind} cannot be empty")).into());
    }

    if name.contains(['/', '\\', '\0']) || name == "." || name == ".." {
        return Err(AgentConfigError::validation(format!(
            "{kind} '{name}' cannot be used as a file name"
        ))
        .into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domains_are_valid_file_names() {
        validate_file_component("Domain", "gitlab.example").unwrap();
        validate_file_component("Domain", "tfs.example:8080").unwrap();
        validate_file_component("Project key", "ABC").unwrap();
    }

    #[test]
    fn test_unsafe_names_rejected() {
        for name in ["", ".", "..", "../etc", "a/b", "a\\b", "x\0y"] {
            assert!(
                validate_file_component("Domain", name).is_err(),
                "{name:?} should be rejected"
            );
        }
    }
}
