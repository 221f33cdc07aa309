//! Real system implementation using `std::env` and `std::fs`

use super::{StagedFile, System};
use std::env::VarError;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Production implementation of System trait
///
/// This implementation directly delegates to the standard library's
/// environment and filesystem functions.
#[derive(Debug, Clone, Copy)]
pub struct RealSystem;

impl RealSystem {
    /// Create a new `RealSystem` instance
    #[must_use]
    pub const fn new() -> Self {
        return Self;
    }
}

impl Default for RealSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for RealSystem {
    fn env_var(&self, key: &str) -> Result<String, VarError> {
        std::env::var(key)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn stage(&self, path: &Path, contents: &[u8]) -> io::Result<Box<dyn StagedFile>> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(parent)?;
        file.write_all(contents)?;
        file.flush()?;
        Ok(Box::new(RealStagedFile {
            file,
            target: path.to_path_buf(),
        }))
    }
}

/// Temporary file in the target's directory, persisted over the target on commit
struct RealStagedFile {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedFile for RealStagedFile {
    fn target(&self) -> &Path {
        &self.target
    }

    fn commit(self: Box<Self>) -> io::Result<()> {
        let Self { file, target } = *self;
        file.persist(&target).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_staged_file_is_invisible_until_commit() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("settings.cfg");
        let system = RealSystem::new();

        let staged = system.stage(&target, b"[bigboat]\n").unwrap();
        assert!(!target.exists());
        assert_eq!(staged.target(), target.as_path());

        staged.commit().unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "[bigboat]\n");
    }

    #[test]
    fn test_dropped_staged_file_leaves_target_untouched() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("env");
        fs::write(&target, "OLD=1\n").unwrap();
        let system = RealSystem::new();

        drop(system.stage(&target, b"NEW=1\n").unwrap());

        assert_eq!(fs::read_to_string(&target).unwrap(), "OLD=1\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
