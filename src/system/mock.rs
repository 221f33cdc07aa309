//! Mock system implementation for testing

use super::{StagedFile, System};
use std::collections::{HashMap, HashSet};
use std::env::VarError;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory implementation of System trait for testing
///
/// `MockSystem` provides an in-memory filesystem and environment,
/// perfect for fast, isolated unit tests without side effects.
///
/// # Example
/// ```
/// use agent_config::system::{mock::MockSystem, System};
/// use std::path::Path;
///
/// let system = MockSystem::new()
///     .with_env("SSH_HOST", "ssh.example")
///     .with_file("/config/settings.cfg", b"[projects]\nABC=\n")
///     .with_dir("/export");
///
/// assert_eq!(system.env_var("SSH_HOST").unwrap(), "ssh.example");
/// assert!(system.exists(Path::new("/config/settings.cfg")));
/// ```
#[derive(Clone)]
pub struct MockSystem {
    state: Arc<RwLock<MockSystemState>>,
}

struct MockSystemState {
    env_vars: HashMap<String, String>,
    files: HashMap<PathBuf, Vec<u8>>,
    dirs: HashSet<PathBuf>,
    read_only: HashSet<PathBuf>,
}

impl MockSystem {
    /// Create a new `MockSystem` with default state
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MockSystemState {
                env_vars: HashMap::new(),
                files: HashMap::new(),
                dirs: HashSet::from([PathBuf::from("/")]),
                read_only: HashSet::new(),
            })),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, MockSystemState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, MockSystemState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set an environment variable (builder pattern)
    #[must_use]
    #[inline]
    pub fn with_env(self, key: &str, value: &str) -> Self {
        self.write_state()
            .env_vars
            .insert(key.to_owned(), value.to_owned());
        self
    }

    /// Add a file with contents (builder pattern)
    ///
    /// Parent directories are created implicitly.
    #[must_use]
    #[inline]
    pub fn with_file<P: AsRef<Path>>(self, path: P, contents: &[u8]) -> Self {
        let path_buf = path.as_ref().to_path_buf();
        {
            let mut state = self.write_state();
            if let Some(parent) = path_buf.parent() {
                Self::ensure_parent_dirs(&mut state.dirs, parent);
            }
            state.files.insert(path_buf, contents.to_vec());
        }
        self
    }

    /// Add a directory (builder pattern)
    #[must_use]
    #[inline]
    pub fn with_dir<P: AsRef<Path>>(self, path: P) -> Self {
        {
            let mut state = self.write_state();
            Self::ensure_parent_dirs(&mut state.dirs, path.as_ref());
        }
        self
    }

    /// Refuse writes into a directory (builder pattern)
    ///
    /// Used to simulate permission failures in write paths.
    #[must_use]
    #[inline]
    pub fn with_read_only_dir<P: AsRef<Path>>(self, path: P) -> Self {
        {
            let mut state = self.write_state();
            Self::ensure_parent_dirs(&mut state.dirs, path.as_ref());
            state.read_only.insert(path.as_ref().to_path_buf());
        }
        self
    }

    /// Paths of all files currently stored, sorted
    #[must_use]
    pub fn file_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.read_state().files.keys().cloned().collect();
        paths.sort();
        paths
    }

    #[inline]
    fn ensure_parent_dirs(dirs: &mut HashSet<PathBuf>, path: &Path) {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            dirs.insert(ancestor.to_path_buf());
        }
    }

    /// Store a file the way a committed staged file lands
    fn store_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut state = self.write_state();
        Self::check_writable(&state, path)?;
        state.files.insert(path.to_path_buf(), contents.to_vec());
        drop(state);
        Ok(())
    }

    fn check_writable(state: &MockSystemState, path: &Path) -> io::Result<()> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        if !state.dirs.contains(parent) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Parent directory does not exist: {}", parent.display()),
            ));
        }
        if state.read_only.iter().any(|dir| parent.starts_with(dir)) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("Permission denied: {}", path.display()),
            ));
        }
        Ok(())
    }
}

impl Default for MockSystem {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl System for MockSystem {
    #[inline]
    fn env_var(&self, key: &str) -> Result<String, VarError> {
        self.read_state()
            .env_vars
            .get(key)
            .cloned()
            .ok_or(VarError::NotPresent)
    }

    #[inline]
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read_state().files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("File not found: {}", path.display()),
            )
        })?;
        String::from_utf8(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("Invalid UTF-8: {e}")))
    }

    #[inline]
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.write_state();
        if state
            .read_only
            .iter()
            .any(|dir| path.starts_with(dir) && path != dir.as_path())
        {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("Permission denied: {}", path.display()),
            ));
        }
        Self::ensure_parent_dirs(&mut state.dirs, path);
        drop(state);
        Ok(())
    }

    #[inline]
    fn exists(&self, path: &Path) -> bool {
        let state = self.read_state();
        state.files.contains_key(path) || state.dirs.contains(path)
    }

    #[inline]
    fn is_file(&self, path: &Path) -> bool {
        self.read_state().files.contains_key(path)
    }

    #[inline]
    fn stage(&self, path: &Path, contents: &[u8]) -> io::Result<Box<dyn StagedFile>> {
        Self::check_writable(&self.read_state(), path)?;
        Ok(Box::new(MockStagedFile {
            target: path.to_path_buf(),
            contents: contents.to_vec(),
            system: self.clone(),
        }))
    }
}

/// Staged contents kept in memory until committed to the mock filesystem
struct MockStagedFile {
    target: PathBuf,
    contents: Vec<u8>,
    system: MockSystem,
}

impl StagedFile for MockStagedFile {
    fn target(&self) -> &Path {
        &self.target
    }

    fn commit(self: Box<Self>) -> io::Result<()> {
        self.system.store_file(&self.target, &self.contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_requires_parent_dir() {
        let system = MockSystem::new();
        let result = system.stage(Path::new("/missing/settings.cfg"), b"");
        assert_eq!(result.err().unwrap().kind(), io::ErrorKind::NotFound);

        system.create_dir_all(Path::new("/missing")).unwrap();
        system.stage(Path::new("/missing/settings.cfg"), b"").unwrap().commit().unwrap();
        assert!(system.is_file(Path::new("/missing/settings.cfg")));
    }

    #[test]
    fn test_read_only_dir_rejects_stage() {
        let system = MockSystem::new().with_read_only_dir("/keys");
        let result = system.stage(Path::new("/keys/id_rsa"), b"key");
        assert!(result.is_err());
        assert!(system.create_dir_all(Path::new("/keys/sub")).is_err());
    }

    #[test]
    fn test_stage_commits_on_request_only() {
        let system = MockSystem::new().with_dir("/config");
        let staged = system.stage(Path::new("/config/env"), b"A=1\n").unwrap();
        assert!(!system.exists(Path::new("/config/env")));
        staged.commit().unwrap();
        assert_eq!(
            system.read_to_string(Path::new("/config/env")).unwrap(),
            "A=1\n"
        );
    }
}
