//! Access to the environment and the filesystem
//!
//! Everything that reads options, configuration documents or key files, and
//! everything that writes them, goes through [`System`].

use std::env::VarError;
use std::io;
use std::path::Path;

pub mod mock;
pub mod real;

pub use mock::MockSystem;
pub use real::RealSystem;

/// File contents written to a side location, waiting to replace their target
///
/// A staged file only becomes visible at its target path once committed.
/// Dropping the handle without committing discards the staged contents.
///
/// For `RealSystem`, this wraps `tempfile::NamedTempFile` created next to the target.
/// For `MockSystem`, this keeps the contents in memory until commit.
pub trait StagedFile {
    /// Path the contents will be moved to
    fn target(&self) -> &Path;

    /// Move the staged contents into place
    fn commit(self: Box<Self>) -> io::Result<()>;
}

/// Environment and filesystem operations used by the editor
///
/// `RealSystem` delegates to `std::env` and `std::fs`; `MockSystem` keeps
/// files, directories and variables in memory.
pub trait System: Send + Sync {
    // ==================== Environment Operations ====================

    /// Get an environment variable
    fn env_var(&self, key: &str) -> Result<String, VarError>;

    // ==================== Filesystem Operations ====================

    /// Read entire file contents as a string
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Recursively create a directory and all parent directories
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if a path points to a file
    fn is_file(&self, path: &Path) -> bool;

    /// Write contents next to `path` without touching `path` itself
    ///
    /// The parent directory of `path` must already exist.
    fn stage(&self, path: &Path, contents: &[u8]) -> io::Result<Box<dyn StagedFile>>;
}
