//! Custom error types with exit codes

use thiserror::Error;

/// Main error type for agent-config operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AgentConfigError {
    /// Configuration Error - invalid options or form schema
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Validation Error - a submission did not pass field validation
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Write Error - the configuration files could not be (fully) written
    #[error("Write error: {message}")]
    Write { message: String },

    /// Filesystem Error - file operation failed
    #[error("Filesystem error: {message}")]
    Filesystem { message: String },
}

impl AgentConfigError {
    /// Get the appropriate exit code for this error type
    #[must_use]
    #[inline]
    pub const fn exit_code(&self) -> i32 {
        match *self {
            Self::Configuration { .. } => 1,
            Self::Validation { .. } => 2,
            Self::Write { .. } => 3,
            Self::Filesystem { .. } => 4,
        }
    }

    /// Create a configuration error
    #[inline]
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a validation error
    #[inline]
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a write error
    #[inline]
    pub fn write<S: Into<String>>(message: S) -> Self {
        Self::Write {
            message: message.into(),
        }
    }

    /// Create a filesystem error
    #[inline]
    pub fn filesystem<S: Into<String>>(message: S) -> Self {
        Self::Filesystem {
            message: message.into(),
        }
    }
}
