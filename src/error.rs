//! Error types for scriptrun
//!
//! All modules use `ScriptrunResult<T>` as their return type.

use crate::process::{ProcessResult, StreamKind};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for scriptrun operations
pub type ScriptrunResult<T> = Result<T, ScriptrunError>;

/// All errors that can occur in scriptrun
#[derive(Error, Debug)]
pub enum ScriptrunError {
    // Process errors
    #[error("Failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed reading {stream} of child process: {source}")]
    Stream {
        stream: StreamKind,
        #[source]
        source: std::io::Error,
    },

    #[error("Command timed out after {}s: {command}", .timeout.as_secs_f64())]
    TimedOut {
        command: String,
        timeout: Duration,
        partial: Box<ProcessResult>,
    },

    #[error("Command cancelled: {command}")]
    Cancelled {
        command: String,
        partial: Box<ProcessResult>,
    },

    // Script source errors
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("No interpreter configured for .{0} scripts")]
    NoInterpreter(String),

    // Cache errors
    #[error("Failed to write cache entry {path}: {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create cache directory {path}: {source}")]
    CacheDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    User(String),
}

impl ScriptrunError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a spawn error
    pub fn spawn(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            command: command.into(),
            source,
        }
    }

    /// Create a fetch error
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Partial output captured before a deadline or cancellation killed the child
    pub fn partial_result(&self) -> Option<&ProcessResult> {
        match self {
            Self::TimedOut { partial, .. } | Self::Cancelled { partial, .. } => Some(partial.as_ref()),
            _ => None,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                Some("Check that the executable is installed and on PATH")
            }
            Self::Spawn { source, .. }
                if source.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                Some("Check the executable's permissions")
            }
            Self::NoInterpreter(_) => {
                Some("Add an [interpreters] entry for the extension to config.toml")
            }
            Self::TimedOut { .. } => Some("Raise the timeout with --timeout"),
            _ => None,
        }
    }
}
