//! Error types for the backup engine.
//!
//! The primary error type is `JobError`, which represents job-fatal conditions
//! that abort a run and select the process exit status. Per-node failures (a
//! single file's transfer, a single directory's listing) are logged by the
//! walker and never become a `JobError` unless they are unclassified.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Job-fatal errors. Each variant maps to a fixed exit code via [`JobError::code`].
#[derive(Debug, Error)]
pub enum JobError {
    /// Unclassified failure while listing or recursing a remote directory
    #[error("failed while processing '{}': {message}", .path.display())]
    Unclassified { path: PathBuf, message: String },

    /// Declared entry has no `type` key
    #[error("no type-key in entry #{index}")]
    MissingType { index: usize },

    /// Declared entry has no `path` key
    #[error("no path-key in entry #{index}")]
    MissingPath { index: usize },

    /// The document declares no entries at all
    #[error("no entries found in policy document")]
    NoEntries,

    /// The transport refused the supplied credentials
    #[error("could not authenticate as '{user}' on '{host}'")]
    AuthenticationFailed { host: String, user: String },

    /// `processonly_types` names neither `dir` nor `file`
    #[error("processonly_types is set to '{value}' but has to name dir or file")]
    InvalidProcessOnlyTypes { value: String },

    /// `exclude_folders` is present but is not a non-empty list of patterns
    #[error("options['exclude_folders'] below '{}' has to be a list of shell-file-patterns", .root.display())]
    InvalidExcludeFolders { root: PathBuf },

    /// Transport-level protocol failure
    #[error("transport error: {message}")]
    Transport { message: String },
}

impl JobError {
    /// Process exit code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::Unclassified { .. } => 1,
            Self::MissingType { .. } => 2,
            Self::MissingPath { .. } => 3,
            Self::NoEntries => 4,
            Self::AuthenticationFailed { .. } => 5,
            Self::InvalidProcessOnlyTypes { .. } => 6,
            Self::InvalidExcludeFolders { .. } => 10,
            Self::Transport { .. } => 113,
        }
    }
}

/// Errors reported by a remote-file-access client.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote path not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("permission denied on remote path: {}", .path.display())]
    PermissionDenied { path: PathBuf },

    #[error("authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH/SFTP protocol failure (handshake, channel, unexpected status)
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Local side of a transfer or a socket failed
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RemoteError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors raised while loading the policy document, before any job exists.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read policy document '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("policy document is not valid: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("logger in json has to contain a type")]
    LoggerWithoutType,

    #[error("logger level '{0}' is not supported (use 'all' or 'errors')")]
    LoggerLevel(String),

    #[error("logger-type '{0}' is not recognized")]
    LoggerType(String),

    #[error("logger with type file has to contain a folder-option")]
    LoggerWithoutFolder,

    #[error("failed to open log file in '{}': {message}", .folder.display())]
    LogFile { folder: PathBuf, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_error_codes() {
        assert_eq!(JobError::MissingType { index: 0 }.code(), 2);
        assert_eq!(JobError::MissingPath { index: 0 }.code(), 3);
        assert_eq!(JobError::NoEntries.code(), 4);
        assert_eq!(
            JobError::InvalidProcessOnlyTypes { value: "x".into() }.code(),
            6
        );
        assert_eq!(
            JobError::InvalidExcludeFolders { root: PathBuf::from("/data") }.code(),
            10
        );
        assert_eq!(JobError::Transport { message: "m".into() }.code(), 113);
    }

    #[test]
    fn test_remote_error_classification() {
        let denied = RemoteError::PermissionDenied { path: PathBuf::from("/root") };
        assert!(denied.is_permission_denied());
        assert!(!denied.is_not_found());
        let missing = RemoteError::NotFound { path: PathBuf::from("/nope") };
        assert!(missing.is_not_found());
    }
}
