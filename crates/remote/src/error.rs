//! Error types for remote operations.
//!
//! Errors are categorized so callers can tell an unreachable node from a
//! command that ran and failed, and report each with the right advice.

use crate::types::ExecOutput;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Exit status `timeout(1)` reports when it had to kill the session.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit status ssh reports for its own failures (as opposed to the remote
/// command's).
pub const SSH_FAILURE_EXIT_CODE: i32 = 255;

/// Categories of remote errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The node could not be reached
    Connection,
    /// The session exceeded its time budget
    Timeout,
    /// Authentication or file permission problem
    Permission,
    /// A local file (script, source path) is missing
    NotFound,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection | Self::Timeout)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Connection => "Node unreachable",
            Self::Timeout => "Remote session timed out",
            Self::Permission => "Permission denied",
            Self::NotFound => "Local file not found",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Connection => "Check that the node is online and reachable over ssh",
            Self::Timeout => "Raise the timeout for this node or check its load",
            Self::Permission => "Check ssh keys and the remote user in ssh_opts",
            Self::NotFound => "Check the path relative to the rules directory",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while talking to a node.
#[derive(Debug, Error)]
pub enum Error {
    /// A local program (`timeout`, `ssh`, `rsync`, `bash`) could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// A local script or source file does not exist
    #[error("local file not found: {0}")]
    LocalNotFound(PathBuf),

    /// The node refused or dropped the connection
    #[error("cannot reach {ip}: {message}")]
    Connection {
        /// Address of the node
        ip: String,
        /// Diagnostic from ssh
        message: String,
    },

    /// The session was killed by its timeout
    #[error("{ip}: timed out after {seconds}s")]
    Timeout {
        /// Address of the node
        ip: String,
        /// Timeout that expired
        seconds: u64,
    },

    /// Permission denied, locally or remotely
    #[error("permission denied: {message}")]
    Permission {
        /// Diagnostic output
        message: String,
    },

    /// A transfer or command exited with a failure status
    #[error("{message} (exit code {code})")]
    CommandFailed {
        /// What was being done
        message: String,
        /// Exit status
        code: i32,
        /// Standard error output
        stderr: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Connection { .. } => ErrorCategory::Connection,
            Error::Timeout { .. } => ErrorCategory::Timeout,
            Error::Permission { .. } => ErrorCategory::Permission,
            Error::LocalNotFound(_) => ErrorCategory::NotFound,
            Error::Io(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                ErrorCategory::Permission
            }
            _ => ErrorCategory::Other,
        }
    }

    /// Create an error from a failed session.
    ///
    /// The exit status and stderr are inspected to pick the category.
    pub fn from_output(ip: &str, what: &str, output: &ExecOutput, timeout: u64) -> Self {
        if output.code == TIMEOUT_EXIT_CODE {
            return Error::Timeout {
                ip: ip.to_string(),
                seconds: timeout,
            };
        }

        let stderr_lower = output.stderr.to_lowercase();

        if stderr_lower.contains("permission denied") {
            return Error::Permission {
                message: output.stderr.trim().to_string(),
            };
        }

        if output.code == SSH_FAILURE_EXIT_CODE
            || stderr_lower.contains("connection refused")
            || stderr_lower.contains("connection timed out")
            || stderr_lower.contains("no route to host")
            || stderr_lower.contains("could not resolve hostname")
            || stderr_lower.contains("connection closed")
        {
            return Error::Connection {
                ip: ip.to_string(),
                message: output.stderr.trim().to_string(),
            };
        }

        Error::CommandFailed {
            message: format!("{what} on {ip} failed"),
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        }
    }
}

/// Result type for remote operations.
pub type Result<T> = std::result::Result<T, Error>;
