//! Core types for remote sessions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Session settings shared by every call to one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Extra ssh arguments (`-oConnectTimeout=2`, `-lroot`, ...)
    pub ssh_opts: Vec<String>,
    /// `NAME=value` pairs exported before the command
    pub env_vars: Vec<String>,
    /// Seconds before the whole session is killed
    pub timeout: u64,
    /// Wrapper placed in front of the command (`nice -n 19 ionice -c 3`)
    pub prefix: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            ssh_opts: Vec::new(),
            env_vars: Vec::new(),
            timeout: 15,
            prefix: None,
        }
    }
}

impl SessionOptions {
    /// `ssh` plus its options, as one string for `rsync -e`.
    pub fn rsync_shell(&self) -> String {
        let mut shell = String::from("ssh");
        for opt in &self.ssh_opts {
            shell.push(' ');
            shell.push_str(opt);
        }
        shell.push_str(" -oCompression=no");
        shell
    }
}

/// What to run on the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A shell command line
    Command(String),
    /// A local script, streamed to `bash -s`
    Script(PathBuf),
}

/// A single remote execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    /// What to run
    pub payload: Payload,
    /// Session settings
    pub options: SessionOptions,
}

impl ExecRequest {
    /// Request running a command line.
    pub fn command(cmd: impl Into<String>, options: SessionOptions) -> Self {
        Self {
            payload: Payload::Command(cmd.into()),
            options,
        }
    }

    /// Request running a local script.
    pub fn script(path: impl Into<PathBuf>, options: SessionOptions) -> Self {
        Self {
            payload: Payload::Script(path.into()),
            options,
        }
    }

    /// The text executed by the remote shell.
    ///
    /// Environment assignments come first, then the prefix, then the command
    /// (or `bash -s` for scripts).
    pub fn remote_command(&self) -> String {
        let body = match &self.payload {
            Payload::Command(cmd) => cmd.as_str(),
            Payload::Script(_) => "bash -s",
        };

        self.options
            .env_vars
            .iter()
            .map(String::as_str)
            .chain(self.options.prefix.as_deref())
            .chain(std::iter::once(body))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Exit status, `-1` when killed by a signal
    pub code: i32,
}

impl ExecOutput {
    /// Whether the session exited with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Whether the exit status is 0 or one of `ok_codes`.
    #[must_use]
    pub fn is_ok_with(&self, ok_codes: &[i32]) -> bool {
        self.success() || ok_codes.contains(&self.code)
    }
}
