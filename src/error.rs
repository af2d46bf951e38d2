//! Process-level failures and their exit codes

use std::path::PathBuf;
use thiserror::Error;

/// Conditions that abort the whole invocation.
///
/// The exit codes are relied upon by wrapper scripts and must not change.
#[derive(Debug, Error)]
pub enum FatalError {
    /// The rules directory does not exist
    #[error("rules directory {} does not exist", .0.display())]
    RqdirMissing(PathBuf),

    /// A config file or command-line value could not be used
    #[error("invalid configuration ({origin}): {message}")]
    InvalidConfig { origin: String, message: String },

    /// Neither the management API nor the CLI returned a node list
    #[error("no node inventory available from the management API or the CLI")]
    NoInventory,

    /// `master_ip` is not configured
    #[error("master_ip is not set")]
    MasterIpMissing,
}

impl FatalError {
    pub fn invalid_config(origin: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidConfig {
            origin: origin.into(),
            message: message.to_string(),
        }
    }

    /// Process exit status for this condition.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::RqdirMissing(_) => 1,
            Self::InvalidConfig { .. } => 2,
            Self::NoInventory => 4,
            Self::MasterIpMissing => 7,
        }
    }
}

/// Errors from a fleet-wide run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Another run holds the process-wide lock
    #[error("a fleet run is already in progress")]
    AlreadyRunning,
}

/// Exit status for an error returned from `main`.
///
/// The first [`FatalError`] in the chain decides; anything else exits 1.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|e| e.downcast_ref::<FatalError>())
        .map_or(1, FatalError::exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_codes() {
        assert_eq!(FatalError::RqdirMissing("/rq".into()).exit_code(), 1);
        assert_eq!(FatalError::invalid_config("cli", "bad").exit_code(), 2);
        assert_eq!(FatalError::NoInventory.exit_code(), 4);
        assert_eq!(FatalError::MasterIpMissing.exit_code(), 7);
    }

    #[test]
    fn test_exit_code_found_through_context() {
        let err = Err::<(), _>(FatalError::NoInventory)
            .context("building fleet registry")
            .unwrap_err();
        assert_eq!(exit_code(&err), 4);

        let plain = anyhow::anyhow!("something else");
        assert_eq!(exit_code(&plain), 1);
    }
}
