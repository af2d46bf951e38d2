//! Config file location for fleetdiag
//!
//! # Environment Variables
//!
//! - `FLEETDIAG_CONFIG` - Path of the config file to load
//!
//! # Path Resolution Priority
//!
//! For config_file():
//! 1. `FLEETDIAG_CONFIG` environment variable
//! 2. `XDG_CONFIG_HOME/fleetdiag/config.toml` (if set)
//! 3. `~/.config/fleetdiag/config.toml`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for the config file override
pub const ENV_CONFIG: &str = "FLEETDIAG_CONFIG";

/// File name looked up in the config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the default config file path
///
/// The file does not have to exist; callers fall back to built-in defaults.
pub fn config_file() -> Result<PathBuf> {
    if let Ok(file) = std::env::var(ENV_CONFIG) {
        let path = expand(&file);
        log::debug!("Using config file from {}: {}", ENV_CONFIG, path.display());
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config)
            .join("fleetdiag")
            .join(CONFIG_FILE_NAME);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home
        .join(".config")
        .join("fleetdiag")
        .join(CONFIG_FILE_NAME);
    log::debug!("Using default config file: {}", path.display());
    Ok(path)
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left untouched.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Helper to run a test with temporary env var
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: no other test reads this variable
        unsafe { env::set_var(key, value) };
        let result = f();
        match original {
            // SAFETY: as above
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    #[test]
    fn test_config_file_env_override() {
        with_env_var(ENV_CONFIG, "/custom/fleetdiag.yaml", || {
            let result = config_file().unwrap();
            assert_eq!(result, PathBuf::from("/custom/fleetdiag.yaml"));
        });
    }

    #[test]
    fn test_expand_with_tilde() {
        let result = expand("~/rq");
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join("rq"));
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/tmp/fleetdiag"), PathBuf::from("/tmp/fleetdiag"));
    }

    #[test]
    fn test_expand_with_env_var() {
        with_env_var("FLEETDIAG_TEST_OUTDIR", "collect", || {
            let result = expand("/tmp/$FLEETDIAG_TEST_OUTDIR/info");
            assert_eq!(result, PathBuf::from("/tmp/collect/info"));
        });
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$NONEXISTENT_VAR_12345/file");
        assert_eq!(result, PathBuf::from("/path/$NONEXISTENT_VAR_12345/file"));
    }
}
