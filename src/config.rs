//! Configuration: typed settings plus the rule tree
//!
//! A config document is a flat mapping. Keys listed in [`SETTING_KEYS`] are
//! deserialized into [`Settings`]; `once_by_*` sections go to the once map;
//! everything else is the rule tree resolved onto each node.

use crate::error::FatalError;
use crate::filter::FilterSpec;
use crate::paths;
use anyhow::{Context, Result};
use remote::SessionOptions;
use ruletree::{RuleTree, import_rq};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Built-in defaults, overlaid by the user config file
const DEFAULT_CONFIG: &str = include_str!("default_config.toml");

/// Top-level keys that are settings rather than rules
pub const SETTING_KEYS: &[&str] = &[
    "master_ip",
    "master_user",
    "master_pass",
    "api_client",
    "api_url",
    "api_token",
    "skip_proxy",
    "ssh_opts",
    "env_vars",
    "timeout",
    "prefix",
    "rqdir",
    "rqfile",
    "outdir",
    "archive_dir",
    "outputs_timestamp",
    "dir_timestamp",
    "clean",
    "shell_mode",
    "maxthreads",
    "ok_codes",
    "node_list_cmd",
    "master_release_cmd",
    "node_release_cmd",
    "hard_filter",
    "soft_filter",
];

// ============================================================================
// Settings
// ============================================================================

/// Scalar settings of one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Address of the management controller (node 0)
    #[serde(default)]
    pub master_ip: Option<String>,
    #[serde(default)]
    pub master_user: Option<String>,
    #[serde(default)]
    pub master_pass: Option<String>,

    /// Use the management API before falling back to the CLI
    pub api_client: bool,
    /// API root; derived from `master_ip` when unset
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    /// Ignore proxy environment variables for API calls
    pub skip_proxy: bool,

    pub ssh_opts: Vec<String>,
    pub env_vars: Vec<String>,
    /// Per-session timeout in seconds
    pub timeout: u64,
    #[serde(default)]
    pub prefix: Option<String>,

    /// Directory holding `scripts/` and `filelists/`
    pub rqdir: PathBuf,
    /// Attribute-first rule file imported at startup
    #[serde(default)]
    pub rqfile: Option<PathBuf>,
    pub outdir: PathBuf,
    pub archive_dir: PathBuf,
    /// Suffix every output file with the run timestamp
    pub outputs_timestamp: bool,
    /// Suffix `outdir` with the run timestamp
    pub dir_timestamp: bool,
    /// Remove `outdir` before collecting
    pub clean: bool,

    /// Only talk to the fleet; no rules, no release probing
    pub shell_mode: bool,
    pub maxthreads: usize,
    /// Nonzero exit codes that are not reported
    pub ok_codes: Vec<i32>,

    pub node_list_cmd: String,
    pub master_release_cmd: String,
    pub node_release_cmd: String,

    pub hard_filter: FilterSpec,
    pub soft_filter: FilterSpec,

    /// Resolved timestamp suffix, set when `outputs_timestamp` is on
    #[serde(skip)]
    pub outputs_timestamp_str: Option<String>,
}

impl Settings {
    /// API root to query, if one can be derived.
    pub fn api_url(&self) -> Option<String> {
        self.api_url.clone().or_else(|| {
            self.master_ip
                .as_ref()
                .map(|ip| format!("http://{ip}:8000/api/v1"))
        })
    }

    /// The node list command run on the master, with credentials if set.
    pub fn node_list_command(&self) -> String {
        let mut cmd = self.node_list_cmd.clone();
        if let Some(user) = &self.master_user {
            cmd.push_str(&format!(" --user {user}"));
        }
        if let Some(pass) = &self.master_pass {
            cmd.push_str(&format!(" --password {pass}"));
        }
        cmd
    }

    /// Session settings used when a node has no overrides.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            ssh_opts: self.ssh_opts.clone(),
            env_vars: self.env_vars.clone(),
            timeout: self.timeout,
            prefix: self.prefix.clone().filter(|p| !p.is_empty()),
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.maxthreads == 0 {
            return Err("maxthreads must be at least 1".to_string());
        }
        if self.timeout == 0 {
            return Err("timeout must be at least 1 second".to_string());
        }
        if self.master_ip.as_deref() == Some("") {
            return Err("master_ip is empty".to_string());
        }
        Ok(())
    }

    fn expand_paths(&mut self) {
        self.rqdir = expand_path(&self.rqdir);
        self.outdir = expand_path(&self.outdir);
        self.archive_dir = expand_path(&self.archive_dir);
        self.rqfile = self.rqfile.as_deref().map(expand_path);
    }
}

fn expand_path(path: &Path) -> PathBuf {
    paths::expand(&path.to_string_lossy())
}

// ============================================================================
// Config
// ============================================================================

/// Settings, rule tree and once rules of one invocation
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub rules: RuleTree,
    /// `once_by_<attr>` sections, each assigned to a single node
    pub once: BTreeMap<String, RuleTree>,
    /// User config file, if one was loaded
    pub source: Option<PathBuf>,
}

impl Config {
    /// Built-in defaults only.
    pub fn defaults() -> Result<Self> {
        Self::from_document(default_document()?, None)
    }

    /// Load defaults overlaid by a user config file.
    ///
    /// Without an explicit path the default location is used when it
    /// exists. An explicit path that does not exist is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let source = match explicit {
            Some(path) if !path.exists() => {
                return Err(FatalError::invalid_config(
                    path.display().to_string(),
                    "file not found",
                )
                .into());
            }
            Some(path) => Some(path.to_path_buf()),
            None => Some(paths::config_file()?).filter(|p| p.exists()),
        };

        let Some(path) = source else {
            log::debug!("no config file, using built-in defaults");
            return Self::defaults();
        };

        log::info!("loading config from {}", path.display());
        let mut document = default_document()?;
        document.extend(read_document(&path)?);
        Self::from_document(document, Some(path))
    }

    /// Built-in defaults with `overlay` applied on top.
    pub fn from_overlay(overlay: Map<String, Value>) -> Result<Self> {
        let mut document = default_document()?;
        document.extend(overlay);
        Self::from_document(document, None)
    }

    /// Split a merged document into settings, rules and once rules.
    pub fn from_document(document: Map<String, Value>, source: Option<PathBuf>) -> Result<Self> {
        let origin = source
            .as_ref()
            .map_or_else(|| "defaults".to_string(), |p| p.display().to_string());

        let (settings_map, rules_map): (Map<String, Value>, Map<String, Value>) = document
            .into_iter()
            .partition(|(key, _)| SETTING_KEYS.contains(&key.as_str()));

        let mut settings: Settings = serde_json::from_value(Value::Object(settings_map))
            .map_err(|e| FatalError::invalid_config(&origin, e))?;
        settings
            .validate()
            .map_err(|e| FatalError::invalid_config(&origin, e))?;
        settings.expand_paths();

        let mut rules = RuleTree::from_map(rules_map);
        let once = rules.split_once_rules();

        Ok(Self {
            settings,
            rules,
            once,
            source,
        })
    }

    /// Import an attribute-first rule file into the rule tree.
    ///
    /// Once sections brought in by the file join the once map.
    pub fn import_rq_file(&mut self, path: &Path) -> Result<()> {
        let document = read_document(path)?;
        let rq = RuleTree::from_map(document);
        import_rq(&mut self.rules, &rq)
            .map_err(|e| FatalError::invalid_config(path.display().to_string(), e))?;

        for (key, tree) in self.rules.split_once_rules() {
            match self.once.get_mut(&key) {
                Some(existing) => existing.overlay(tree),
                None => {
                    self.once.insert(key, tree);
                }
            }
        }
        Ok(())
    }
}

fn default_document() -> Result<Map<String, Value>> {
    let value: Value = toml::from_str(DEFAULT_CONFIG).context("Invalid built-in defaults")?;
    into_mapping(value, "built-in defaults")
}

/// Read a TOML, YAML or JSON document, chosen by file extension.
///
/// Files with another extension are read as YAML.
pub fn read_document(path: &Path) -> Result<Map<String, Value>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read config file: {}", path.display()))?;
    let origin = path.display().to_string();

    let value = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => {
            toml::from_str::<Value>(&content).map_err(|e| FatalError::invalid_config(&origin, e))?
        }
        Some("json") => serde_json::from_str::<Value>(&content)
            .map_err(|e| FatalError::invalid_config(&origin, e))?,
        _ => serde_yaml::from_str::<serde_yaml::Value>(&content)
            .map(yaml_to_json)
            .map_err(|e| FatalError::invalid_config(&origin, e))?,
    };

    into_mapping(value, &origin)
}

fn into_mapping(value: Value, origin: &str) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(FatalError::invalid_config(origin, "top level must be a mapping").into()),
    }
}

/// Convert YAML to JSON, stringifying scalar mapping keys (`by_id: {7: ..}`).
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .filter_map(|(key, value)| {
                    let key = match key {
                        Yaml::String(s) => s,
                        Yaml::Number(n) => n.to_string(),
                        Yaml::Bool(b) => b.to_string(),
                        other => {
                            log::warn!("ignoring non-scalar mapping key {other:?}");
                            return None;
                        }
                    };
                    Some((key, yaml_to_json(value)))
                })
                .collect(),
        ),
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

// ============================================================================
// Tests
// ============================================================================
