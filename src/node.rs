//! Fleet members and their per-node operations
//!
//! A [`Node`] carries its identity, the attributes rules match on, and the
//! action lists resolved from the rule tree. Execution borrows the node
//! immutably so many nodes can run on separate workers at once.

use crate::config::Settings;
use remote::{ExecOutput, ExecRequest, SessionOptions, Transport};
use ruletree::{ActionKey, RuleTarget, canonical, tokens};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Attributes fixed at creation; rules cannot rewrite them
pub const RESERVED_ATTRIBUTES: &[&str] = &[
    "id",
    "ip",
    "mac",
    "fqdn",
    "name",
    "cluster",
    "roles",
    "os_platform",
    "status",
    "online",
    "release",
];

/// Placeholder for unknown release and identity values
pub const NOT_AVAILABLE: &str = "n/a";

/// Role given to nodes that report none
pub const NO_ROLE: &str = "none";

/// One member of the fleet.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: u32,
    pub ip: String,
    pub mac: String,
    pub fqdn: String,
    pub name: String,
    pub cluster: Option<u32>,
    pub roles: Vec<String>,
    pub os_platform: String,
    pub status: String,
    pub online: bool,
    /// Release string, set once metadata has been acquired
    pub release: Option<String>,
    /// Kept for reporting but excluded from execution
    pub filtered_out: bool,
    attrs: BTreeMap<String, Value>,
    actions: BTreeMap<ActionKey, Vec<Value>>,
    pub results: ExecResults,
}

/// Output locations produced by a node's actions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecResults {
    /// Command name to output file
    pub commands: BTreeMap<String, PathBuf>,
    /// Script name to output file
    pub scripts: BTreeMap<String, PathBuf>,
    /// Directory collected files were copied into
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<PathBuf>,
    /// Directory collected logs were copied into
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<PathBuf>,
}

impl ExecResults {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
            && self.scripts.is_empty()
            && self.files.is_none()
            && self.logs.is_none()
    }
}

/// Shared inputs of an execution pass
#[derive(Clone, Copy)]
pub struct ExecContext<'a> {
    pub transport: &'a dyn Transport,
    pub settings: &'a Settings,
    /// Nonzero exit codes that are not reported
    pub ok_codes: &'a [i32],
    /// Compute output paths without contacting the node
    pub fake: bool,
}

/// A script to run and its extra environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    pub name: String,
    pub env: Vec<String>,
}

impl Node {
    /// A node with empty action lists.
    pub fn new(id: u32, ip: impl Into<String>) -> Self {
        Self {
            id,
            ip: ip.into(),
            mac: NOT_AVAILABLE.to_string(),
            fqdn: NOT_AVAILABLE.to_string(),
            name: String::new(),
            cluster: None,
            roles: vec![NO_ROLE.to_string()],
            os_platform: String::new(),
            status: String::new(),
            online: true,
            release: None,
            filtered_out: false,
            attrs: BTreeMap::new(),
            actions: BTreeMap::new(),
            results: ExecResults::default(),
        }
    }

    /// The management controller, always node 0.
    pub fn master(ip: impl Into<String>) -> Self {
        Self {
            cluster: Some(0),
            name: "master".to_string(),
            roles: vec!["master".to_string()],
            os_platform: "centos".to_string(),
            status: "ready".to_string(),
            ..Self::new(0, ip)
        }
    }

    pub fn is_master(&self) -> bool {
        self.id == 0
    }

    /// Current value of an attribute, `None` if the node has no such attribute.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        let value = match name {
            "id" => json!(self.id),
            "ip" => json!(self.ip),
            "mac" => json!(self.mac),
            "fqdn" => json!(self.fqdn),
            "name" => json!(self.name),
            "cluster" => json!(self.cluster),
            "roles" => json!(self.roles),
            "os_platform" => json!(self.os_platform),
            "status" => json!(self.status),
            "online" => json!(self.online),
            "release" => json!(self.release),
            _ => return self.attrs.get(name).cloned(),
        };
        Some(value)
    }

    /// Resolved list for an action key
    pub fn actions(&self, key: ActionKey) -> &[Value] {
        self.actions.get(&key).map_or(&[], Vec::as_slice)
    }

    /// Resolved commands as `(name, text)`, sorted by name.
    ///
    /// A bare string is used as both name and text.
    pub fn commands(&self) -> Vec<(String, String)> {
        let mut commands = BTreeMap::new();
        for item in self.actions(ActionKey::Commands) {
            match item {
                Value::Object(map) => {
                    for (name, text) in map {
                        if let Some(text) = canonical(text) {
                            commands.insert(name.clone(), text);
                        }
                    }
                }
                other => {
                    if let Some(text) = canonical(other) {
                        commands.insert(text.clone(), text);
                    }
                }
            }
        }
        commands.into_iter().collect()
    }

    /// Resolved scripts, sorted by name.
    ///
    /// An entry is either a name or `{name: [ENV=VAL, ..]}`.
    pub fn scripts(&self) -> Vec<ScriptEntry> {
        let mut scripts: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for item in self.actions(ActionKey::Scripts) {
            match item {
                Value::Object(map) => {
                    for (name, env) in map {
                        scripts.insert(name.clone(), tokens(env));
                    }
                }
                other => {
                    if let Some(name) = canonical(other) {
                        scripts.entry(name).or_default();
                    }
                }
            }
        }
        scripts
            .into_iter()
            .map(|(name, env)| ScriptEntry { name, env })
            .collect()
    }

    /// Resolved `(src, dst)` pairs to copy onto the node.
    pub fn put_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for item in self.actions(ActionKey::Put) {
            match item {
                Value::Array(pair) if pair.len() == 2 => {
                    if let (Some(src), Some(dst)) = (canonical(&pair[0]), canonical(&pair[1])) {
                        pairs.push((src, dst));
                    }
                }
                Value::Object(map) => {
                    for (src, dst) in map {
                        if let Some(dst) = canonical(dst) {
                            pairs.push((src.clone(), dst));
                        }
                    }
                }
                other => log::warn!("node-{}: ignoring put entry {other}", self.id),
            }
        }
        pairs
    }

    /// Session settings for this node.
    ///
    /// `ssh_opts`, `env_vars`, `timeout` and `prefix` set by rules take
    /// precedence over the global settings.
    pub fn session_options(&self, settings: &Settings) -> SessionOptions {
        let mut options = settings.session_options();
        if let Some(value) = self.attrs.get("ssh_opts") {
            options.ssh_opts = tokens(value);
        }
        if let Some(value) = self.attrs.get("env_vars") {
            options.env_vars = tokens(value);
        }
        if let Some(value) = self.attrs.get("timeout") {
            match value.as_u64().filter(|t| *t > 0) {
                Some(timeout) => options.timeout = timeout,
                None => log::warn!("node-{}: ignoring invalid timeout {value}", self.id),
            }
        }
        if let Some(value) = self.attrs.get("prefix") {
            options.prefix = canonical(value).filter(|p| !p.is_empty());
        }
        options
    }

    // ========================================================================
    // Output layout
    // ========================================================================

    fn cluster_dir(&self) -> String {
        match self.cluster {
            Some(cluster) => format!("cluster-{cluster}"),
            None => "cluster-none".to_string(),
        }
    }

    /// Directory holding this node's command and script outputs
    pub fn command_dir(&self, outdir: &Path) -> PathBuf {
        outdir
            .join("commands")
            .join(self.cluster_dir())
            .join(format!("node-{}", self.id))
    }

    /// Directory collected files are copied into
    pub fn files_dir(&self, outdir: &Path) -> PathBuf {
        outdir
            .join("files")
            .join(self.cluster_dir())
            .join(format!("node-{}", self.id))
    }

    /// Directory collected logs are copied into
    pub fn logs_dir(&self, outdir: &Path) -> PathBuf {
        outdir
            .join("logs")
            .join(self.cluster_dir())
            .join(format!("node-{}", self.id))
    }

    /// Output file for one command or script.
    pub fn output_path(&self, settings: &Settings, name: &str) -> PathBuf {
        let suffix = settings.outputs_timestamp_str.as_deref().unwrap_or("");
        self.command_dir(&settings.outdir)
            .join(format!("node-{}-{}-{name}{suffix}", self.id, self.ip))
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Run every resolved command and script.
    ///
    /// Commands run first, then scripts, each in name order. A failing item
    /// is reported and the rest still run.
    pub fn execute_actions(&self, ctx: &ExecContext<'_>) -> ExecResults {
        let mut results = ExecResults::default();
        let commands = self.commands();
        let scripts = self.scripts();
        if commands.is_empty() && scripts.is_empty() {
            return results;
        }

        if !ctx.fake {
            let dir = self.command_dir(&ctx.settings.outdir);
            if let Err(e) = fs::create_dir_all(&dir) {
                log::error!("node-{}: could not create {}: {e}", self.id, dir.display());
            }
        }
        let options = self.session_options(ctx.settings);

        for (name, text) in commands {
            let dest = self.output_path(ctx.settings, &name);
            if !ctx.fake {
                let request = ExecRequest::command(text.clone(), options.clone());
                self.run_to_file(ctx, "execute_actions", &text, &request, &dest);
            }
            results.commands.insert(name, dest);
        }

        for script in scripts {
            let path = script_path(&ctx.settings.rqdir, &script.name);
            let file_name = path
                .file_name()
                .map_or_else(|| script.name.clone(), |n| n.to_string_lossy().into_owned());
            let dest = self.output_path(ctx.settings, &file_name);
            if !ctx.fake {
                let mut script_options = options.clone();
                if !script.env.is_empty() {
                    script_options.env_vars.clone_from(&script.env);
                }
                let request = ExecRequest::script(path.clone(), script_options);
                let label = path.display().to_string();
                self.run_to_file(ctx, "execute_actions", &label, &request, &dest);
            }
            results.scripts.insert(script.name, dest);
        }

        results
    }

    fn run_to_file(
        &self,
        ctx: &ExecContext<'_>,
        func: &str,
        label: &str,
        request: &ExecRequest,
        dest: &Path,
    ) {
        match ctx.transport.exec(&self.ip, request) {
            Ok(output) => {
                self.check_code(func, label, &output, ctx.ok_codes);
                if let Err(e) = fs::write(dest, &output.stdout) {
                    log::error!(
                        "node-{}: could not write {}: {e}",
                        self.id,
                        dest.display()
                    );
                }
            }
            Err(e) => log::warn!(
                "node-{} {} {}: {func}: '{label}' failed: {e}",
                self.id,
                self.fqdn,
                self.ip
            ),
        }
    }

    /// Warn about a nonzero exit that is not in `ok_codes`.
    pub fn check_code(&self, func: &str, label: &str, output: &ExecOutput, ok_codes: &[i32]) {
        if output.is_ok_with(ok_codes) {
            return;
        }
        log::warn!(
            "node-{} {} {}: {func}: '{label}' exited with code {}, error: {}",
            self.id,
            self.fqdn,
            self.ip,
            output.code,
            output.stderr.trim()
        );
    }

    /// Remote paths to collect: `files` plus every path named in `filelists`.
    pub fn collect_paths(&self, rqdir: &Path) -> Vec<String> {
        let mut paths: Vec<String> = self
            .actions(ActionKey::Files)
            .iter()
            .flat_map(tokens)
            .collect();

        for list in self.actions(ActionKey::Filelists).iter().flat_map(tokens) {
            let file = rqdir.join("filelists").join(&list);
            match fs::read_to_string(&file) {
                Ok(content) => paths.extend(
                    content
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty() && !l.starts_with('#'))
                        .map(String::from),
                ),
                Err(e) => log::warn!(
                    "node-{}: could not read filelist {}: {e}",
                    self.id,
                    file.display()
                ),
            }
        }

        paths.sort();
        paths.dedup();
        paths
    }

    /// Copy the resolved files from the node.
    ///
    /// Returns the local directory they were copied into, or `None` when
    /// there was nothing to collect.
    pub fn collect_files(&self, ctx: &ExecContext<'_>) -> remote::Result<Option<PathBuf>> {
        let paths = self.collect_paths(&ctx.settings.rqdir);
        if paths.is_empty() {
            return Ok(None);
        }
        let dir = self.files_dir(&ctx.settings.outdir);
        if !ctx.fake {
            fs::create_dir_all(&dir)?;
            ctx.transport
                .get(&self.ip, &paths, &dir, &self.session_options(ctx.settings))?;
        }
        Ok(Some(dir))
    }

    /// Remote log paths to collect.
    ///
    /// An entry is a path or a mapping with a `path` key.
    pub fn log_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .actions(ActionKey::Logs)
            .iter()
            .flat_map(|item| match item {
                Value::Object(map) => match map.get("path") {
                    Some(path) => tokens(path),
                    None => {
                        log::warn!("node-{}: log entry without a path: {item}", self.id);
                        Vec::new()
                    }
                },
                other => tokens(other),
            })
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    /// Copy the resolved logs from the node.
    ///
    /// Returns the local directory they were copied into, or `None` when
    /// no logs are resolved for the node.
    pub fn collect_logs(&self, ctx: &ExecContext<'_>) -> remote::Result<Option<PathBuf>> {
        let paths = self.log_paths();
        if paths.is_empty() {
            return Ok(None);
        }
        let dir = self.logs_dir(&ctx.settings.outdir);
        if !ctx.fake {
            fs::create_dir_all(&dir)?;
            ctx.transport
                .get(&self.ip, &paths, &dir, &self.session_options(ctx.settings))?;
        }
        Ok(Some(dir))
    }

    /// Copy every resolved `(src, dst)` pair onto the node.
    ///
    /// Returns how many copies succeeded.
    pub fn put_files(&self, ctx: &ExecContext<'_>) -> usize {
        let options = self.session_options(ctx.settings);
        let mut copied = 0;
        for (src, dst) in self.put_pairs() {
            if ctx.fake {
                copied += 1;
                continue;
            }
            let src = crate::paths::expand(&src);
            match ctx.transport.put(&self.ip, &src, &dst, &options) {
                Ok(()) => copied += 1,
                Err(e) => log::warn!(
                    "node-{} {} {}: put {} -> {dst} failed: {e}",
                    self.id,
                    self.fqdn,
                    self.ip,
                    src.display()
                ),
            }
        }
        copied
    }

    /// Read the release marker on the node.
    ///
    /// Any failure yields `n/a`.
    pub fn probe_release(&self, transport: &dyn Transport, settings: &Settings) -> String {
        let cmd = if self.is_master() {
            &settings.master_release_cmd
        } else {
            &settings.node_release_cmd
        };
        let request = ExecRequest::command(cmd.clone(), self.session_options(settings));

        match transport.exec(&self.ip, &request) {
            Ok(output) if output.success() => {
                let release = output
                    .stdout
                    .trim_matches(|c: char| matches!(c, '\n' | ' ' | '"' | '\''))
                    .to_string();
                if release.is_empty() {
                    NOT_AVAILABLE.to_string()
                } else {
                    release
                }
            }
            Ok(output) => {
                self.check_code("probe_release", cmd, &output, &[]);
                NOT_AVAILABLE.to_string()
            }
            Err(e) => {
                log::warn!("node-{} {}: release probe failed: {e}", self.id, self.ip);
                NOT_AVAILABLE.to_string()
            }
        }
    }

    /// Cells of this node's inventory table row.
    pub fn table_row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.cluster.map(|c| c.to_string()).unwrap_or_default(),
            self.ip.clone(),
            self.mac.clone(),
            self.os_platform.clone(),
            self.roles.join(", "),
            self.online.to_string(),
            self.status.clone(),
            self.name.clone(),
            self.fqdn.clone(),
        ]
    }

    /// Identity, attributes and resolved actions as JSON.
    pub fn describe(&self) -> Value {
        let mut attributes = serde_json::Map::new();
        for name in RESERVED_ATTRIBUTES {
            if let Some(value) = self.attribute(name) {
                attributes.insert((*name).to_string(), value);
            }
        }
        for (name, value) in &self.attrs {
            attributes.insert(name.clone(), value.clone());
        }
        let actions: serde_json::Map<String, Value> = self
            .actions
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(key, list)| (key.as_str().to_string(), Value::Array(list.clone())))
            .collect();

        json!({
            "attributes": attributes,
            "filtered_out": self.filtered_out,
            "actions": actions,
        })
    }
}

impl RuleTarget for Node {
    fn priority_key(&self) -> String {
        self.id.to_string()
    }

    fn attribute_tokens(&self, name: &str) -> Option<Vec<String>> {
        self.attribute(name).map(|value| tokens(&value))
    }

    fn actions_mut(&mut self, key: ActionKey) -> &mut Vec<Value> {
        self.actions.entry(key).or_default()
    }

    fn set_attribute(&mut self, name: &str, value: Value) {
        if RESERVED_ATTRIBUTES.contains(&name) {
            log::warn!("node-{}: rules cannot change '{name}'", self.id);
            return;
        }
        self.attrs.insert(name.to_string(), value);
    }
}

/// Local path of a script.
///
/// Names containing a path separator are used as they are; anything else
/// lives in `<rqdir>/scripts/`.
pub fn script_path(rqdir: &Path, name: &str) -> PathBuf {
    if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
        PathBuf::from(name)
    } else {
        rqdir.join("scripts").join(name)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use remote::transport::{MockCall, MockTransport};
    use ruletree::{RuleTree, apply_config};
    use tempfile::TempDir;

    fn settings(outdir: &TempDir) -> Settings {
        let mut settings = Config::defaults().unwrap().settings;
        settings.outdir = outdir.path().join("info");
        settings.rqdir = outdir.path().join("rq");
        settings
    }

    fn controller() -> Node {
        Node {
            cluster: Some(1),
            roles: vec!["controller".to_string()],
            fqdn: "node-3.domain.tld".to_string(),
            ..Node::new(3, "10.20.0.5")
        }
    }

    fn tree(value: Value) -> RuleTree {
        RuleTree::from_value(value).unwrap()
    }

    #[test]
    fn test_role_match_example() {
        let rules = tree(json!({
            "commands": {"df": "df -h"},
            "by_roles": {"controller": {"commands": {"uptime": "uptime"}}},
        }));

        let mut node = controller();
        apply_config(&mut node, &rules, true);
        assert_eq!(
            node.commands(),
            vec![
                ("df".to_string(), "df -h".to_string()),
                ("uptime".to_string(), "uptime".to_string()),
            ]
        );

        let mut compute = Node {
            roles: vec!["compute".to_string()],
            ..Node::new(4, "10.20.0.6")
        };
        apply_config(&mut compute, &rules, true);
        assert_eq!(compute.commands(), vec![("df".to_string(), "df -h".to_string())]);
    }

    #[test]
    fn test_reserved_attributes_are_kept() {
        let mut node = controller();
        apply_config(
            &mut node,
            &tree(json!({"ip": "1.2.3.4", "roles": ["x"], "timeout": 30})),
            true,
        );
        assert_eq!(node.ip, "10.20.0.5");
        assert_eq!(node.roles, vec!["controller"]);
        assert_eq!(node.attribute("timeout"), Some(json!(30)));
    }

    #[test]
    fn test_match_on_extra_attribute() {
        let mut node = controller();
        apply_config(
            &mut node,
            &tree(json!({
                "tier": "gold",
                "by_tier": {"gold": {"files": ["/etc/gold"]}},
            })),
            true,
        );
        assert_eq!(node.actions(ActionKey::Files), &[json!("/etc/gold")]);
    }

    #[test]
    fn test_session_options_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        let mut node = controller();
        apply_config(
            &mut node,
            &tree(json!({"timeout": 60, "env_vars": ["A=1"], "prefix": ""})),
            true,
        );

        let options = node.session_options(&settings);
        assert_eq!(options.timeout, 60);
        assert_eq!(options.env_vars, vec!["A=1"]);
        assert_eq!(options.prefix, None);
        assert_eq!(options.ssh_opts, settings.ssh_opts);
    }

    #[test]
    fn test_output_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(&dir);
        let node = controller();
        assert_eq!(
            node.output_path(&settings, "df"),
            settings
                .outdir
                .join("commands/cluster-1/node-3/node-3-10.20.0.5-df")
        );

        settings.outputs_timestamp_str = Some("_2024-01-02_03-04-05".to_string());
        let unclustered = Node::new(9, "10.20.0.9");
        assert_eq!(
            unclustered.output_path(&settings, "df"),
            settings
                .outdir
                .join("commands/cluster-none/node-9/node-9-10.20.0.9-df_2024-01-02_03-04-05")
        );
    }

    #[test]
    fn test_execute_actions_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        let transport = MockTransport::new();
        transport.add_response(
            "false",
            ExecOutput {
                stdout: "partial\n".into(),
                stderr: "boom".into(),
                code: 1,
            },
        );

        let mut node = controller();
        apply_config(
            &mut node,
            &tree(json!({
                "commands": [{"df": "df -h"}, {"bad": "false"}, "uptime"],
                "scripts": ["check.sh", {"env.sh": ["X=1"]}],
            })),
            true,
        );

        let ctx = ExecContext {
            transport: &transport,
            settings: &settings,
            ok_codes: &[],
            fake: false,
        };
        let results = node.execute_actions(&ctx);

        assert_eq!(
            results.commands.keys().collect::<Vec<_>>(),
            vec!["bad", "df", "uptime"]
        );
        assert_eq!(fs::read_to_string(&results.commands["df"]).unwrap(), "df -h\n");
        assert_eq!(fs::read_to_string(&results.commands["bad"]).unwrap(), "partial\n");
        assert_eq!(
            results.scripts["check.sh"],
            node.output_path(&settings, "check.sh")
        );
        assert_eq!(
            fs::read_to_string(&results.scripts["env.sh"]).unwrap(),
            "env.sh\n"
        );

        let execs: Vec<String> = transport
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Exec { what, .. } => Some(what),
                _ => None,
            })
            .collect();
        assert_eq!(execs, vec!["false", "df -h", "uptime", "check.sh", "env.sh"]);
    }

    #[test]
    fn test_script_env_replaces_node_env() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        let transport = MockTransport::new();
        let mut node = controller();
        apply_config(
            &mut node,
            &tree(json!({
                "env_vars": ["A=1", "B=2"],
                "scripts": ["plain.sh", {"env.sh": ["X=1"]}],
            })),
            true,
        );

        let ctx = ExecContext {
            transport: &transport,
            settings: &settings,
            ok_codes: &[],
            fake: false,
        };
        node.execute_actions(&ctx);

        let envs: BTreeMap<String, Vec<String>> = transport
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Exec { what, env, .. } => Some((what, env)),
                _ => None,
            })
            .collect();
        assert_eq!(envs["plain.sh"], vec!["A=1", "B=2"]);
        assert_eq!(envs["env.sh"], vec!["X=1"]);
    }

    #[test]
    fn test_execute_actions_fake_does_not_contact_node() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        let transport = MockTransport::new();
        let mut node = controller();
        apply_config(&mut node, &tree(json!({"commands": {"df": "df -h"}})), true);

        let ctx = ExecContext {
            transport: &transport,
            settings: &settings,
            ok_codes: &[],
            fake: true,
        };
        let results = node.execute_actions(&ctx);
        assert_eq!(results.commands.len(), 1);
        assert!(transport.calls().is_empty());
        assert!(!results.commands["df"].exists());
    }

    #[test]
    fn test_unreachable_node_still_maps_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        let transport = MockTransport::new();
        transport.set_unreachable("10.20.0.5");
        let mut node = controller();
        apply_config(&mut node, &tree(json!({"commands": {"a": "a", "b": "b"}})), true);

        let ctx = ExecContext {
            transport: &transport,
            settings: &settings,
            ok_codes: &[],
            fake: false,
        };
        let results = node.execute_actions(&ctx);
        assert_eq!(results.commands.len(), 2);
        assert!(!results.commands["a"].exists());
    }

    #[test]
    fn test_script_path() {
        let rqdir = Path::new("/opt/rq");
        assert_eq!(script_path(rqdir, "x.sh"), PathBuf::from("/opt/rq/scripts/x.sh"));
        assert_eq!(script_path(rqdir, "/tmp/y.sh"), PathBuf::from("/tmp/y.sh"));
        assert_eq!(script_path(rqdir, "./z.sh"), PathBuf::from("./z.sh"));
    }

    #[test]
    fn test_collect_files_with_filelists() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        fs::create_dir_all(settings.rqdir.join("filelists")).unwrap();
        fs::write(
            settings.rqdir.join("filelists/nova"),
            "# nova\n/etc/nova/nova.conf\n\n/etc/hosts\n",
        )
        .unwrap();

        let transport = MockTransport::new();
        let mut node = controller();
        apply_config(
            &mut node,
            &tree(json!({"files": ["/etc/hosts"], "filelists": "nova"})),
            true,
        );
        assert_eq!(
            node.collect_paths(&settings.rqdir),
            vec!["/etc/hosts", "/etc/nova/nova.conf"]
        );

        let ctx = ExecContext {
            transport: &transport,
            settings: &settings,
            ok_codes: &[],
            fake: false,
        };
        let collected = node.collect_files(&ctx).unwrap().unwrap();
        assert_eq!(collected, settings.outdir.join("files/cluster-1/node-3"));
        assert!(collected.join("etc/nova/nova.conf").exists());
    }

    #[test]
    fn test_collect_logs() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        let transport = MockTransport::new();
        let ctx = ExecContext {
            transport: &transport,
            settings: &settings,
            ok_codes: &[],
            fake: false,
        };

        let mut node = controller();
        assert_eq!(node.collect_logs(&ctx).unwrap(), None);

        apply_config(
            &mut node,
            &tree(json!({
                "logs": [{"path": "/var/log/nova"}, "/var/log/messages", {"exclude": "x"}],
            })),
            false,
        );
        assert_eq!(node.log_paths(), vec!["/var/log/messages", "/var/log/nova"]);

        let collected = node.collect_logs(&ctx).unwrap().unwrap();
        assert_eq!(collected, settings.outdir.join("logs/cluster-1/node-3"));
        assert!(collected.join("var/log/messages").exists());
        assert!(transport.calls().contains(&MockCall::Get {
            ip: "10.20.0.5".into(),
            paths: vec!["/var/log/messages".into(), "/var/log/nova".into()],
        }));
    }

    #[test]
    fn test_put_files() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        let transport = MockTransport::new();
        let mut node = controller();
        apply_config(
            &mut node,
            &tree(json!({"put": [["/tmp/a", "/root/a"], {"/tmp/b": "/root/b"}]})),
            false,
        );

        let ctx = ExecContext {
            transport: &transport,
            settings: &settings,
            ok_codes: &[],
            fake: false,
        };
        assert_eq!(node.put_files(&ctx), 2);
        assert_eq!(
            transport.calls()[1],
            MockCall::Put {
                ip: "10.20.0.5".into(),
                src: "/tmp/b".into(),
                dst: "/root/b".into(),
            }
        );
    }

    #[test]
    fn test_probe_release() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);
        let transport = MockTransport::new();
        transport.add_response(
            settings.node_release_cmd.clone(),
            ExecOutput {
                stdout: " \"9.0\"\n".into(),
                ..Default::default()
            },
        );
        transport.add_response(
            settings.master_release_cmd.clone(),
            ExecOutput {
                code: 2,
                ..Default::default()
            },
        );

        assert_eq!(controller().probe_release(&transport, &settings), "9.0");
        assert_eq!(
            Node::master("10.20.0.2").probe_release(&transport, &settings),
            NOT_AVAILABLE
        );
    }

    #[test]
    fn test_table_row() {
        let row = controller().table_row();
        assert_eq!(row[0], "3");
        assert_eq!(row[1], "1");
        assert_eq!(row[5], "controller");
        assert_eq!(Node::new(5, "x").table_row()[1], "");
    }
}
