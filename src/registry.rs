//! The fleet registry
//!
//! Building a registry runs the whole preparation pipeline:
//! 1. prepare output directories and the rule tree
//! 2. acquire the inventory (API, else CLI), construct nodes and resolve
//!    their rules
//! 3. drop nodes failing the hard filter, mark nodes failing the soft filter
//! 4. acquire release metadata (API, else a probe per node)
//! 5. re-resolve every node cleanly, then assign once rules
//!
//! Steps 4 and 5 are skipped in shell mode.

use crate::config::Config;
use crate::engine::{BatchResults, FLEET_RUN_LOCK, ItemFailure, RunLock, run_batch};
use crate::error::FatalError;
use crate::filter;
use crate::discovery::{self, ReleaseInfo};
use crate::node::{ExecContext, ExecResults, NOT_AVAILABLE, Node};
use crate::progress;
use anyhow::{Context, Result};
use chrono::Local;
use inventory::ManagementApi;
use remote::Transport;
use ruletree::{DEFAULT_KEY, RuleTarget, RuleTree, apply_config, match_attribute};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Columns of the node table
pub const TABLE_HEADER: [&str; 10] = [
    "node-id", "cluster", "ip", "mac", "os", "roles", "online", "status", "name", "fqdn",
];

/// Suffix marking filtered-out nodes in the table
pub const SKIPPED_MARK: &str = "[skipped]";

/// Timestamp suffix appended to output names and directories
pub const TIMESTAMP_FORMAT: &str = "_%Y-%m-%d_%H-%M-%S";

/// Outcome of a fleet-wide operation
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Nodes the operation was dispatched to
    pub nodes: usize,
    /// Nodes whose work failed as a whole, by address
    pub failed: BTreeMap<String, ItemFailure>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.nodes - self.failed.len()
    }
}

/// All nodes of one invocation, keyed by address.
pub struct FleetRegistry {
    config: Config,
    nodes: BTreeMap<String, Node>,
    transport: Arc<dyn Transport>,
    api: Option<Arc<dyn ManagementApi>>,
    run_lock: &'static RunLock,
    show_progress: bool,
}

impl FleetRegistry {
    /// Build the registry and run the preparation pipeline.
    ///
    /// With `nodes_file`, the inventory is read from that file instead of
    /// the API or the CLI.
    pub fn build(
        config: Config,
        transport: Arc<dyn Transport>,
        api: Option<Arc<dyn ManagementApi>>,
        nodes_file: Option<&Path>,
    ) -> Result<Self> {
        let mut registry = Self {
            config,
            nodes: BTreeMap::new(),
            transport,
            api,
            run_lock: &FLEET_RUN_LOCK,
            show_progress: false,
        };

        registry.prepare()?;
        registry.load_nodes(nodes_file)?;
        registry.apply_soft_filter();

        if !registry.config.settings.shell_mode {
            registry.acquire_release()?;
            registry.reapply_rules();
            registry.assign_once();
        }

        log::info!(
            "{} nodes in registry, {} active",
            registry.nodes.len(),
            registry.nodes.values().filter(|n| !n.filtered_out).count()
        );
        Ok(registry)
    }

    /// Draw a progress bar during fleet-wide operations.
    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Use a private run lock instead of the process-wide one.
    #[must_use]
    pub fn with_run_lock(mut self, lock: &'static RunLock) -> Self {
        self.run_lock = lock;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    fn prepare(&mut self) -> Result<()> {
        let settings = &mut self.config.settings;

        if settings.outputs_timestamp || settings.dir_timestamp {
            let stamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
            if settings.outputs_timestamp {
                settings.outputs_timestamp_str = Some(stamp.clone());
            }
            if settings.dir_timestamp {
                settings.outdir = PathBuf::from(format!("{}{stamp}", settings.outdir.display()));
            }
        }

        if settings.clean && settings.outdir.exists() {
            log::debug!("removing {}", settings.outdir.display());
            fs::remove_dir_all(&settings.outdir)
                .with_context(|| format!("Could not clean {}", settings.outdir.display()))?;
        }

        if !settings.shell_mode {
            if !settings.rqdir.is_dir() {
                return Err(FatalError::RqdirMissing(settings.rqdir.clone()).into());
            }
            if let Some(rqfile) = settings.rqfile.clone() {
                log::info!("importing rules from {}", rqfile.display());
                self.config.import_rq_file(&rqfile)?;
            }
        }

        if self.config.settings.master_ip.is_none() {
            return Err(FatalError::MasterIpMissing.into());
        }
        Ok(())
    }

    fn load_nodes(&mut self, nodes_file: Option<&Path>) -> Result<()> {
        let settings = &self.config.settings;
        let master_ip = settings
            .master_ip
            .clone()
            .ok_or(FatalError::MasterIpMissing)?;

        let mut master = Node::master(master_ip);
        apply_config(&mut master, &self.config.rules, true);
        if !filter::passes(&master, &settings.hard_filter, settings.shell_mode) {
            log::debug!("master fails the hard filter, marking it skipped");
            master.filtered_out = true;
        }
        self.nodes.insert(master.ip.clone(), master);

        let records = match nodes_file {
            Some(path) => discovery::load_nodes_file(path)?,
            None => discovery::fetch_nodes(self.api.as_deref(), self.transport.as_ref(), settings)?,
        };

        for record in discovery::parse_records(records) {
            let mut node = record.into_node();
            if self.nodes.contains_key(&node.ip) {
                log::warn!("node-{}: duplicate address {}, skipping", node.id, node.ip);
                continue;
            }
            apply_config(&mut node, &self.config.rules, true);
            if !filter::passes(&node, &settings.hard_filter, settings.shell_mode) {
                log::debug!("node-{} fails the hard filter", node.id);
                continue;
            }
            self.nodes.insert(node.ip.clone(), node);
        }
        Ok(())
    }

    fn apply_soft_filter(&mut self) {
        let settings = &self.config.settings;
        for node in self.nodes.values_mut() {
            if !filter::passes(node, &settings.soft_filter, settings.shell_mode) {
                node.filtered_out = true;
            }
        }
    }

    fn acquire_release(&mut self) -> Result<()> {
        if let Some(api) = &self.api {
            match ReleaseInfo::fetch(api.as_ref()) {
                Ok(info) => {
                    for node in self.nodes.values_mut() {
                        node.release = Some(info.release_for(node));
                    }
                    return Ok(());
                }
                Err(e) => log::warn!("release metadata unavailable from the API: {e}"),
            }
        }
        self.probe_releases()
    }

    fn probe_releases(&mut self) -> Result<()> {
        let settings = &self.config.settings;
        let transport = self.transport.as_ref();
        let items: Vec<_> = self
            .nodes
            .values()
            .filter(|n| !n.filtered_out)
            .map(|node| {
                let work = move || Ok(node.probe_release(transport, settings));
                (node.ip.clone(), work)
            })
            .collect();

        let results: BatchResults<String, String> = run_batch(items, settings.maxthreads, None)?;
        for (ip, result) in results {
            let release = result.unwrap_or_else(|e| {
                log::warn!("{ip}: release probe failed: {e}");
                NOT_AVAILABLE.to_string()
            });
            if let Some(node) = self.nodes.get_mut(&ip) {
                node.release = Some(release);
            }
        }
        Ok(())
    }

    fn reapply_rules(&mut self) {
        for node in self.nodes.values_mut() {
            apply_config(node, &self.config.rules, true);
        }
    }

    /// Give each `once_by_<attr>` entry to the first matching active node.
    fn assign_once(&mut self) {
        let mut candidates: Vec<&mut Node> = self
            .nodes
            .values_mut()
            .filter(|n| !n.filtered_out)
            .collect();
        candidates.sort_by_key(|n| n.id);

        for (key, section) in &self.config.once {
            let Some(attr) = match_attribute(key) else {
                continue;
            };
            for (value, rules) in section.iter().filter(|(v, _)| v.as_str() != DEFAULT_KEY) {
                let Value::Object(rules) = rules else {
                    log::warn!("{key}.{value} is not a mapping, ignoring");
                    continue;
                };
                let holder = candidates.iter_mut().find(|node| {
                    node.attribute_tokens(attr)
                        .is_some_and(|tokens| tokens.iter().any(|t| t == value))
                });
                match holder {
                    Some(node) => {
                        log::debug!("{key}.{value} assigned to node-{}", node.id);
                        apply_config(&mut **node, &RuleTree::from_map(rules.clone()), false);
                    }
                    None => log::debug!("{key}.{value}: no active node matches"),
                }
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Nodes in ascending id order.
    pub fn sorted_nodes(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.nodes.values().collect();
        nodes.sort_by_key(|n| n.id);
        nodes
    }

    pub fn node(&self, id: u32) -> Option<&Node> {
        self.nodes.values().find(|n| n.id == id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node table, one line per node, columns aligned.
    pub fn table(&self) -> String {
        let rows: Vec<(Vec<String>, bool)> = self
            .sorted_nodes()
            .into_iter()
            .map(|n| (n.table_row(), n.filtered_out))
            .collect();

        let mut widths: Vec<usize> = TABLE_HEADER.iter().map(|h| h.len()).collect();
        for (row, _) in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let format_row = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, &width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let header: Vec<String> = TABLE_HEADER.iter().map(|h| (*h).to_string()).collect();
        let mut lines = vec![format_row(&header[..])];
        for (row, skipped) in rows {
            let mut line = format_row(&row[..]);
            if skipped {
                line.push(' ');
                line.push_str(SKIPPED_MARK);
            }
            lines.push(line);
        }
        lines.join("\n")
    }

    /// Output locations of every node that produced any.
    pub fn results(&self) -> Vec<(u32, &ExecResults)> {
        self.sorted_nodes()
            .into_iter()
            .filter(|n| !n.results.is_empty())
            .map(|n| (n.id, &n.results))
            .collect()
    }

    // ========================================================================
    // Fleet-wide operations
    // ========================================================================

    /// Run every active node's commands and scripts.
    ///
    /// Only one run may be in progress per process; a concurrent attempt
    /// fails with [`crate::error::RunError::AlreadyRunning`].
    pub fn run_commands(
        &mut self,
        ok_codes: &[i32],
        fake: bool,
        max_threads: usize,
    ) -> Result<RunSummary> {
        let _guard = self.run_lock.try_acquire()?;
        let ctx = ExecContext {
            transport: self.transport.as_ref(),
            settings: &self.config.settings,
            ok_codes,
            fake,
        };
        let results = dispatch(
            &self.nodes,
            max_threads,
            self.show_progress,
            "Running commands",
            |node| Ok(node.execute_actions(&ctx)),
        )?;

        Ok(absorb(&mut self.nodes, results, |node, results| {
            node.results.commands = results.commands;
            node.results.scripts = results.scripts;
        }))
    }

    /// Copy every active node's resolved files into the output directory.
    pub fn collect_files(&mut self, max_threads: usize) -> Result<RunSummary> {
        let ctx = ExecContext {
            transport: self.transport.as_ref(),
            settings: &self.config.settings,
            ok_codes: &[],
            fake: false,
        };
        let results = dispatch(
            &self.nodes,
            max_threads,
            self.show_progress,
            "Collecting files",
            |node| Ok(node.collect_files(&ctx)?),
        )?;

        Ok(absorb(&mut self.nodes, results, |node, dir| {
            node.results.files = dir;
        }))
    }

    /// Copy every active node's resolved logs into the output directory.
    pub fn collect_logs(&mut self, max_threads: usize) -> Result<RunSummary> {
        let ctx = ExecContext {
            transport: self.transport.as_ref(),
            settings: &self.config.settings,
            ok_codes: &[],
            fake: false,
        };
        let results = dispatch(
            &self.nodes,
            max_threads,
            self.show_progress,
            "Collecting logs",
            |node| Ok(node.collect_logs(&ctx)?),
        )?;

        Ok(absorb(&mut self.nodes, results, |node, dir| {
            node.results.logs = dir;
        }))
    }

    /// Copy every active node's resolved `put` pairs onto it.
    pub fn put_files(&mut self, max_threads: usize) -> Result<RunSummary> {
        let ctx = ExecContext {
            transport: self.transport.as_ref(),
            settings: &self.config.settings,
            ok_codes: &[],
            fake: false,
        };
        let results = dispatch(
            &self.nodes,
            max_threads,
            self.show_progress,
            "Copying files",
            |node| Ok(node.put_files(&ctx)),
        )?;

        Ok(absorb(&mut self.nodes, results, |node, copied| {
            log::debug!("node-{}: {copied} files copied", node.id);
        }))
    }
}

/// Run `work` for every active node.
fn dispatch<'n, T, W>(
    nodes: &'n BTreeMap<String, Node>,
    max_threads: usize,
    show_progress: bool,
    message: &str,
    work: W,
) -> Result<BatchResults<String, T>>
where
    T: Send,
    W: Fn(&'n Node) -> Result<T> + Sync,
{
    let work = &work;
    let items: Vec<_> = nodes
        .values()
        .filter(|n| !n.filtered_out)
        .map(|node| (node.ip.clone(), move || work(node)))
        .collect();

    let pb = if show_progress {
        progress::bar(items.len() as u64, message)
    } else {
        progress::hidden()
    };
    let results = run_batch(items, max_threads, Some(&pb));
    progress::finish_clear(&pb);
    results
}

/// Store batch results on their nodes and summarize failures.
fn absorb<T>(
    nodes: &mut BTreeMap<String, Node>,
    results: BatchResults<String, T>,
    mut store: impl FnMut(&mut Node, T),
) -> RunSummary {
    let mut summary = RunSummary {
        nodes: results.len(),
        ..RunSummary::default()
    };
    for (ip, result) in results {
        match (result, nodes.get_mut(&ip)) {
            (Ok(value), Some(node)) => store(node, value),
            (Ok(_), None) => {}
            (Err(failure), node) => {
                let id = node.map_or_else(|| "?".to_string(), |n| n.id.to_string());
                log::warn!("node-{id} {ip}: {failure}");
                summary.failed.insert(ip, failure);
            }
        }
    }
    summary
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunError;
    use inventory::MockApi;
    use remote::ExecOutput;
    use remote::transport::{MockCall, MockTransport};
    use ruletree::ActionKey;
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        transport: MockTransport,
        api: MockApi,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            fs::create_dir_all(dir.path().join("rq/scripts")).unwrap();
            let api = MockApi::new();
            api.set_resource(
                "nodes",
                json!([
                    {"id": 1, "ip": "10.20.0.3", "cluster": 1, "roles": ["controller"],
                     "status": "ready", "online": true, "fqdn": "node-1.domain.tld"},
                    {"id": 2, "ip": "10.20.0.4", "cluster": 1, "roles": "controller, mongo",
                     "status": "ready", "online": true},
                    {"id": 3, "ip": "10.20.0.5", "cluster": 1, "roles": ["compute"],
                     "status": "error", "online": true},
                    {"id": 4, "ip": "10.20.0.6", "cluster": 2, "roles": ["compute"],
                     "status": "ready", "online": false},
                    {"id": 5, "ip": "10.20.0.7", "cluster": 2, "roles": ["compute"],
                     "status": "ready", "online": true},
                ]),
            );
            api.set_resource("version", json!({"release": "9.0"}));
            api.set_resource(
                "clusters",
                json!([{"id": 1, "fuel_version": "8.0"}, {"id": 2, "fuel_version": "9.0"}]),
            );
            Self {
                dir,
                transport: MockTransport::new(),
                api,
            }
        }

        fn config(&self, overlay: Value) -> Config {
            let mut overlay = overlay.as_object().cloned().unwrap_or_default();
            let base = [
                ("master_ip", json!("10.20.0.2")),
                ("rqdir", json!(self.dir.path().join("rq"))),
                ("outdir", json!(self.dir.path().join("info"))),
            ];
            for (key, value) in base {
                overlay.entry(key).or_insert(value);
            }
            Config::from_overlay(overlay).unwrap()
        }

        fn build(&self, overlay: Value) -> Result<FleetRegistry> {
            FleetRegistry::build(
                self.config(overlay),
                Arc::new(self.transport.clone()),
                Some(Arc::new(self.api.clone())),
                None,
            )
        }
    }

    fn ids(registry: &FleetRegistry, active_only: bool) -> Vec<u32> {
        registry
            .sorted_nodes()
            .into_iter()
            .filter(|n| !active_only || !n.filtered_out)
            .map(|n| n.id)
            .collect()
    }

    #[test]
    fn test_filters_and_release() {
        let fixture = Fixture::new();
        let registry = fixture
            .build(json!({"hard_filter": {"no_id": [5]}}))
            .unwrap();

        assert_eq!(ids(&registry, false), vec![0, 1, 2, 3, 4]);
        assert_eq!(ids(&registry, true), vec![0, 1, 2]);
        assert_eq!(registry.node(0).unwrap().release.as_deref(), Some("9.0"));
        assert_eq!(registry.node(1).unwrap().release.as_deref(), Some("8.0"));
        assert_eq!(registry.node(4).unwrap().release.as_deref(), Some("9.0"));
    }

    #[test]
    fn test_release_probe_fallback() {
        let fixture = Fixture::new();
        fixture.api.set_resource("clusters", json!({"broken": true}));
        let node_cmd = fixture.config(json!({})).settings.node_release_cmd;
        fixture.transport.add_response(
            node_cmd,
            ExecOutput {
                stdout: "'8.0'\n".into(),
                ..Default::default()
            },
        );

        let registry = fixture.build(json!({})).unwrap();
        assert_eq!(registry.node(1).unwrap().release.as_deref(), Some("8.0"));
        // Filtered-out nodes are never probed.
        assert_eq!(registry.node(3).unwrap().release, None);
        assert!(
            fixture
                .transport
                .calls()
                .iter()
                .all(|c| !matches!(c, MockCall::Exec { ip, .. } if ip == "10.20.0.5"))
        );
    }

    #[test]
    fn test_fatal_conditions() {
        let fixture = Fixture::new();
        let err = fixture
            .build(json!({"rqdir": fixture.dir.path().join("missing")}))
            .err()
            .unwrap();
        assert_eq!(crate::error::exit_code(&err), 1);

        let mut config = fixture.config(json!({}));
        config.settings.master_ip = None;
        let err = FleetRegistry::build(config, Arc::new(MockTransport::new()), None, None)
            .err()
            .unwrap();
        assert_eq!(crate::error::exit_code(&err), 7);

        fixture.api.fail_all();
        fixture.transport.add_response(
            "fuel node list --json",
            ExecOutput {
                code: 1,
                ..Default::default()
            },
        );
        let err = fixture.build(json!({})).err().unwrap();
        assert_eq!(crate::error::exit_code(&err), 4);
    }

    #[test]
    fn test_once_rules_assigned_to_single_node() {
        let fixture = Fixture::new();
        let registry = fixture
            .build(json!({
                "commands": {"df": "df -h"},
                "once_by_roles": {
                    "controller": {"commands": {"crm": "crm status"}},
                    "compute": {"commands": {"virsh": "virsh list"}},
                },
            }))
            .unwrap();

        let has = |id: u32, name: &str| {
            registry
                .node(id)
                .unwrap()
                .commands()
                .iter()
                .any(|(n, _)| n == name)
        };
        assert!(has(1, "crm"));
        assert!(!has(2, "crm"));
        assert!(has(1, "df") && has(2, "df"));
        // Node 5 is the only active compute node.
        assert!(has(5, "virsh"));
        assert!(!has(3, "virsh"));
    }

    #[test]
    fn test_shell_mode_skips_rules_and_master() {
        let fixture = Fixture::new();
        let registry = fixture
            .build(json!({
                "shell_mode": true,
                "rqdir": fixture.dir.path().join("missing"),
                "soft_filter": {},
            }))
            .unwrap();
        assert!(registry.node(0).unwrap().filtered_out);
        assert!(registry.node(1).unwrap().release.is_none());
        assert!(fixture.api.requests().iter().all(|r| r == "nodes"));
    }

    #[test]
    fn test_table() {
        let fixture = Fixture::new();
        let registry = fixture.build(json!({})).unwrap();
        let table = registry.table();
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 7);
        assert!(lines[0].starts_with("node-id  cluster  ip"));
        assert!(lines[1].starts_with("0 "));
        assert!(lines[3].contains("controller, mongo"));
        assert!(lines[4].ends_with(SKIPPED_MARK));
        assert!(lines[5].ends_with(SKIPPED_MARK));
        assert!(!lines[2].ends_with(SKIPPED_MARK));
        let ip_column = lines[0].find("ip").unwrap();
        assert_eq!(&lines[1][ip_column..ip_column + 9], "10.20.0.2");
    }

    #[test]
    fn test_run_commands() {
        let fixture = Fixture::new();
        fixture.transport.set_unreachable("10.20.0.4");
        let mut registry = fixture
            .build(json!({
                "commands": {"df": "df -h"},
                "by_roles": {"controller": {"commands": {"crm": "crm status"}}},
            }))
            .unwrap();

        let summary = registry.run_commands(&[], false, 4).unwrap();
        assert_eq!(summary.nodes, 4);
        assert!(summary.failed.is_empty());

        let results = registry.results();
        assert_eq!(results.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![0, 1, 2, 5]);
        let node1 = registry.node(1).unwrap();
        let crm = &node1.results.commands["crm"];
        assert_eq!(fs::read_to_string(crm).unwrap(), "crm status\n");
        assert!(crm.ends_with("commands/cluster-1/node-1/node-1-10.20.0.3-crm"));
        // Unreachable node still gets its output mapping, without files.
        assert!(!registry.node(2).unwrap().results.commands["df"].exists());
        assert_eq!(
            registry.node(1).unwrap().actions(ActionKey::Commands).len(),
            2
        );
    }

    #[test]
    fn test_run_lock_rejects_concurrent_run() {
        static LOCK: RunLock = RunLock::new();
        let fixture = Fixture::new();
        let mut registry = fixture.build(json!({})).unwrap().with_run_lock(&LOCK);

        let held = LOCK.try_acquire().unwrap();
        let err = registry.run_commands(&[], true, 2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RunError>(),
            Some(RunError::AlreadyRunning)
        ));
        drop(held);
        assert!(registry.run_commands(&[], true, 2).is_ok());
    }

    #[test]
    fn test_collect_and_put_files() {
        let fixture = Fixture::new();
        let mut registry = fixture
            .build(json!({
                "by_id": {"1": {"files": ["/etc/hosts"], "put": [["/tmp/x", "/root/x"]]}},
            }))
            .unwrap();

        let summary = registry.collect_files(4).unwrap();
        assert_eq!(summary.nodes, 4);
        let dir = registry.node(1).unwrap().results.files.clone().unwrap();
        assert!(dir.join("etc/hosts").exists());
        assert!(registry.node(2).unwrap().results.files.is_none());

        registry.put_files(4).unwrap();
        assert!(fixture.transport.calls().contains(&MockCall::Put {
            ip: "10.20.0.3".into(),
            src: "/tmp/x".into(),
            dst: "/root/x".into(),
        }));
    }

    #[test]
    fn test_hard_filter_sees_rule_attributes() {
        let fixture = Fixture::new();
        let registry = fixture
            .build(json!({
                "by_roles": {"compute": {"rack": "r1"}, "master": {"rack": "r1"}},
                "hard_filter": {"no_rack": ["r1"]},
            }))
            .unwrap();

        assert_eq!(ids(&registry, false), vec![0, 1, 2]);
        assert!(registry.node(0).unwrap().filtered_out);
    }

    #[test]
    fn test_collect_logs() {
        let fixture = Fixture::new();
        let mut registry = fixture
            .build(json!({
                "by_roles": {"controller": {"logs": [{"path": "/var/log/nova"}]}},
            }))
            .unwrap();

        let summary = registry.collect_logs(4).unwrap();
        assert_eq!(summary.nodes, 4);
        assert!(summary.failed.is_empty());
        let dir = registry.node(1).unwrap().results.logs.clone().unwrap();
        assert!(dir.ends_with("logs/cluster-1/node-1"));
        assert!(dir.join("var/log/nova").exists());
        assert!(registry.node(5).unwrap().results.logs.is_none());
        assert!(
            registry
                .results()
                .iter()
                .any(|(id, results)| *id == 2 && results.logs.is_some())
        );
    }

    #[test]
    fn test_clean_removes_outdir() {
        let fixture = Fixture::new();
        let stale = fixture.dir.path().join("info/stale");
        fs::create_dir_all(&stale).unwrap();
        fixture.build(json!({})).unwrap();
        assert!(!stale.exists());
    }

    #[test]
    fn test_timestamps() {
        let fixture = Fixture::new();
        let registry = fixture
            .build(json!({"outputs_timestamp": true, "dir_timestamp": true}))
            .unwrap();
        let settings = &registry.config().settings;
        let stamp = settings.outputs_timestamp_str.clone().unwrap();
        assert_eq!(stamp.len(), "_2024-01-02_03-04-05".len());
        assert!(settings.outdir.to_string_lossy().ends_with(&stamp));
    }
}
