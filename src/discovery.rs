//! Node inventory and release metadata
//!
//! The management API is tried first; the node-list CLI on the master is the
//! fallback. Only when both fail is the run aborted.

use crate::config::Settings;
use crate::error::FatalError;
use crate::node::{NO_ROLE, NOT_AVAILABLE, Node};
use anyhow::{Context, Result};
use inventory::ManagementApi;
use remote::{ExecRequest, Transport};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// One node as reported by the cluster manager
#[derive(Debug, Clone, Deserialize)]
pub struct NodeRecord {
    pub id: u32,
    pub ip: String,
    #[serde(default)]
    cluster: Value,
    #[serde(default)]
    roles: Value,
    #[serde(default)]
    fqdn: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    mac: Option<String>,
    #[serde(default)]
    os_platform: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    online: bool,
}

impl NodeRecord {
    /// Cluster id; `0`, `null` and unparsable values mean no cluster.
    pub fn cluster(&self) -> Option<u32> {
        let id = match &self.cluster {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        id.filter(|c| *c != 0).and_then(|c| u32::try_from(c).ok())
    }

    /// Roles as a list; a `", "`-separated string is split.
    pub fn roles(&self) -> Vec<String> {
        let roles: Vec<String> = match &self.roles {
            Value::String(s) => s
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(String::from)
                .collect(),
            other => ruletree::tokens(other),
        };
        if roles.is_empty() {
            vec![NO_ROLE.to_string()]
        } else {
            roles
        }
    }

    pub fn into_node(self) -> Node {
        let cluster = self.cluster();
        let roles = self.roles();
        let text = |v: Option<String>| v.unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let mut node = Node::new(self.id, self.ip);
        node.cluster = cluster;
        node.roles = roles;
        node.fqdn = text(self.fqdn);
        node.name = self.name.unwrap_or_default();
        node.mac = text(self.mac);
        node.os_platform = self.os_platform.unwrap_or_default();
        node.status = self.status.unwrap_or_default();
        node.online = self.online;
        node
    }
}

/// Parse node records, skipping the ones that do not fit.
pub fn parse_records(records: Vec<Value>) -> Vec<NodeRecord> {
    records
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<NodeRecord>(value.clone()) {
            Ok(record) if record.id == 0 => {
                log::warn!("skipping inventory record with reserved id 0");
                None
            }
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("skipping inventory record {value}: {e}");
                None
            }
        })
        .collect()
}

/// Fetch the node list, from the API when available, else from the CLI.
pub fn fetch_nodes(
    api: Option<&dyn ManagementApi>,
    transport: &dyn Transport,
    settings: &Settings,
) -> Result<Vec<Value>> {
    if let Some(api) = api {
        match api.get_request("nodes") {
            Ok(Value::Array(nodes)) => {
                log::info!("got {} nodes from the management API", nodes.len());
                return Ok(nodes);
            }
            Ok(other) => log::warn!("management API returned a non-list node inventory: {other}"),
            Err(e) => log::warn!("management API unavailable ({}): {e}", e.category()),
        }
    }

    log::info!("falling back to the node list CLI");
    fetch_nodes_cli(transport, settings).map_err(|e| {
        log::error!("node list CLI failed: {e:#}");
        FatalError::NoInventory.into()
    })
}

fn fetch_nodes_cli(transport: &dyn Transport, settings: &Settings) -> Result<Vec<Value>> {
    let master_ip = settings
        .master_ip
        .as_deref()
        .ok_or(FatalError::MasterIpMissing)?;
    let request = ExecRequest::command(settings.node_list_command(), settings.session_options());
    let output = transport
        .exec(master_ip, &request)
        .context("Could not run the node list command")?;
    if !output.success() {
        anyhow::bail!(
            "node list command exited with code {}: {}",
            output.code,
            output.stderr.trim()
        );
    }

    match serde_json::from_str(&output.stdout).context("Node list output is not JSON")? {
        Value::Array(nodes) => Ok(nodes),
        _ => anyhow::bail!("node list output is not a JSON list"),
    }
}

/// Read a node list saved to a JSON file.
pub fn load_nodes_file(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read node list: {}", path.display()))?;
    match serde_json::from_str(&content)
        .map_err(|e| FatalError::invalid_config(path.display().to_string(), e))?
    {
        Value::Array(nodes) => Ok(nodes),
        _ => Err(FatalError::invalid_config(path.display().to_string(), "expected a JSON list").into()),
    }
}

/// Release strings from the management API
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// Release of the management controller
    pub master: Option<String>,
    /// Cluster id to release
    pub clusters: BTreeMap<u32, String>,
}

impl ReleaseInfo {
    /// Query `version` and `clusters`.
    pub fn fetch(api: &dyn ManagementApi) -> inventory::Result<Self> {
        let version = api.get_request("version")?;
        let master = version
            .get("release")
            .and_then(ruletree::canonical)
            .ok_or_else(|| inventory::Error::InvalidResponse("version has no release".into()))?;

        let Value::Array(list) = api.get_request("clusters")? else {
            return Err(inventory::Error::InvalidResponse(
                "clusters is not a list".into(),
            ));
        };
        let clusters = list
            .iter()
            .filter_map(|cluster| {
                let id = cluster.get("id")?.as_u64().and_then(|id| u32::try_from(id).ok())?;
                let release = cluster.get("fuel_version").and_then(ruletree::canonical)?;
                Some((id, release))
            })
            .collect();

        Ok(Self {
            master: Some(master),
            clusters,
        })
    }

    /// Release of `node`, `n/a` when unknown.
    pub fn release_for(&self, node: &Node) -> String {
        let release = if node.is_master() {
            self.master.clone()
        } else {
            node.cluster.and_then(|c| self.clusters.get(&c).cloned())
        };
        release.unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }
}
