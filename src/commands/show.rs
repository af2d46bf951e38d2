use anyhow::{Context as _, Result, bail};

use crate::Context;
use crate::cli::FleetArgs;

/// Print one node's resolved attributes and actions as JSON.
pub fn run(ctx: &Context, node_id: u32, args: &FleetArgs) -> Result<()> {
    let registry = super::build_registry(ctx, args)?;
    let Some(node) = registry.node(node_id) else {
        bail!(
            "Node {node_id} is not in the registry ({} nodes after the hard filter)",
            registry.len()
        );
    };

    let json = serde_json::to_string_pretty(&node.describe())
        .context("Could not serialize node")?;
    println!("{json}");
    Ok(())
}
