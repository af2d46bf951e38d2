//! Subcommand implementations

pub mod list;
pub mod run;
pub mod show;

use anyhow::Result;
use inventory::{HttpApi, ManagementApi};
use remote::Transport;
use std::sync::Arc;

use crate::Context;
use crate::cli::FleetArgs;
use crate::config::Config;
use crate::registry::FleetRegistry;

/// Load the config and apply command-line overrides.
pub fn load_config(ctx: &Context, fleet: &FleetArgs) -> Result<Config> {
    let mut config = Config::load(ctx.config.as_deref())?;
    let settings = &mut config.settings;

    if let Some(ip) = &fleet.master_ip {
        settings.master_ip = Some(ip.clone());
    }
    if let Some(rqfile) = &fleet.rqfile {
        settings.rqfile = Some(rqfile.clone());
    }
    if let Some(rqdir) = &fleet.rqdir {
        settings.rqdir = rqdir.clone();
    }
    if let Some(outdir) = &fleet.outdir {
        settings.outdir = outdir.clone();
    }
    if let Some(token) = &fleet.api_token {
        settings.api_token = Some(token.clone());
    }
    settings.shell_mode |= fleet.shell_mode;
    if fleet.no_api {
        settings.api_client = false;
    }

    Ok(config)
}

/// Build the registry with the system transport and the HTTP API client.
pub fn build_registry(ctx: &Context, fleet: &FleetArgs) -> Result<FleetRegistry> {
    let config = load_config(ctx, fleet)?;
    let settings = &config.settings;

    let transport: Arc<dyn Transport> = Arc::new(remote::transport::default_transport());
    let api: Option<Arc<dyn ManagementApi>> = if settings.api_client {
        settings.api_url().map(|url| {
            log::debug!("management API at {url}");
            Arc::new(HttpApi::new(url, settings.api_token.clone(), settings.skip_proxy))
                as Arc<dyn ManagementApi>
        })
    } else {
        None
    };

    let registry = FleetRegistry::build(config, transport, api, fleet.nodes_json.as_deref())?;
    Ok(registry.with_progress(!ctx.quiet))
}
