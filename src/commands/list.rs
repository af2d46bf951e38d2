use anyhow::Result;

use crate::Context;
use crate::cli::FleetArgs;

pub fn run(ctx: &Context, args: &FleetArgs) -> Result<()> {
    let registry = super::build_registry(ctx, args)?;
    println!("{}", registry.table());
    Ok(())
}
