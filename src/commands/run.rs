use anyhow::Result;

use crate::Context;
use crate::archive;
use crate::cli::RunArgs;
use crate::registry::{FleetRegistry, RunSummary};
use crate::ui;

const PATH_WIDTH: usize = 70;

pub fn run(ctx: &Context, args: &RunArgs) -> Result<()> {
    let mut registry = super::build_registry(ctx, &args.fleet)?;
    let settings = registry.config().settings.clone();

    let jobs = args.jobs.unwrap_or(settings.maxthreads).max(1);
    let mut ok_codes = settings.ok_codes.clone();
    ok_codes.extend(&args.ok_codes);

    if args.put && !args.fake {
        let summary = registry.put_files(jobs)?;
        report(ctx, "put", &summary);
    }

    let summary = registry.run_commands(&ok_codes, args.fake, jobs)?;
    report(ctx, "commands", &summary);

    if args.files && !args.fake {
        let summary = registry.collect_files(jobs)?;
        report(ctx, "files", &summary);
    }

    if args.logs && !args.fake {
        let summary = registry.collect_logs(jobs)?;
        report(ctx, "logs", &summary);
    }

    if !ctx.quiet {
        print_results(&registry, ctx.verbose > 0);
    }

    if args.archive && !args.fake {
        let path = archive::create_archive(&settings.outdir, &settings.archive_dir)?;
        if !ctx.quiet {
            ui::success(&format!("Bundle written to {}", path.display()));
        }
    }

    Ok(())
}

fn report(ctx: &Context, what: &str, summary: &RunSummary) {
    if summary.failed.is_empty() {
        if !ctx.quiet {
            ui::success(&format!("{what}: {} done", ui::count(summary.nodes, "node")));
        }
        return;
    }

    ui::warn(&format!(
        "{what}: {} succeeded, {} failed",
        ui::count(summary.succeeded(), "node"),
        summary.failed.len()
    ));
    for (ip, failure) in &summary.failed {
        ui::kv(ip, &failure.to_string());
    }
}

fn print_results(registry: &FleetRegistry, detailed: bool) {
    let results = registry.results();
    if results.is_empty() {
        ui::info("Nothing was collected from any active node");
        return;
    }

    ui::header("Outputs");
    for (id, results) in results {
        let outputs = results.commands.len() + results.scripts.len();
        ui::kv(&format!("node-{id}"), &ui::count(outputs, "output"));
        if !detailed {
            continue;
        }
        for path in results.commands.values().chain(results.scripts.values()) {
            ui::dim(&ui::truncate_path(&path.display().to_string(), PATH_WIDTH));
        }
        if let Some(dir) = &results.files {
            ui::dim(&format!("files: {}", dir.display()));
        }
        if let Some(dir) = &results.logs {
            ui::dim(&format!("logs: {}", dir.display()));
        }
    }
}
