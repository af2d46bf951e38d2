use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fleetdiag")]
#[command(version)]
#[command(about = "Collect diagnostics from every node of a managed cluster", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "FLEETDIAG_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the node table
    List(FleetArgs),

    /// Run the resolved commands and scripts on every active node
    Run(RunArgs),

    /// Print the resolved attributes and actions of one node
    Show {
        /// Node id (0 is the master)
        node_id: u32,

        #[command(flatten)]
        fleet: FleetArgs,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Options shared by every command that builds the fleet registry
#[derive(Args, Debug, Clone, Default)]
pub struct FleetArgs {
    /// Read the node list from a JSON file instead of the API or CLI
    #[arg(long, value_name = "FILE")]
    pub nodes_json: Option<PathBuf>,

    /// Address of the management controller
    #[arg(long, value_name = "IP")]
    pub master_ip: Option<String>,

    /// Import an attribute-first rule file
    #[arg(long, value_name = "FILE")]
    pub rqfile: Option<PathBuf>,

    /// Directory holding scripts/ and filelists/
    #[arg(long, value_name = "DIR")]
    pub rqdir: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    pub outdir: Option<PathBuf>,

    /// Only talk to the nodes: no rules, no release probing, no master
    #[arg(long)]
    pub shell_mode: bool,

    /// Do not query the management API
    #[arg(long)]
    pub no_api: bool,

    /// Token for the management API
    #[arg(long, env = "FLEETDIAG_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub fleet: FleetArgs,

    /// Compute output paths without contacting any node
    #[arg(long)]
    pub fake: bool,

    /// Maximum number of nodes worked on at once
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Exit code that is not reported as a failure (repeatable)
    #[arg(long = "ok-code", value_name = "CODE", allow_negative_numbers = true)]
    pub ok_codes: Vec<i32>,

    /// Also collect the resolved files
    #[arg(long)]
    pub files: bool,

    /// Also collect the resolved logs
    #[arg(long)]
    pub logs: bool,

    /// Also copy the resolved put pairs onto the nodes
    #[arg(long)]
    pub put: bool,

    /// Pack the output directory into a tar.gz bundle
    #[arg(long)]
    pub archive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::try_parse_from([
            "fleetdiag", "-vv", "run", "--fake", "-j", "8", "--ok-code", "3", "--ok-code", "4",
            "--master-ip", "10.20.0.2", "--logs",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.fake);
        assert_eq!(args.jobs, Some(8));
        assert_eq!(args.ok_codes, vec![3, 4]);
        assert!(args.logs && !args.files);
        assert_eq!(args.fleet.master_ip.as_deref(), Some("10.20.0.2"));
    }

    #[test]
    fn test_show_args() {
        let cli = Cli::try_parse_from(["fleetdiag", "show", "7", "--no-api"]).unwrap();
        let Command::Show { node_id, fleet } = cli.command else {
            panic!("expected show");
        };
        assert_eq!(node_id, 7);
        assert!(fleet.no_api);
    }
}
