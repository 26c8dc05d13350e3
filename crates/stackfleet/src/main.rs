mod commands;
mod project;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stackfleet")]
#[command(about = "Provision multi-stack hybrid fleets from declarative stack files", long_about = None)]
struct Cli {
    /// Stack file to use instead of project discovery
    #[arg(short, long, global = true, env = "STACKFLEET_CONFIG_PATH")]
    file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the stack definitions and check the dependency graph
    Validate,
    /// Show the provisioning order and dependency edges
    Plan,
    /// Provision every stack
    Apply {
        /// Stacks materialized in parallel (overrides settings)
        #[arg(short = 'c', long)]
        concurrency: Option<usize>,
        /// Print the execution report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List registered nodes
    Nodes,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // logs go to stderr so `apply --json` output stays parseable
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if matches!(cli.command, Commands::Version) {
        println!("stackfleet {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let project = project::load(cli.file.as_deref())?;

    match cli.command {
        Commands::Validate => commands::validate::handle(&project),
        Commands::Plan => commands::plan::handle(&project).await,
        Commands::Apply { concurrency, json } => {
            let code = commands::apply::handle(&project, concurrency, json).await?;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
        Commands::Nodes => commands::nodes::handle(&project),
        Commands::Version => Ok(()),
    }
}
