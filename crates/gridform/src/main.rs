mod commands;
mod executor;
mod manifest;
mod planner;
mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gridform")]
#[command(about = "Declarative computes, disks and networks on the grid platform", long_about = None)]
struct Cli {
    /// Manifest file; the state directory sits next to it
    #[arg(short = 'f', long, global = true, default_value = manifest::DEFAULT_MANIFEST)]
    manifest: PathBuf,

    /// Provider config file (default: GRIDFORM_CONFIG_PATH, ./gridform.yaml, ~/.config/gridform/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the changes apply would make
    Plan,
    /// Create, update or delete resources to match the manifest
    Apply {
        /// Apply without stopping at the plan
        #[arg(short, long)]
        yes: bool,
    },
    /// Re-read every resource in the state from the Platform
    Refresh,
    /// Delete every resource in the state
    Destroy {
        /// Destroy without stopping at the plan
        #[arg(short, long)]
        yes: bool,
    },
    /// Print the saved state
    Show {
        /// Only this resource (kind.key)
        address: Option<String>,
    },
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let manifest = cli.manifest.as_path();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Plan => commands::plan::handle(manifest).await?,
        Commands::Apply { yes } => commands::apply::handle(manifest, config, yes).await?,
        Commands::Refresh => commands::refresh::handle(manifest, config).await?,
        Commands::Destroy { yes } => commands::destroy::handle(manifest, config, yes).await?,
        Commands::Show { address } => commands::show::handle(manifest, address.as_deref()).await?,
        Commands::Version => println!("gridform {}", env!("CARGO_PKG_VERSION")),
    }

    Ok(())
}
