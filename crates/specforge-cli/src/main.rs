mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, discovery::DiscoverySubcommand, prd::PrdSubcommand, GenerationArgs,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "specforge",
    about = "Discovery intake and per-feature PRD lifecycle",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .specforge/ or .git/)
    #[arg(long, global = true, env = "SPECFORGE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(flatten)]
    generation: GenerationArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize specforge in the current project
    Init {
        /// Project name (default: directory name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Run the REST server
    Serve {
        /// Port to listen on (default: server.port from config)
        #[arg(long, env = "PORT")]
        port: Option<u16>,

        /// Keep everything in memory instead of the redb store
        #[arg(long)]
        memory: bool,
    },

    /// Show or validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Drive a project's discovery intake
    Discovery {
        #[command(subcommand)]
        subcommand: DiscoverySubcommand,
    },

    /// Manage PRDs
    Prd {
        #[command(subcommand)]
        subcommand: PrdSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { name } => cmd::init::run(&root, name.as_deref()),
        Commands::Serve { port, memory } => cmd::serve::run(&root, port, memory, &cli.generation),
        Commands::Config { subcommand } => {
            cmd::config::run(&root, subcommand, &cli.generation, cli.json)
        }
        Commands::Discovery { subcommand } => {
            cmd::discovery::run(&root, subcommand, &cli.generation, cli.json)
        }
        Commands::Prd { subcommand } => cmd::prd::run(&root, subcommand, &cli.generation, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
