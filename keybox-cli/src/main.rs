use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod render;
mod session;

use config::ConfigLoader;

#[derive(Parser)]
#[command(name = "keybox", about = "Browse etcd key spaces as a tree")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect roots and print their key hierarchy
    Browse(commands::browse::BrowseArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Print the value stored under a key
    Get(commands::get::GetArgs),
    /// Manage configured roots
    Roots(commands::roots::RootsArgs),
    /// Show only the keys under a prefix
    Search(commands::search::SearchArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = ConfigLoader::load()?;

    match cli.command {
        Commands::Browse(args) => commands::browse::run(args, &config).await,
        Commands::Config(args) => commands::config::run(args, &config),
        Commands::Get(args) => commands::get::run(args, &config).await,
        Commands::Roots(args) => commands::roots::run(args, &config).await,
        Commands::Search(args) => commands::search::run(args, &config).await,
    }
}
