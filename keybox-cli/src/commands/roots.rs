//! Roots registry commands.
//!
//! Adds, removes and lists the named stores keybox can connect to.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use keybox_core::roots::DEFAULT_PORT;
use keybox_core::{Credentials, JsonRootStore, RootConfig};
use tracing::debug;

use crate::config::KeyboxConfig;
use crate::session;

/// Roots management arguments.
#[derive(Args, Debug)]
pub struct RootsArgs {
    #[command(subcommand)]
    pub command: RootsCommands,
}

/// Roots subcommands.
#[derive(Subcommand, Debug)]
pub enum RootsCommands {
    /// List configured roots
    List,
    /// Add a root
    Add(AddArgs),
    /// Remove a root
    Remove {
        /// Name of the root
        name: String,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Unique name for the root
    pub name: String,

    /// Store host
    #[arg(long)]
    pub host: String,

    /// Store client port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// User to authenticate as
    #[arg(long, short)]
    pub username: Option<String>,

    /// Password for the user
    #[arg(long, env = "KEYBOX_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

/// Run roots command.
pub async fn run(args: RootsArgs, config: &KeyboxConfig) -> Result<()> {
    match args.command {
        RootsCommands::List => list_roots(config).await,
        RootsCommands::Add(add) => add_root(add, config).await,
        RootsCommands::Remove { name } => remove_root(&name, config).await,
    }
}

async fn list_roots(config: &KeyboxConfig) -> Result<()> {
    let registry = session::load_registry(config).await?;
    let roots = registry.list().await;

    if roots.is_empty() {
        println!("No roots configured.");
        println!();
        println!("Add one with: keybox roots add <name> --host <host>");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("Endpoint").fg(Color::Cyan),
        Cell::new("User").fg(Color::Cyan),
    ]);

    for root in roots {
        let user = if root.credentials.is_anonymous() {
            "-".to_string()
        } else {
            root.credentials.username.clone()
        };
        table.add_row(vec![
            Cell::new(&root.name),
            Cell::new(&root.endpoint),
            Cell::new(user),
        ]);
    }

    println!("{table}");
    Ok(())
}

async fn add_root(args: AddArgs, config: &KeyboxConfig) -> Result<()> {
    // The first root creates the registry file
    JsonRootStore::new(&config.roots.file)
        .ensure_exists()
        .await
        .with_context(|| format!("Failed to create {}", config.roots.file.display()))?;

    let credentials = Credentials::new(
        args.username.unwrap_or_default(),
        args.password.unwrap_or_default(),
    );
    let root = RootConfig::new(&args.name, &args.host, args.port, credentials);
    debug!(root = %root.name, endpoint = %root.endpoint, "Adding root");

    let manager = session::open_manager(config).await?;
    manager.add_root(root).await?;

    println!("Added root '{}'", args.name);
    Ok(())
}

async fn remove_root(name: &str, config: &KeyboxConfig) -> Result<()> {
    let manager = session::open_manager(config).await?;
    manager.remove_root(name).await?;
    println!("Removed root '{}'", name);
    Ok(())
}
