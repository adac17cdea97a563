//! Connect roots and print their key hierarchy.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;
use keybox_core::SessionManager;
use tracing::{info, warn};

use crate::config::KeyboxConfig;
use crate::render::render_tree;
use crate::session;

#[derive(Args, Debug)]
pub struct BrowseArgs {
    /// Roots to connect (all roots when omitted)
    pub roots: Vec<String>,

    /// Only show keys under this prefix
    #[arg(long, short)]
    pub prefix: Option<String>,
}

pub async fn run(args: BrowseArgs, config: &KeyboxConfig) -> Result<()> {
    let manager = session::open_manager(config).await?;
    let targets = select_roots(&manager, args.roots).await?;

    let connected = connect_all(&manager, &targets).await?;

    if let Some(prefix) = &args.prefix {
        for root in &connected {
            if let Err(e) = manager.search(root, prefix).await {
                eprintln!("{}: search failed: {}", root, e);
            }
        }
    }

    {
        let tree = manager.tree();
        let tree = tree.read().await;
        if targets.len() == manager.registry().len().await {
            print!("{}", render_tree(&tree, tree.root()));
        } else {
            for root in &targets {
                if let Some(node) = tree.connection_root(root) {
                    print!("{}", render_tree(&tree, node));
                }
            }
        }
    }

    manager.shutdown().await;
    Ok(())
}

/// Requested roots, checked against the registry
async fn select_roots(manager: &SessionManager, requested: Vec<String>) -> Result<Vec<String>> {
    if requested.is_empty() {
        return Ok(manager.registry().names().await);
    }
    for root in &requested {
        if !manager.registry().contains(root).await {
            bail!("Unknown root: {}", root);
        }
    }
    Ok(requested)
}

/// Connect every target concurrently, returning the roots that connected
///
/// Ctrl-C cancels the attempts still in flight.
async fn connect_all(
    manager: &Arc<SessionManager>,
    targets: &[String],
) -> Result<Vec<String>> {
    let mut completions = manager
        .take_completions()
        .context("Completion channel already in use")?;

    let mut pending = HashMap::new();
    for root in targets {
        pending.insert(manager.spawn_connect(root), root.clone());
    }

    let mut connected = Vec::new();
    while !pending.is_empty() {
        tokio::select! {
            done = completions.recv() => {
                let Some(done) = done else { break };
                if pending.remove(&done.id).is_none() {
                    continue;
                }
                match done.result {
                    Ok(keys) => {
                        info!(root = %done.root, keys, "Connected");
                        connected.push(done.root);
                    }
                    Err(e) => eprintln!("{}: {}", done.root, e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling pending connects");
                for root in pending.values() {
                    manager.cancel_connect(root);
                }
            }
        }
    }

    connected.sort();
    Ok(connected)
}
