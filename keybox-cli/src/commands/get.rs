//! Print the value stored under a key.

use anyhow::{Context, Result};
use clap::Args;
use keybox_core::{OpenOutcome, SessionManager};

use crate::config::KeyboxConfig;
use crate::session;

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Root holding the key
    pub root: String,

    /// Full key, e.g. /config/service/port
    pub key: String,
}

pub async fn run(args: GetArgs, config: &KeyboxConfig) -> Result<()> {
    let manager = session::open_manager(config).await?;
    let result = fetch(&manager, &args.root, &args.key).await;
    manager.shutdown().await;

    let value = result?;
    println!("{}", String::from_utf8_lossy(&value));
    Ok(())
}

/// Open the root, then open the key's node
///
/// Keys that do not map onto a tree node are fetched directly.
async fn fetch(manager: &SessionManager, root: &str, key: &str) -> Result<Vec<u8>> {
    let root_node = manager
        .tree()
        .read()
        .await
        .connection_root(root)
        .with_context(|| format!("Unknown root: {}", root))?;
    manager.open(root_node).await?;

    let node = {
        let tree = manager.tree();
        let tree = tree.read().await;
        tree.find_path(root_node, key)
            .filter(|node| tree.get(*node).and_then(|n| n.full_key()) == Some(key))
    };

    match node {
        Some(node) => match manager.open(node).await? {
            OpenOutcome::Value { value, .. } => Ok(value),
            other => anyhow::bail!("Unexpected result opening {}: {:?}", key, other),
        },
        None => Ok(manager.get_value(root, key).await?),
    }
}
