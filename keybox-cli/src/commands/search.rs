//! Filter one root's tree by key prefix.

use anyhow::Result;
use clap::Args;

use crate::config::KeyboxConfig;
use crate::render::render_tree;
use crate::session;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Root to search
    pub root: String,

    /// Key prefix; empty lists the whole namespace
    #[arg(default_value = "")]
    pub prefix: String,
}

pub async fn run(args: SearchArgs, config: &KeyboxConfig) -> Result<()> {
    let manager = session::open_manager(config).await?;

    manager.connect(&args.root).await?;
    let result = manager.search(&args.root, &args.prefix).await;

    if let Ok(keys) = &result {
        let tree = manager.tree();
        let tree = tree.read().await;
        if let Some(node) = tree.connection_root(&args.root) {
            print!("{}", render_tree(&tree, node));
        }
        println!("{} keys", keys);
    }

    manager.shutdown().await;
    result?;
    Ok(())
}
