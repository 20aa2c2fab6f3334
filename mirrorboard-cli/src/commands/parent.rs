//! `mirrorboard parent add <label>` and `mirrorboard parent remove <id>`

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use mirrorboard_core::{config, IdentityStrategy, LabelIdentity, Node, NodeId, Placement, StoreError};
use mirrorboard_sync::FileBoard;

#[derive(Subcommand, Debug)]
pub enum ParentCommand {
    /// Add a tracked parent whose label names a remote directory.
    Add(AddArgs),

    /// Remove a node. Its children are swept by the next pass.
    Remove(RemoveArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Parent label, usually the directory URL (e.g. "https://hosts.example/db").
    pub label: String,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub x: f64,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub y: f64,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Node id as shown by `mirrorboard status`.
    pub id: String,
}

pub fn run(cmd: ParentCommand) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let store = FileBoard::open_at(&home).context("failed to open board")?;
    match cmd {
        ParentCommand::Add(args) => {
            let config = config::load_at(&home).context("failed to load config")?;
            add(&store, &LabelIdentity::new(config.decoration), args)
        }
        ParentCommand::Remove(args) => remove(&store, args),
    }
}

fn add(store: &FileBoard, strategy: &dyn IdentityStrategy, args: AddArgs) -> Result<()> {
    let Some(identity) = strategy.parse(&args.label) else {
        bail!("label '{}' does not name anything", args.label);
    };

    let id = store
        .edit("parent added", |doc| {
            let id = doc.next_node_id();
            let mut node = Node::parent(id.clone(), args.label.clone());
            node.placement = Placement {
                x: args.x,
                y: args.y,
                ..node.placement
            };
            doc.nodes.push(node);
            Ok(id)
        })
        .context("failed to add parent")?;

    println!("✓ Added parent {id} tracking '{identity}'");
    Ok(())
}

fn remove(store: &FileBoard, args: RemoveArgs) -> Result<()> {
    let id = NodeId::from(args.id);
    store
        .edit("node removed", |doc| {
            let before = doc.nodes.len();
            doc.nodes.retain(|n| n.id != id);
            if doc.nodes.len() == before {
                return Err(StoreError::NodeNotFound(id.clone()));
            }
            doc.selection.retain(|s| s != &id);
            Ok(())
        })
        .with_context(|| format!("failed to remove node '{id}'"))?;

    println!("✓ Removed node {id}");
    Ok(())
}
