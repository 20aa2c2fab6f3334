//! `mirrorboard select <id>... | --clear`

use anyhow::{bail, Context, Result};
use clap::Args;

use mirrorboard_core::{NodeId, StoreError};
use mirrorboard_sync::FileBoard;

/// Replace the board selection. Reconciliation passes are skipped while any
/// node is selected.
#[derive(Args, Debug)]
pub struct SelectArgs {
    /// Node ids to select.
    #[arg(required_unless_present = "clear", conflicts_with = "clear")]
    pub ids: Vec<String>,

    /// Clear the selection so passes resume.
    #[arg(long)]
    pub clear: bool,
}

impl SelectArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let store = FileBoard::open_at(&home).context("failed to open board")?;
        if !self.clear && self.ids.is_empty() {
            bail!("provide node ids or --clear");
        }

        let ids: Vec<NodeId> = self.ids.into_iter().map(NodeId::from).collect();
        let selected = store
            .edit("selection changed", |doc| {
                if let Some(missing) = ids.iter().find(|id| doc.node(id).is_none()) {
                    return Err(StoreError::NodeNotFound(missing.clone()));
                }
                doc.selection = ids.clone();
                Ok(doc.selection.len())
            })
            .context("failed to update selection")?;

        if selected == 0 {
            println!("✓ Selection cleared");
        } else {
            println!("✓ Selected {selected} node(s); passes paused until `mirrorboard select --clear`");
        }
        Ok(())
    }
}
