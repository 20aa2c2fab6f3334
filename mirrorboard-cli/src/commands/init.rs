//! `mirrorboard init [--force]`

use anyhow::{Context, Result};
use clap::Args;

use mirrorboard_core::{
    board::{self, Board},
    config::{self, EngineConfig},
};

/// Create the board directory, a default config and an empty board.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config.yaml with defaults. The board is never
    /// overwritten.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;

        let config_path = config::config_path_at(&home);
        if config_path.exists() && !self.force {
            println!("· Config already present: {}", config_path.display());
        } else {
            let path = config::save_at(&home, &EngineConfig::default())
                .context("failed to write default config")?;
            println!("✓ Wrote config: {}", path.display());
        }

        let board_path = board::board_path_at(&home);
        if board_path.exists() {
            let existing = board::load_at(&home).context("existing board is unreadable")?;
            println!(
                "· Board already present: {} ({} nodes)",
                board_path.display(),
                existing.nodes.len()
            );
        } else {
            board::save_at(&home, &Board::default()).context("failed to create board")?;
            println!("✓ Created board: {}", board_path.display());
        }

        println!("  Next: mirrorboard parent add <url>");
        Ok(())
    }
}
