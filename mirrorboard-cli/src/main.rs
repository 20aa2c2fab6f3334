//! Mirrorboard: keep a board of tracked parents in step with remote
//! instance directories.
//!
//! # Usage
//!
//! ```text
//! mirrorboard init
//! mirrorboard parent add <label> [--x <x>] [--y <y>]
//! mirrorboard parent remove <id>
//! mirrorboard select <id>... | --clear
//! mirrorboard sync [--dry-run] [--json]
//! mirrorboard status [--json]
//! mirrorboard daemon start|stop|status|sync
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    daemon::DaemonCommand, init::InitArgs, parent::ParentCommand, select::SelectArgs,
    status::StatusArgs, sync::SyncArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "mirrorboard",
    version,
    about = "Mirror remote instance directories as child nodes on a local board",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create ~/.mirrorboard with a default config and an empty board.
    Init(InitArgs),

    /// Add or remove tracked parents on the board.
    Parent {
        #[command(subcommand)]
        command: ParentCommand,
    },

    /// Mark nodes as selected; passes are skipped while a selection exists.
    Select(SelectArgs),

    /// Run one reconciliation pass in this process.
    Sync(SyncArgs),

    /// Show tracked parents and their children.
    Status(StatusArgs),

    /// Run or talk to the background reconciliation daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Parent { command } => commands::parent::run(command),
        Commands::Select(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}

/// Log to stderr so command output on stdout stays parseable.
/// `RUST_LOG` overrides the default `warn` level.
pub(crate) fn init_cli_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
