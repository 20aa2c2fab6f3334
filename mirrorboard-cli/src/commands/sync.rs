//! `mirrorboard sync`: run one reconciliation pass in this process.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use mirrorboard_core::{config, MemoryBoard, NodeStore};
use mirrorboard_sync::{FileBoard, HttpDirectory, PassOutcome, PassReport, Reconciler, TriggerSource};

/// Arguments for `mirrorboard sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Reconcile an in-memory copy of the board and write nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the pass outcome as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        crate::init_cli_tracing();
        let home = dirs::home_dir().context("could not determine home directory")?;
        let config = config::load_at(&home).context("failed to load config")?;
        let file_board = FileBoard::open_at(&home).context("failed to open board")?;

        let store: Arc<dyn NodeStore> = if self.dry_run {
            let doc = file_board.load().context("failed to read board")?;
            let copy = MemoryBoard::with_nodes(doc.nodes);
            if !doc.selection.is_empty() {
                copy.set_selection(doc.selection);
            }
            Arc::new(copy)
        } else {
            Arc::new(file_board)
        };
        let directory = Arc::new(HttpDirectory::new(config.fetch_timeout()));
        let mut reconciler = Reconciler::from_config(store, directory, &config);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        let outcome = runtime
            .block_on(reconciler.run_pass(TriggerSource::Request))
            .context("reconciliation pass failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&outcome).context("failed to render pass JSON")?
            );
        } else {
            print_outcome(&outcome, self.dry_run);
        }
        Ok(())
    }
}

fn print_outcome(outcome: &PassOutcome, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    match outcome {
        PassOutcome::Skipped { reason, .. } => {
            println!("{prefix}{} pass skipped: {reason}", "⏸".yellow());
        }
        PassOutcome::Completed(report) => print_report(prefix, report),
    }
}

fn print_report(prefix: &str, report: &PassReport) {
    if report.mutations() == 0 && report.fetch_failures.is_empty() {
        println!(
            "{prefix}✓ {} tracked parent(s) — nothing to do",
            report.tracked
        );
        return;
    }

    println!(
        "{prefix}✓ {} tracked parent(s): {} created, {} updated, {} deleted, {} relabelled, {} swept",
        report.tracked,
        report.children_created,
        report.children_updated,
        report.children_deleted,
        report.labels_updated,
        report.sanitized,
    );
    for identity in &report.parents_started {
        println!("  {}  {identity}", "+".green());
    }
    for identity in &report.parents_stopped {
        println!("  {}  {identity}", "-".red());
    }
    for (from, to) in &report.parents_renamed {
        println!("  {}  {from} → {to}", "~".cyan());
    }
    for identity in &report.fetch_failures {
        println!("  {}  {identity} (fetch failed)", "✗".red());
    }
}
