//! `mirrorboard status`: tracked parents, their children and fetch state.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use mirrorboard_core::{
    board::{self, Board},
    config, IdentityStrategy, LabelIdentity, NodeId, ParentStatus,
};
use mirrorboard_daemon::{send_request, DaemonCommand, DaemonRequest};
use mirrorboard_sync::{children::index_children, sanitize};

/// Arguments for `mirrorboard status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let doc = board::load_at(&home).context("failed to load board — run `mirrorboard init` first")?;
        let config = config::load_at(&home).context("failed to load config")?;
        let identity = LabelIdentity::new(config.decoration);

        let report = build_report(&doc, &identity, daemon_statuses(&home));
        if self.json {
            print_json(&home, report)?;
            return Ok(());
        }

        print_table(report);
        Ok(())
    }
}

/// Fetch state shown for a parent node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum ParentState {
    Ok,
    Error,
    Pending,
    /// No daemon to ask and nothing on the label to go by.
    Unknown,
    /// Will be swept by the next pass (duplicate identity).
    Duplicate,
    /// Blank label; not tracked.
    Untracked,
}

impl From<ParentStatus> for ParentState {
    fn from(status: ParentStatus) -> Self {
        match status {
            ParentStatus::Ok => ParentState::Ok,
            ParentStatus::Error => ParentState::Error,
            ParentStatus::Pending => ParentState::Pending,
        }
    }
}

#[derive(Debug, Clone)]
struct ParentRow {
    node_id: NodeId,
    identity: Option<String>,
    label: String,
    state: ParentState,
    children: usize,
}

#[derive(Debug, Clone)]
struct StatusReport {
    daemon_running: bool,
    selection: Vec<String>,
    parents: Vec<ParentRow>,
    to_sweep: usize,
}

#[derive(Serialize)]
struct StatusReportJson {
    board: String,
    daemon_running: bool,
    selection: Vec<String>,
    to_sweep: usize,
    parents: Vec<ParentRowJson>,
}

#[derive(Serialize)]
struct ParentRowJson {
    node_id: String,
    identity: Option<String>,
    label: String,
    status: ParentState,
    children: usize,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "node")]
    node: String,
    #[tabled(rename = "identity")]
    identity: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "children")]
    children: usize,
}

/// Statuses from a running daemon, keyed by identity. `None` when no daemon
/// answers.
fn daemon_statuses(home: &Path) -> Option<BTreeMap<String, ParentStatus>> {
    let response = send_request(home, &DaemonRequest::new(DaemonCommand::Status)).ok()?;
    let tracked = response.data?.get("tracked")?.as_array()?.clone();
    let statuses = tracked
        .into_iter()
        .filter_map(|entry| {
            let identity = entry.get("identity")?.as_str()?.to_string();
            let status = serde_json::from_value(entry.get("status")?.clone()).ok()?;
            Some((identity, status))
        })
        .collect();
    Some(statuses)
}

fn build_report(
    doc: &Board,
    identity: &dyn IdentityStrategy,
    daemon: Option<BTreeMap<String, ParentStatus>>,
) -> StatusReport {
    let plan = sanitize::plan(&doc.nodes, identity);
    let children = index_children(&doc.nodes);

    let mut parents: Vec<ParentRow> = doc
        .nodes
        .iter()
        .filter(|n| n.is_parent())
        .map(|node| {
            let parsed = identity.parse(&node.label);
            let state = match &parsed {
                None => ParentState::Untracked,
                Some(_) if plan.doomed.contains(&node.id) => ParentState::Duplicate,
                Some(id) => match &daemon {
                    Some(statuses) => statuses
                        .get(&id.0)
                        .copied()
                        .map_or(ParentState::Pending, ParentState::from),
                    None if node.label == identity.label_for(id, ParentStatus::Error) => {
                        ParentState::Error
                    }
                    None => ParentState::Unknown,
                },
            };
            ParentRow {
                node_id: node.id.clone(),
                identity: parsed.map(|i| i.0),
                label: node.label.clone(),
                state,
                children: children.get(&node.id).map_or(0, |c| c.len()),
            }
        })
        .collect();
    parents.sort_by(|a, b| a.node_id.cmp(&b.node_id));

    StatusReport {
        daemon_running: daemon.is_some(),
        selection: doc.selection.iter().map(|id| id.0.clone()).collect(),
        parents,
        to_sweep: plan.doomed.len(),
    }
}

fn print_json(home: &Path, report: StatusReport) -> Result<()> {
    let payload = StatusReportJson {
        board: board::board_path_at(home).display().to_string(),
        daemon_running: report.daemon_running,
        selection: report.selection,
        to_sweep: report.to_sweep,
        parents: report
            .parents
            .into_iter()
            .map(|row| ParentRowJson {
                node_id: row.node_id.0,
                identity: row.identity,
                label: row.label,
                status: row.state,
                children: row.children,
            })
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(report: StatusReport) {
    let daemon = if report.daemon_running {
        "daemon running".green().to_string()
    } else {
        "daemon stopped".bright_black().to_string()
    };
    println!(
        "Mirrorboard v{} | {} parents | {}",
        env!("CARGO_PKG_VERSION"),
        report.parents.len(),
        daemon,
    );

    if report.parents.is_empty() {
        println!("No parents on the board.");
        println!("Run: mirrorboard parent add <url>");
        return;
    }

    let table_rows: Vec<StatusTableRow> = report
        .parents
        .into_iter()
        .map(|row| StatusTableRow {
            node: row.node_id.0,
            identity: row.identity.unwrap_or_else(|| "-".to_string()),
            status: format!("{} {}", state_indicator(row.state), state_label(row.state)),
            children: row.children,
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");

    if !report.selection.is_empty() {
        println!(
            "{} selection active ({}); passes are paused. Run 'mirrorboard select --clear'.",
            "⏸".yellow(),
            report.selection.join(", ")
        );
    }
    if report.to_sweep > 0 {
        println!("{} node(s) will be swept by the next pass.", report.to_sweep);
    }
}

fn state_label(state: ParentState) -> &'static str {
    match state {
        ParentState::Ok => "OK",
        ParentState::Error => "ERROR",
        ParentState::Pending => "PENDING",
        ParentState::Unknown => "UNKNOWN",
        ParentState::Duplicate => "DUPLICATE",
        ParentState::Untracked => "UNTRACKED",
    }
}

fn state_indicator(state: ParentState) -> String {
    match state {
        ParentState::Ok => "■".green().bold().to_string(),
        ParentState::Error => "■".red().bold().to_string(),
        ParentState::Pending => "■".yellow().bold().to_string(),
        ParentState::Unknown | ParentState::Untracked => "■".bright_black().bold().to_string(),
        ParentState::Duplicate => "■".magenta().bold().to_string(),
    }
}
