//! One reconciliation pass: sanitize → parent diff → fetch → project →
//! child diff/apply.
//!
//! This is the single entrypoint used by both `mirrorboard sync` and the
//! daemon's pass worker.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use mirrorboard_core::{
    ChildLayout, EngineConfig, IdentityStrategy, LabelIdentity, NodeId, NodePatch, NodeStore,
    RemoteDirectory, StoreError,
};

use crate::registry::{ParentRegistry, ParentSummary};
use crate::{children, fetch, sanitize, status, SyncError};

/// What asked for a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerSource {
    Startup,
    Tick,
    ExternalChange,
    Request,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSource::Startup => write!(f, "startup"),
            TriggerSource::Tick => write!(f, "tick"),
            TriggerSource::ExternalChange => write!(f, "external-change"),
            TriggerSource::Request => write!(f, "request"),
        }
    }
}

/// Counters for one completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub trigger: Option<TriggerSource>,
    pub sanitized: usize,
    pub parents_started: Vec<String>,
    pub parents_stopped: Vec<String>,
    pub parents_renamed: Vec<(String, String)>,
    pub fetch_failures: Vec<String>,
    pub labels_updated: usize,
    pub children_created: usize,
    pub children_updated: usize,
    pub children_deleted: usize,
    pub tracked: usize,
    pub duration_ms: u128,
}

impl PassReport {
    /// Number of node creations, updates, and deletions the pass issued.
    pub fn mutations(&self) -> usize {
        self.sanitized
            + self.labels_updated
            + self.children_created
            + self.children_updated
            + self.children_deleted
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum PassOutcome {
    Completed(PassReport),
    Skipped {
        trigger: TriggerSource,
        reason: String,
    },
}

impl PassOutcome {
    pub fn report(&self) -> Option<&PassReport> {
        match self {
            PassOutcome::Completed(report) => Some(report),
            PassOutcome::Skipped { .. } => None,
        }
    }
}

/// Tunables for a [`Reconciler`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOptions {
    pub fetch_timeout: Duration,
    pub child_layout: ChildLayout,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for ReconcileOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            fetch_timeout: config.fetch_timeout(),
            child_layout: config.child_layout,
        }
    }
}

/// Apply label patches for parents still on the board. Returns how many
/// were written.
fn write_labels(store: &dyn NodeStore, patches: Vec<NodePatch>) -> Result<usize, SyncError> {
    if patches.is_empty() {
        return Ok(0);
    }
    let live: BTreeSet<NodeId> = store.list_nodes()?.into_iter().map(|n| n.id).collect();
    let (patches, vanished): (Vec<_>, Vec<_>) =
        patches.into_iter().partition(|p| live.contains(&p.id));
    for patch in &vanished {
        tracing::debug!(node = %patch.id, "parent removed mid-pass, dropping label update");
    }
    if patches.is_empty() {
        return Ok(0);
    }
    match store.update_nodes(&patches) {
        Ok(()) => Ok(patches.len()),
        Err(StoreError::NodeNotFound(id)) => {
            tracing::warn!(node = %id, "parent removed mid-pass, label updates skipped");
            Ok(0)
        }
        Err(err) => Err(err.into()),
    }
}

/// Owns the Parent Registry and runs passes against the collaborators.
pub struct Reconciler {
    store: Arc<dyn NodeStore>,
    directory: Arc<dyn RemoteDirectory>,
    identity: Arc<dyn IdentityStrategy>,
    options: ReconcileOptions,
    registry: ParentRegistry,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn NodeStore>,
        directory: Arc<dyn RemoteDirectory>,
        identity: Arc<dyn IdentityStrategy>,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            store,
            directory,
            identity,
            options,
            registry: ParentRegistry::new(),
        }
    }

    /// Reconciler using [`LabelIdentity`] with the configured decoration.
    pub fn from_config(
        store: Arc<dyn NodeStore>,
        directory: Arc<dyn RemoteDirectory>,
        config: &EngineConfig,
    ) -> Self {
        Self::new(
            store,
            directory,
            Arc::new(LabelIdentity::new(config.decoration.clone())),
            ReconcileOptions::from(config),
        )
    }

    pub fn registry(&self) -> &ParentRegistry {
        &self.registry
    }

    pub fn tracked(&self) -> Vec<ParentSummary> {
        self.registry.summaries()
    }

    /// Run one pass.
    ///
    /// Skipped outright while the user is interacting with the board. Remote
    /// failures are absorbed into parent status; only store failures abort.
    pub async fn run_pass(&mut self, trigger: TriggerSource) -> Result<PassOutcome, SyncError> {
        if self.store.is_interacting()? {
            tracing::debug!(%trigger, "user is interacting, skipping pass");
            return Ok(PassOutcome::Skipped {
                trigger,
                reason: "interactive selection in progress".to_string(),
            });
        }

        let started = Instant::now();
        let store = self.store.as_ref();
        let identity = self.identity.as_ref();
        let mut report = PassReport {
            trigger: Some(trigger),
            ..PassReport::default()
        };

        // Sanitize.
        let plan = sanitize::sanitize(store, identity)?;
        report.sanitized = plan.doomed.len();

        // Parents.
        let nodes = store.list_nodes()?;
        let parents = self.registry.reconcile(&plan.parents, &nodes);
        if !parents.is_stable() {
            tracing::info!(delta = %parents.summary, "Δ parents");
        }
        if !parents.doomed_children.is_empty() {
            tracing::info!(
                count = parents.doomed_children.len(),
                "cleaning up children of stopped parents"
            );
            store.delete_nodes(&parents.doomed_children)?;
            report.children_deleted += parents.doomed_children.len();
        }
        report.parents_started = parents.started.iter().map(|i| i.0.clone()).collect();
        report.parents_stopped = parents.stopped.iter().map(|i| i.0.clone()).collect();
        report.parents_renamed = parents
            .renamed
            .iter()
            .map(|(from, to)| (from.0.clone(), to.0.clone()))
            .collect();

        // Fetch.
        let (fetched, failed) = fetch::fetch_all(
            self.directory.as_ref(),
            &mut self.registry,
            self.options.fetch_timeout,
        )
        .await;
        report.fetch_failures = failed.iter().map(|i| i.0.clone()).collect();

        // Project status. The host may have removed parents while we were
        // fetching; their patches are dropped and the next pass stops them.
        let patches = status::project(&mut self.registry, identity);
        report.labels_updated = write_labels(store, patches)?;

        // Children.
        let stats = children::reconcile(
            store,
            &mut self.registry,
            &fetched,
            &self.options.child_layout,
        )?;
        report.children_created += stats.created;
        report.children_updated += stats.updated;
        report.children_deleted += stats.deleted;

        report.tracked = self.registry.len();
        report.duration_ms = started.elapsed().as_millis();
        if report.mutations() == 0 && report.fetch_failures.is_empty() {
            tracing::debug!(%trigger, tracked = report.tracked, "pass made no changes");
        } else {
            tracing::info!(
                %trigger,
                tracked = report.tracked,
                mutations = report.mutations(),
                failures = report.fetch_failures.len(),
                duration_ms = report.duration_ms,
                "pass completed"
            );
        }
        Ok(PassOutcome::Completed(report))
    }
}
