//! Child Reconciler: mirror each successfully fetched instance list as child
//! nodes under its parent.
//!
//! Children are fully server-driven. Manual edits to a child's label are
//! overwritten on the next successful fetch.

use std::collections::{BTreeMap, BTreeSet};

use mirrorboard_core::{
    ChildFields, ChildLayout, InstanceId, InstanceRecord, Node, NodeId, NodePatch,
    NodeStore, Placement, StoreError,
};

use crate::diff::diff;
use crate::error::SyncError;
use crate::fetch::Fetched;
use crate::registry::{ParentRegistry, TrackedParent};

/// Mutations planned for one parent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChildPlan {
    pub delete: Vec<NodeId>,
    pub create: Vec<(InstanceId, ChildFields)>,
    pub update: Vec<NodePatch>,
}

impl ChildPlan {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.create.is_empty() && self.update.is_empty()
    }
}

/// Totals across every parent reconciled in a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChildStats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Index children by owning parent node, then by instance id.
pub fn index_children(nodes: &[Node]) -> BTreeMap<NodeId, BTreeMap<InstanceId, Node>> {
    let mut index: BTreeMap<NodeId, BTreeMap<InstanceId, Node>> = BTreeMap::new();
    for node in nodes.iter().filter(|n| n.is_child()) {
        if let (Some(parent), Some(instance)) = (&node.parent_id, &node.instance_id) {
            index
                .entry(parent.clone())
                .or_default()
                .insert(instance.clone(), node.clone());
        }
    }
    index
}

/// Diff the existing children of `parent` against freshly fetched instances.
///
/// Duplicate instance ids in `fetched` collapse to the last record.
pub fn plan(
    parent: &Node,
    existing: &BTreeMap<InstanceId, Node>,
    fetched: &[InstanceRecord],
    layout: &ChildLayout,
) -> ChildPlan {
    let next: BTreeMap<InstanceId, InstanceRecord> = fetched
        .iter()
        .map(|r| (r.instance_id.clone(), r.clone()))
        .collect();
    if next.len() != fetched.len() {
        tracing::debug!(
            parent = %parent.id,
            duplicates = fetched.len() - next.len(),
            "remote listed duplicate instance ids"
        );
    }

    let changes = diff(existing, &next);
    let kept = changes.same.len();

    ChildPlan {
        delete: changes.deleted.values().map(|n| n.id.clone()).collect(),
        create: changes
            .created
            .into_values()
            .enumerate()
            .map(|(i, record)| {
                let fields = ChildFields {
                    label: record.text,
                    placement: Placement::below(&parent.placement, kept + i, layout),
                };
                (record.instance_id, fields)
            })
            .collect(),
        update: changes
            .same
            .into_values()
            .filter(|(node, record)| node.label != record.text)
            .map(|(node, record)| NodePatch {
                id: node.id,
                label: record.text,
            })
            .collect(),
    }
}

/// Reconcile children for every parent with a successful fetch this pass.
///
/// Parents absent from `fetched` are skipped entirely; their children are
/// never touched on the strength of a failed or missing fetch. Parents that
/// left the board since the registry saw them are skipped as well, so a host
/// edit racing the pass only costs that parent its update.
pub fn reconcile(
    store: &dyn NodeStore,
    registry: &mut ParentRegistry,
    fetched: &Fetched,
    layout: &ChildLayout,
) -> Result<ChildStats, SyncError> {
    let nodes = store.list_nodes()?;
    let live: BTreeSet<&NodeId> = nodes.iter().map(|n| &n.id).collect();
    let mut index = index_children(&nodes);
    let mut stats = ChildStats::default();

    for parent in registry.iter_mut() {
        let existing = index.remove(&parent.node.id).unwrap_or_default();
        refresh_children(parent, &existing);

        let Some(instances) = fetched.get(&parent.identity) else {
            continue;
        };
        if !live.contains(&parent.node.id) {
            tracing::debug!(identity = %parent.identity, node = %parent.node.id, "parent removed mid-pass");
            continue;
        }
        let plan = plan(&parent.node, &existing, instances, layout);
        if plan.is_empty() {
            continue;
        }
        tracing::info!(
            identity = %parent.identity,
            created = plan.create.len(),
            deleted = plan.delete.len(),
            updated = plan.update.len(),
            "reconciling children"
        );
        match apply(store, parent, plan, &mut stats) {
            Ok(()) => {}
            Err(SyncError::Store(StoreError::NodeNotFound(id))) => {
                tracing::warn!(
                    identity = %parent.identity,
                    node = %id,
                    "node vanished while reconciling children, moving on"
                );
            }
            Err(err) => return Err(err),
        }
    }
    Ok(stats)
}

fn refresh_children(parent: &mut TrackedParent, existing: &BTreeMap<InstanceId, Node>) {
    parent.children = existing
        .iter()
        .map(|(instance, node)| (instance.clone(), node.id.clone()))
        .collect();
}

fn apply(
    store: &dyn NodeStore,
    parent: &mut TrackedParent,
    plan: ChildPlan,
    stats: &mut ChildStats,
) -> Result<(), SyncError> {
    if !plan.delete.is_empty() {
        store.delete_nodes(&plan.delete)?;
        parent.children.retain(|_, id| !plan.delete.contains(id));
        stats.deleted += plan.delete.len();
    }
    for (instance, fields) in plan.create {
        let id = store.create_child_node(&parent.node.id, &instance, fields)?;
        parent.children.insert(instance, id);
        stats.created += 1;
    }
    if !plan.update.is_empty() {
        store.update_nodes(&plan.update)?;
        stats.updated += plan.update.len();
    }
    Ok(())
}
