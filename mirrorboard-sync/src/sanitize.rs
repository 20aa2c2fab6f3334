//! Pre-pass cleanup that restores the board's structural invariants.
//!
//! Removed:
//! - parents whose identity is already claimed by a lower-ordered parent
//! - children that do not point at a surviving parent
//! - children repeating an instance id already claimed under the same parent
//!
//! Duplicates usually come from copying an existing parent. The lowest
//! [`NodeId`] in its total order wins; the tie-break is arbitrary but stable.

use std::collections::{BTreeMap, BTreeSet};

use mirrorboard_core::{Identity, IdentityStrategy, InstanceId, Node, NodeId, NodeStore};

use crate::error::SyncError;

/// What the sanitizer decided for one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SanitizePlan {
    /// Nodes to delete, in id order.
    pub doomed: Vec<NodeId>,
    /// Surviving parents keyed by identity.
    pub parents: BTreeMap<Identity, Node>,
}

/// Decide which nodes violate the invariants. Pure; input order is irrelevant.
pub fn plan(nodes: &[Node], identity: &dyn IdentityStrategy) -> SanitizePlan {
    let mut sorted: Vec<&Node> = nodes.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut doomed = Vec::new();
    let mut parents = BTreeMap::new();
    let mut claimed: BTreeMap<NodeId, BTreeSet<InstanceId>> = BTreeMap::new();

    for node in sorted.iter().filter(|n| n.is_parent()) {
        let Some(id) = identity.parse(&node.label) else {
            continue;
        };
        if parents.contains_key(&id) {
            tracing::debug!(identity = %id, node = %node.id, "duplicate parent identity");
            doomed.push(node.id.clone());
            continue;
        }
        claimed.insert(node.id.clone(), BTreeSet::new());
        parents.insert(id, (*node).clone());
    }

    for node in sorted.iter().filter(|n| n.is_child()) {
        let slot = node.parent_id.as_ref().and_then(|p| claimed.get_mut(p));
        let (Some(instances), Some(instance)) = (slot, node.instance_id.as_ref()) else {
            tracing::debug!(node = %node.id, "orphaned child");
            doomed.push(node.id.clone());
            continue;
        };
        if !instances.insert(instance.clone()) {
            tracing::debug!(node = %node.id, instance = %instance, "duplicate child instance");
            doomed.push(node.id.clone());
        }
    }

    doomed.sort();
    SanitizePlan { doomed, parents }
}

/// Snapshot the store, plan, and delete every doomed node in one batch.
pub fn sanitize(
    store: &dyn NodeStore,
    identity: &dyn IdentityStrategy,
) -> Result<SanitizePlan, SyncError> {
    let nodes = store.list_nodes()?;
    let plan = plan(&nodes, identity);
    if !plan.doomed.is_empty() {
        tracing::info!(count = plan.doomed.len(), "sanitizer removing invalid nodes");
        store.delete_nodes(&plan.doomed)?;
    }
    Ok(plan)
}
