//! Parent Registry: identity → tracked parent, owned by the reconciler.
//!
//! Only the pass mutates it. Its keys are exactly the identities of the
//! parents that survived the last completed pass.

use std::collections::BTreeMap;

use serde::Serialize;

use mirrorboard_core::{Identity, InstanceId, InstanceRecord, Node, NodeId, ParentStatus};

use crate::diff::diff;

/// One local parent mirroring one remote directory.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedParent {
    pub identity: Identity,
    /// Latest snapshot of the backing node.
    pub node: Node,
    pub status: ParentStatus,
    /// Last successfully fetched instance list; `None` until a fetch succeeds.
    pub instances: Option<Vec<InstanceRecord>>,
    /// Child node per instance, as of the last child reconciliation.
    pub children: BTreeMap<InstanceId, NodeId>,
}

impl TrackedParent {
    pub fn new(identity: Identity, node: Node) -> Self {
        Self {
            identity,
            node,
            status: ParentStatus::Pending,
            instances: None,
            children: BTreeMap::new(),
        }
    }
}

/// Read-only view of a tracked parent for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParentSummary {
    pub identity: String,
    pub node_id: String,
    pub status: ParentStatus,
    pub children: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ParentRegistry {
    parents: BTreeMap<Identity, TrackedParent>,
}

impl ParentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn get(&self, identity: &Identity) -> Option<&TrackedParent> {
        self.parents.get(identity)
    }

    pub fn get_mut(&mut self, identity: &Identity) -> Option<&mut TrackedParent> {
        self.parents.get_mut(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedParent> {
        self.parents.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TrackedParent> {
        self.parents.values_mut()
    }

    pub fn identities(&self) -> Vec<Identity> {
        self.parents.keys().cloned().collect()
    }

    /// Backing node per identity, as recorded by the previous pass.
    pub fn backing_nodes(&self) -> BTreeMap<Identity, Node> {
        self.parents
            .iter()
            .map(|(id, parent)| (id.clone(), parent.node.clone()))
            .collect()
    }

    pub fn summaries(&self) -> Vec<ParentSummary> {
        self.parents
            .values()
            .map(|p| ParentSummary {
                identity: p.identity.0.clone(),
                node_id: p.node.id.0.clone(),
                status: p.status,
                children: p.children.len(),
            })
            .collect()
    }

    /// Bring the registry in line with the surviving parents of this pass.
    ///
    /// `nodes` is the post-sanitize snapshot, used to find children of
    /// parents that stopped being tracked. A parent whose node id reappears
    /// under a new identity in the same pass is a rename: its children are
    /// kept.
    pub fn reconcile(
        &mut self,
        current: &BTreeMap<Identity, Node>,
        nodes: &[Node],
    ) -> ParentChanges {
        let changes = diff(&self.backing_nodes(), current);
        let mut out = ParentChanges {
            summary: changes.to_string(),
            ..ParentChanges::default()
        };

        // Children to drop, keyed by the parent node that owned them.
        let mut pending: BTreeMap<NodeId, (Identity, Vec<NodeId>)> = BTreeMap::new();
        for (identity, node) in &changes.deleted {
            let children = nodes
                .iter()
                .filter(|n| n.is_child() && n.parent_id.as_ref() == Some(&node.id))
                .map(|n| n.id.clone())
                .collect();
            tracing::info!(identity = %identity, "stopping parent");
            self.parents.remove(identity);
            pending.insert(node.id.clone(), (identity.clone(), children));
            out.stopped.push(identity.clone());
        }

        for (identity, node) in &changes.created {
            tracing::info!(identity = %identity, "starting parent");
            self.parents
                .insert(identity.clone(), TrackedParent::new(identity.clone(), node.clone()));
            if let Some((previous, _)) = pending.remove(&node.id) {
                tracing::info!(from = %previous, to = %identity, "parent renamed, keeping children");
                out.renamed.push((previous, identity.clone()));
            }
            out.started.push(identity.clone());
        }

        for (identity, (_, node)) in changes.same {
            if let Some(parent) = self.parents.get_mut(&identity) {
                parent.node = node;
            }
        }

        out.doomed_children = pending
            .into_values()
            .flat_map(|(_, children)| children)
            .collect();
        out
    }
}

/// Bookkeeping produced by [`ParentRegistry::reconcile`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParentChanges {
    pub started: Vec<Identity>,
    pub stopped: Vec<Identity>,
    /// `(old, new)` identity pairs detected by node-id match.
    pub renamed: Vec<(Identity, Identity)>,
    /// Children of stopped parents that the caller should delete.
    pub doomed_children: Vec<NodeId>,
    /// Delta summary such as `c1 d0 s2`.
    pub summary: String,
}

impl ParentChanges {
    pub fn is_stable(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty()
    }
}
