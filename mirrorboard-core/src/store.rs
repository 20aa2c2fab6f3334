//! Collaborator contracts the reconciler depends on, plus an in-memory board.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::error::{FetchError, StoreError};
use crate::types::{ChildFields, Identity, InstanceId, InstanceRecord, Node, NodeId, NodeKind, NodePatch};

/// Capacity of the change notification channel. Receivers that lag simply
/// miss intermediate notifications; one pending pass covers them all.
pub const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Notification that something other than the reconciler mutated the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalChange {
    pub reason: String,
}

impl ExternalChange {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Local tree of nodes. Implementations use interior mutability so one store
/// can be shared between the pass worker and the host.
pub trait NodeStore: Send + Sync {
    /// Snapshot of every node currently on the board.
    fn list_nodes(&self) -> Result<Vec<Node>, StoreError>;

    /// Insert one child node under `parent` and return its id.
    fn create_child_node(
        &self,
        parent: &NodeId,
        instance: &InstanceId,
        fields: ChildFields,
    ) -> Result<NodeId, StoreError>;

    /// Batched label patch.
    fn update_nodes(&self, patches: &[NodePatch]) -> Result<(), StoreError>;

    /// Batched removal. Unknown ids are ignored.
    fn delete_nodes(&self, ids: &[NodeId]) -> Result<(), StoreError>;

    /// Subscribe to edits made by anything other than the reconciler.
    /// Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<ExternalChange>;

    /// Whether the user is mid-selection or mid-edit. Passes are skipped
    /// while this holds.
    fn is_interacting(&self) -> Result<bool, StoreError>;
}

/// Remote directory lookup, scoped by identity.
#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    async fn fetch_instances(&self, identity: &Identity) -> Result<Vec<InstanceRecord>, FetchError>;
}

// ---------------------------------------------------------------------------
// MemoryBoard
// ---------------------------------------------------------------------------

/// Counts of mutations applied through the [`NodeStore`] trait.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounters {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
}

#[derive(Default)]
struct MemoryState {
    nodes: Vec<Node>,
    selection: Vec<NodeId>,
}

/// In-memory [`NodeStore`].
///
/// Host-side edits (`insert`, `edit_label`, `remove`, `set_selection`) publish
/// an [`ExternalChange`]; mutations made through the trait do not.
pub struct MemoryBoard {
    state: Mutex<MemoryState>,
    changes: broadcast::Sender<ExternalChange>,
    next_id: AtomicU64,
    created: AtomicU64,
    updated: AtomicU64,
    deleted: AtomicU64,
}

impl Default for MemoryBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBoard {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(MemoryState::default()),
            changes,
            next_id: AtomicU64::new(1),
            created: AtomicU64::new(0),
            updated: AtomicU64::new(0),
            deleted: AtomicU64::new(0),
        }
    }

    /// A board pre-populated with `nodes`, without publishing a change.
    pub fn with_nodes(nodes: Vec<Node>) -> Self {
        let board = Self::new();
        board.state.lock().nodes = nodes;
        board
    }

    /// Host-side insert.
    pub fn insert(&self, node: Node) {
        let reason = format!("inserted {}", node.id);
        self.state.lock().nodes.push(node);
        self.publish(reason);
    }

    /// Host-side label edit. Returns `false` when no such node exists.
    pub fn edit_label(&self, id: &NodeId, label: impl Into<String>) -> bool {
        let found = {
            let mut state = self.state.lock();
            match state.nodes.iter_mut().find(|n| &n.id == id) {
                Some(node) => {
                    node.label = label.into();
                    true
                }
                None => false,
            }
        };
        if found {
            self.publish(format!("edited {id}"));
        }
        found
    }

    /// Host-side removal. Returns `false` when no such node exists.
    pub fn remove(&self, id: &NodeId) -> bool {
        let removed = {
            let mut state = self.state.lock();
            let before = state.nodes.len();
            state.nodes.retain(|n| &n.id != id);
            state.nodes.len() != before
        };
        if removed {
            self.publish(format!("removed {id}"));
        }
        removed
    }

    /// Host-side selection change.
    pub fn set_selection(&self, selection: Vec<NodeId>) {
        self.state.lock().selection = selection;
        self.publish("selection changed");
    }

    pub fn get(&self, id: &NodeId) -> Option<Node> {
        self.state.lock().nodes.iter().find(|n| &n.id == id).cloned()
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.state.lock().nodes.clone()
    }

    /// Children currently attached to `parent`.
    pub fn children_of(&self, parent: &NodeId) -> Vec<Node> {
        self.state
            .lock()
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Child && n.parent_id.as_ref() == Some(parent))
            .cloned()
            .collect()
    }

    pub fn counters(&self) -> StoreCounters {
        StoreCounters {
            created: self.created.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
        }
    }

    fn publish(&self, reason: impl Into<String>) {
        // No receivers is fine: nobody is listening yet.
        let _ = self.changes.send(ExternalChange::new(reason));
    }

    fn fresh_id(&self) -> NodeId {
        loop {
            let candidate = NodeId::from(format!("m{}", self.next_id.fetch_add(1, Ordering::Relaxed)));
            if !self.state.lock().nodes.iter().any(|n| n.id == candidate) {
                return candidate;
            }
        }
    }
}

impl NodeStore for MemoryBoard {
    fn list_nodes(&self) -> Result<Vec<Node>, StoreError> {
        Ok(self.nodes())
    }

    fn create_child_node(
        &self,
        parent: &NodeId,
        instance: &InstanceId,
        fields: ChildFields,
    ) -> Result<NodeId, StoreError> {
        let id = self.fresh_id();
        let mut node = Node::child(id.clone(), parent.clone(), instance.clone(), fields.label);
        node.placement = fields.placement;
        let mut state = self.state.lock();
        if !state.nodes.iter().any(|n| &n.id == parent) {
            return Err(StoreError::NodeNotFound(parent.clone()));
        }
        state.nodes.push(node);
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    fn update_nodes(&self, patches: &[NodePatch]) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        // The batch applies whole or not at all.
        if let Some(missing) = patches
            .iter()
            .find(|p| !state.nodes.iter().any(|n| n.id == p.id))
        {
            return Err(StoreError::NodeNotFound(missing.id.clone()));
        }
        for patch in patches {
            if let Some(node) = state.nodes.iter_mut().find(|n| n.id == patch.id) {
                node.label = patch.label.clone();
                self.updated.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    fn delete_nodes(&self, ids: &[NodeId]) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let before = state.nodes.len();
        state.nodes.retain(|n| !ids.contains(&n.id));
        let removed = (before - state.nodes.len()) as u64;
        self.deleted.fetch_add(removed, Ordering::Relaxed);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ExternalChange> {
        self.changes.subscribe()
    }

    fn is_interacting(&self) -> Result<bool, StoreError> {
        Ok(!self.state.lock().selection.is_empty())
    }
}
