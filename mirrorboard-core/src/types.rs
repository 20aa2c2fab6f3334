//! Domain types for the mirrored board.
//!
//! A board is a flat list of [`Node`]s. Parent-kind nodes name an external
//! directory in their label; child-kind nodes mirror one remote instance each
//! and point at their parent through `parent_id`.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque, locally unique node identifier.
///
/// Ordering is total and stable: ids that both parse as unsigned integers
/// compare numerically, numeric ids sort before non-numeric ones, and the
/// rest compare lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    fn numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Remote-reported instance identifier, unique within one parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for InstanceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for InstanceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Key parsed from a parent node's label; correlates local parents with
/// remote directories across passes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(pub String);

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Distinguishes tracked parents and mirrored children from nodes the host
/// owns for its own purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NodeKind {
    #[serde(rename = "tracked-parent")]
    Parent,
    #[serde(rename = "instance-child")]
    Child,
    #[default]
    #[serde(rename = "other")]
    Other,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Parent => write!(f, "tracked-parent"),
            NodeKind::Child => write!(f, "instance-child"),
            NodeKind::Other => write!(f, "other"),
        }
    }
}

/// Outcome of the most recent remote fetch for a tracked parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParentStatus {
    #[default]
    Pending,
    Ok,
    Error,
}

impl fmt::Display for ParentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentStatus::Pending => write!(f, "pending"),
            ParentStatus::Ok => write!(f, "ok"),
            ParentStatus::Error => write!(f, "error"),
        }
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Geometry owned by the rendering host. The reconciler only writes it when
/// creating a child.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Size and spacing used when stacking children beneath their parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildLayout {
    pub width: f64,
    pub height: f64,
    pub gap: f64,
}

impl Default for ChildLayout {
    fn default() -> Self {
        Self {
            width: 300.0,
            height: 42.0,
            gap: 0.0,
        }
    }
}

impl Placement {
    /// Placement of the `slot`-th child listed beneath `parent`.
    pub fn below(parent: &Placement, slot: usize, layout: &ChildLayout) -> Placement {
        let step = layout.height + layout.gap;
        Placement {
            x: parent.x,
            y: parent.y + parent.height + layout.gap + step * slot as f64,
            width: layout.width,
            height: layout.height,
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes and records
// ---------------------------------------------------------------------------

/// One local entity on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<InstanceId>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub placement: Placement,
}

impl Node {
    /// A tracked-parent node labelled `label`.
    pub fn parent(id: impl Into<NodeId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Parent,
            parent_id: None,
            instance_id: None,
            label: label.into(),
            placement: Placement::default(),
        }
    }

    /// An instance-child node under `parent_id`.
    pub fn child(
        id: impl Into<NodeId>,
        parent_id: impl Into<NodeId>,
        instance_id: impl Into<InstanceId>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Child,
            parent_id: Some(parent_id.into()),
            instance_id: Some(instance_id.into()),
            label: label.into(),
            placement: Placement::default(),
        }
    }

    pub fn is_parent(&self) -> bool {
        self.kind == NodeKind::Parent
    }

    pub fn is_child(&self) -> bool {
        self.kind == NodeKind::Child
    }
}

/// One remote-reported unit belonging to a tracked parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    #[serde(rename = "instanceId")]
    pub instance_id: InstanceId,
    pub text: String,
}

impl InstanceRecord {
    pub fn new(instance_id: impl Into<InstanceId>, text: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            text: text.into(),
        }
    }
}

/// Field patch applied by [`crate::NodeStore::update_nodes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    pub id: NodeId,
    pub label: String,
}

/// Fields for a freshly created child node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildFields {
    pub label: String,
    pub placement: Placement,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_orders_numbers_numerically() {
        let mut ids: Vec<NodeId> = ["10", "9", "b", "5", "a"].into_iter().map(NodeId::from).collect();
        ids.sort();
        let ordered: Vec<_> = ids.iter().map(|id| id.0.as_str()).collect();
        assert_eq!(ordered, ["5", "9", "10", "a", "b"]);
    }

    #[test]
    fn node_id_order_is_total_for_padded_numbers() {
        let a = NodeId::from("07");
        let b = NodeId::from("7");
        assert_ne!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
    }

    #[test]
    fn node_kind_serializes_with_kebab_names() {
        let yaml = serde_yaml::to_string(&NodeKind::Parent).expect("serialize");
        assert_eq!(yaml.trim(), "tracked-parent");
        let kind: NodeKind = serde_yaml::from_str("instance-child").expect("deserialize");
        assert_eq!(kind, NodeKind::Child);
    }

    #[test]
    fn instance_record_uses_camel_case_instance_id() {
        let record: InstanceRecord =
            serde_yaml::from_str("instanceId: i1\ntext: db-1\n").expect("deserialize");
        assert_eq!(record, InstanceRecord::new("i1", "db-1"));
    }

    #[test]
    fn children_stack_beneath_parent() {
        let parent = Placement {
            x: 10.0,
            y: 20.0,
            width: 300.0,
            height: 42.0,
        };
        let layout = ChildLayout::default();
        let first = Placement::below(&parent, 0, &layout);
        let third = Placement::below(&parent, 2, &layout);
        assert_eq!(first.x, 10.0);
        assert_eq!(first.y, 62.0);
        assert_eq!(third.y, 62.0 + 84.0);
        assert_eq!(third.width, 300.0);
    }

    #[test]
    fn newtype_display() {
        assert_eq!(NodeId::from("n1").to_string(), "n1");
        assert_eq!(Identity::from("https://a").to_string(), "https://a");
        assert_eq!(ParentStatus::Error.to_string(), "error");
    }
}
