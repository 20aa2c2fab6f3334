//! Status Projector: reflect each parent's fetch status onto its label.

use mirrorboard_core::{IdentityStrategy, NodePatch};

use crate::registry::ParentRegistry;

/// Compute label patches for parents whose label does not match their status.
///
/// The registry's node snapshots are updated in place so later phases see
/// the projected labels. Parents already showing the right label produce no
/// patch.
pub fn project(registry: &mut ParentRegistry, identity: &dyn IdentityStrategy) -> Vec<NodePatch> {
    let mut patches = Vec::new();
    for parent in registry.iter_mut() {
        let label = identity.label_for(&parent.identity, parent.status);
        if parent.node.label != label {
            parent.node.label = label.clone();
            patches.push(NodePatch {
                id: parent.node.id.clone(),
                label,
            });
        }
    }
    patches
}
