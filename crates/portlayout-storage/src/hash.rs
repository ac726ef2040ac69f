//! Deterministic content hashing for layouts using blake3.
//!
//! The layout hash is derived state, never stored. Clients read it with the
//! layout and may send it back with an action as an optimistic check.
//!
//! Determinism: nodes are hashed in pre-order from the root, and every field
//! is fed with a length prefix so adjacent strings cannot run together.

use portlayout_core::{LayoutNode, LayoutTree, NodeKind};

fn update_str(hasher: &mut blake3::Hasher, s: &str) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn hash_node(hasher: &mut blake3::Hasher, node: &LayoutNode) {
    update_str(hasher, &node.id.to_string());
    update_str(hasher, &node.name);
    update_str(hasher, node.kind.label());
    if let NodeKind::Portlet(portlet) = &node.kind {
        hasher.update(&portlet.content_id.0.to_le_bytes());
        update_str(hasher, &portlet.fname);
    }
    let caps = node.capabilities;
    hasher.update(&[
        caps.deletable as u8,
        caps.movable as u8,
        caps.editable as u8,
        caps.add_child_allowed as u8,
        node.hidden as u8,
    ]);
    hasher.update(&(node.children.len() as u64).to_le_bytes());
}

/// Computes the blake3 hash of a whole layout.
///
/// Two trees hash equal exactly when they have the same nodes, attributes
/// and ordering. The allocator position is not part of the hash.
pub fn hash_layout(tree: &LayoutTree) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    let root = tree.root_id();
    let mut order = vec![root.clone()];
    // A tree that passed validation always has its descendants.
    if let Ok(descendants) = tree.descendants(root) {
        order.extend(descendants);
    }
    for id in &order {
        if let Ok(node) = tree.get_node(id) {
            hash_node(&mut hasher, node);
        }
    }
    hasher.finalize()
}

/// Hex form of [`hash_layout`], as exposed over the API.
pub fn layout_hash_hex(tree: &LayoutTree) -> String {
    hash_layout(tree).to_hex().to_string()
}
