//! Decompose/recompose conversions between LayoutTree and flat storage rows.
//!
//! [`decompose`] breaks a merged tree into a [`DecomposedLayout`]: the
//! user's own nodes plus the child ordering of every folder the user owns.
//! Fragment nodes are not kept, but their positions among the user's own
//! children are, because those orderings may mention fragment ids.
//!
//! [`recompose`] rebuilds the merged view. It lays out the user's own nodes,
//! grafts in the tabs of every subscribed fragment owner (re-homed into the
//! `u<owner>l<layout>` namespace), then applies the stored orderings of the
//! user's own folders. Inside a fragment folder the owner's current order
//! wins. Nodes whose parent is no longer visible are dropped.

use std::collections::{HashMap, HashSet, VecDeque};

use portlayout_core::{
    Capabilities, FragmentOrigin, LayoutNode, LayoutTree, NodeId, NodeKind,
};

use crate::error::StorageError;

/// One user-owned node as stored, without its child list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredNode {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    /// `None` only for the root. May name a fragment node.
    pub parent: Option<NodeId>,
    pub capabilities: Capabilities,
    pub hidden: bool,
}

/// A layout broken into flat rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecomposedLayout {
    /// Next id allocator value.
    pub next_id: u32,
    /// User-owned nodes in tree order (root first).
    pub nodes: Vec<StoredNode>,
    /// `(parent, ordered children)` for every user-owned folder with
    /// children.
    pub child_order: Vec<(NodeId, Vec<NodeId>)>,
}

/// Decomposes a merged tree into storage rows.
pub fn decompose(tree: &LayoutTree) -> DecomposedLayout {
    let nodes = tree
        .nodes()
        .filter(|n| !n.id.is_fragment())
        .map(|n| StoredNode {
            id: n.id.clone(),
            name: n.name.clone(),
            kind: n.kind.clone(),
            parent: n.parent.clone(),
            capabilities: n.capabilities,
            hidden: n.hidden,
        })
        .collect();

    let child_order = tree
        .nodes()
        .filter(|n| !n.id.is_fragment() && !n.children.is_empty())
        .map(|n| (n.id.clone(), n.children.clone()))
        .collect();

    DecomposedLayout {
        next_id: tree.next_id(),
        nodes,
        child_order,
    }
}

/// Children of every parent in `layout`: the stored ordering first, then
/// any node that names the parent but was left out of the ordering.
fn ordered_children(layout: &DecomposedLayout) -> HashMap<&NodeId, Vec<&NodeId>> {
    let mut map: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
    for (parent, children) in &layout.child_order {
        map.entry(parent).or_default().extend(children.iter());
    }
    for node in &layout.nodes {
        if let Some(parent) = &node.parent {
            let entry = map.entry(parent).or_default();
            if !entry.contains(&&node.id) {
                entry.push(&node.id);
            }
        }
    }
    map
}

/// Re-homes the owner's own tabs (and everything below them) into the
/// fragment namespace of `origin`, appending the copies to `out`.
fn graft_fragment(
    origin: FragmentOrigin,
    owner_layout: &DecomposedLayout,
    root: &NodeId,
    out: &mut Vec<LayoutNode>,
) {
    let by_id: HashMap<&NodeId, &StoredNode> =
        owner_layout.nodes.iter().map(|n| (&n.id, n)).collect();
    let children = ordered_children(owner_layout);
    let owner_root = NodeId::root();

    // Depth-first, children in the owner's order.
    let mut stack: Vec<(&NodeId, NodeId)> = Vec::new();
    if let Some(tabs) = children.get(&owner_root) {
        for tab in tabs.iter().rev() {
            stack.push((*tab, root.clone()));
        }
    }
    while let Some((id, parent)) = stack.pop() {
        // Fragments are never re-exported: skip anything the owner does not
        // own.
        let Some(stored) = by_id.get(id) else {
            continue;
        };
        if stored.id.is_fragment() {
            continue;
        }
        let new_id = stored.id.clone().into_fragment(origin);
        out.push(LayoutNode {
            id: new_id.clone(),
            name: stored.name.clone(),
            kind: stored.kind.clone(),
            parent: Some(parent),
            children: Vec::new(),
            capabilities: Capabilities {
                deletable: false,
                editable: false,
                ..stored.capabilities
            },
            hidden: stored.hidden,
        });
        if let Some(kids) = children.get(id) {
            for kid in kids.iter().rev() {
                stack.push((*kid, new_id.clone()));
            }
        }
    }
}

/// Rebuilds the merged view of a layout.
///
/// `fragments` holds the raw (unmerged) layout of every active
/// subscription's owner together with the origin its nodes are re-homed
/// into.
pub fn recompose(
    own: &DecomposedLayout,
    fragments: &[(FragmentOrigin, &DecomposedLayout)],
) -> Result<LayoutTree, StorageError> {
    let root = NodeId::root();

    let mut nodes: Vec<LayoutNode> = own
        .nodes
        .iter()
        .map(|n| LayoutNode {
            id: n.id.clone(),
            name: n.name.clone(),
            kind: n.kind.clone(),
            parent: n.parent.clone(),
            children: Vec::new(),
            capabilities: n.capabilities,
            hidden: n.hidden,
        })
        .collect();
    for (origin, layout) in fragments {
        graft_fragment(*origin, layout, &root, &mut nodes);
    }

    let mut index: HashMap<NodeId, usize> = HashMap::new();
    for (i, node) in nodes.iter().enumerate() {
        if index.insert(node.id.clone(), i).is_some() {
            return Err(StorageError::IntegrityError {
                reason: format!("node {} appears twice in the merged layout", node.id),
            });
        }
    }

    // Stored orderings of the user's own folders claim their children
    // first. Rows written before fragment folders were excluded may still
    // carry them; the owner's structure decides there.
    let mut claimed: HashSet<NodeId> = HashSet::new();
    for (parent, children) in &own.child_order {
        if parent.is_fragment() {
            continue;
        }
        let Some(&p) = index.get(parent) else {
            continue;
        };
        for child in children {
            let Some(&c) = index.get(child) else {
                continue;
            };
            if claimed.contains(child) || !nodes[p].kind.accepts(&nodes[c].kind) {
                continue;
            }
            claimed.insert(child.clone());
            nodes[c].parent = Some(parent.clone());
            nodes[p].children.push(child.clone());
        }
    }

    // Everything else is appended under its own parent link.
    for c in 0..nodes.len() {
        if claimed.contains(&nodes[c].id) {
            continue;
        }
        let Some(parent) = nodes[c].parent.clone() else {
            continue;
        };
        let Some(&p) = index.get(&parent) else {
            continue;
        };
        if nodes[p].kind.accepts(&nodes[c].kind) {
            let id = nodes[c].id.clone();
            nodes[p].children.push(id);
        }
    }

    // Drop whatever is no longer reachable from the root.
    let mut reachable: HashSet<NodeId> = HashSet::new();
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    if index.contains_key(&root) {
        queue.push_back(root.clone());
    }
    while let Some(id) = queue.pop_front() {
        if let Some(&i) = index.get(&id) {
            queue.extend(nodes[i].children.iter().cloned());
        }
        reachable.insert(id);
    }
    nodes.retain(|n| reachable.contains(&n.id));

    Ok(LayoutTree::from_parts(root, nodes, own.next_id)?)
}
