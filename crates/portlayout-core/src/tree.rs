//! LayoutTree: the in-memory layout of one (user, profile).
//!
//! [`LayoutTree`] owns every node of a layout and is the only way to mutate
//! it. All structural operations validate their inputs and consult the
//! permission guard *before* touching the tree, so a rejected operation
//! leaves the tree exactly as it was.
//!
//! # Invariants
//!
//! - exactly one root (kind `Root`, no parent)
//! - every other node has exactly one parent, and appears exactly once in
//!   that parent's ordered `children`
//! - every node is reachable from the root (closed, acyclic)
//! - tabs sit under the root, columns under tabs, portlets under columns
//!
//! # Ordering
//!
//! Add and move share one placement rule: with a sibling `S`, the node is
//! placed immediately before `S`; without one it is appended.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::CoreError;
use crate::id::{NodeId, UserId};
use crate::node::{Capabilities, LayoutNode, NodeChanges, NodeDraft, NodeKind};
use crate::permission::{self, Capability};

/// A user's layout tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutTree {
    root: NodeId,
    nodes: IndexMap<NodeId, LayoutNode>,
    /// Next sequence number handed out by the id allocator.
    next_id: u32,
}

impl LayoutTree {
    /// Creates a tree holding only its root folder.
    pub fn new(root_name: &str) -> Self {
        let root = NodeId::root();
        let node = LayoutNode {
            id: root.clone(),
            name: root_name.to_string(),
            kind: NodeKind::Root,
            parent: None,
            children: Vec::new(),
            capabilities: Capabilities {
                deletable: false,
                movable: false,
                editable: true,
                add_child_allowed: true,
            },
            hidden: false,
        };
        let mut nodes = IndexMap::new();
        nodes.insert(root.clone(), node);
        LayoutTree {
            root,
            nodes,
            next_id: 1,
        }
    }

    /// Reconstructs a tree from stored parts and validates every invariant.
    ///
    /// Used by the storage layer to rebuild a snapshot.
    pub fn from_parts(
        root: NodeId,
        nodes: impl IntoIterator<Item = LayoutNode>,
        next_id: u32,
    ) -> Result<Self, CoreError> {
        let mut map = IndexMap::new();
        for node in nodes {
            if map.insert(node.id.clone(), node).is_some() {
                return Err(CoreError::TreeInconsistency {
                    reason: "duplicate node id".to_string(),
                });
            }
        }
        let tree = LayoutTree {
            root,
            nodes: map,
            next_id,
        };
        tree.validate()?;
        Ok(tree)
    }

    // -----------------------------------------------------------------------
    // Read-only traversal
    // -----------------------------------------------------------------------

    pub fn root_id(&self) -> &NodeId {
        &self.root
    }

    /// Next allocator sequence number (persisted with the snapshot).
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Iterates over every node, root first, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &LayoutNode> {
        self.nodes.values()
    }

    /// All node ids, sorted. Handy for comparing visible node sets.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Looks up a node by id.
    pub fn get_node(&self, id: &NodeId) -> Result<&LayoutNode, CoreError> {
        self.nodes
            .get(id)
            .ok_or_else(|| CoreError::NodeNotFound { id: id.clone() })
    }

    /// Returns the parent of `id` (`None` for the root).
    pub fn get_parent_id(&self, id: &NodeId) -> Result<Option<&NodeId>, CoreError> {
        Ok(self.get_node(id)?.parent.as_ref())
    }

    /// Returns the ordered children of `id`.
    pub fn get_child_ids(&self, id: &NodeId) -> Result<&[NodeId], CoreError> {
        Ok(&self.get_node(id)?.children)
    }

    /// The tabs of the layout, in order.
    pub fn tabs(&self) -> &[NodeId] {
        self.nodes
            .get(&self.root)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// The columns of `tab`, in order.
    pub fn columns(&self, tab: &NodeId) -> Result<&[NodeId], CoreError> {
        let node = self.get_node(tab)?;
        if node.kind != NodeKind::Tab {
            return Err(CoreError::invalid(format!("{tab} is not a tab")));
        }
        Ok(&node.children)
    }

    pub fn is_tab(&self, id: &NodeId) -> bool {
        matches!(self.nodes.get(id), Some(n) if n.kind == NodeKind::Tab)
    }

    pub fn is_column(&self, id: &NodeId) -> bool {
        matches!(self.nodes.get(id), Some(n) if n.kind == NodeKind::Column)
    }

    pub fn is_portlet(&self, id: &NodeId) -> bool {
        matches!(self.nodes.get(id), Some(n) if matches!(n.kind, NodeKind::Portlet(_)))
    }

    /// Whether `ancestor` is `id` itself or lies on the path from `id` up to
    /// the root.
    pub fn is_ancestor_or_self(&self, ancestor: &NodeId, id: &NodeId) -> bool {
        let mut current = Some(id);
        while let Some(cur) = current {
            if cur == ancestor {
                return true;
            }
            current = self.nodes.get(cur).and_then(|n| n.parent.as_ref());
        }
        false
    }

    /// Every descendant of `id` in pre-order, excluding `id` itself.
    pub fn descendants(&self, id: &NodeId) -> Result<Vec<NodeId>, CoreError> {
        let node = self.get_node(id)?;
        let mut out = Vec::new();
        let mut stack: Vec<&NodeId> = node.children.iter().rev().collect();
        while let Some(next) = stack.pop() {
            out.push(next.clone());
            if let Some(child) = self.nodes.get(next) {
                stack.extend(child.children.iter().rev());
            }
        }
        Ok(out)
    }

    /// Root-level folders merged in from `owner`'s fragment.
    pub fn fragment_roots(&self, owner: UserId) -> Vec<NodeId> {
        self.tabs()
            .iter()
            .filter(|id| id.is_owned_by(owner))
            .cloned()
            .collect()
    }

    /// Pure permission predicate: may `id` be updated?
    pub fn can_update_node(&self, id: &NodeId) -> bool {
        self.nodes
            .get(id)
            .map_or(false, |node| permission::allows(node, Capability::Edit))
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Adds a new node under `parent`, before `sibling` or at the end.
    ///
    /// Returns the id assigned to the node.
    pub fn add_node(
        &mut self,
        draft: NodeDraft,
        parent: &NodeId,
        sibling: Option<&NodeId>,
    ) -> Result<NodeId, CoreError> {
        let parent_node = self.get_node(parent)?;
        permission::require(parent_node, Capability::AddChild)?;
        if !parent_node.kind.accepts(&draft.kind) {
            return Err(CoreError::invalid(format!(
                "a {} cannot be added to {} {}",
                draft.kind.label(),
                parent_node.kind.label(),
                parent
            )));
        }
        if let Some(sibling) = sibling {
            if !parent_node.children.contains(sibling) {
                return Err(CoreError::invalid(format!(
                    "{sibling} is not a child of {parent}"
                )));
            }
        }

        let id = self.allocate_id(&draft.kind);
        let node = LayoutNode {
            id: id.clone(),
            name: draft.name,
            kind: draft.kind,
            parent: Some(parent.clone()),
            children: Vec::new(),
            capabilities: draft.capabilities,
            hidden: draft.hidden,
        };
        self.nodes.insert(id.clone(), node);
        self.attach(parent, id.clone(), sibling);
        Ok(id)
    }

    /// Moves `id` under `new_parent`, before `sibling` or at the end.
    pub fn move_node(
        &mut self,
        id: &NodeId,
        new_parent: &NodeId,
        sibling: Option<&NodeId>,
    ) -> Result<(), CoreError> {
        let node = self.get_node(id)?;
        if id == &self.root {
            return Err(CoreError::invalid("the root folder cannot be moved"));
        }
        permission::require(node, Capability::Move)?;

        let target = self.get_node(new_parent)?;
        if self.is_ancestor_or_self(id, new_parent) {
            return Err(CoreError::invalid(format!(
                "cannot move {id} into itself or one of its descendants"
            )));
        }
        if !target.kind.accepts(&node.kind) {
            return Err(CoreError::invalid(format!(
                "a {} cannot be moved into {} {}",
                node.kind.label(),
                target.kind.label(),
                new_parent
            )));
        }
        if let Some(sibling) = sibling {
            if sibling == id {
                return Err(CoreError::invalid(format!(
                    "{id} cannot be placed before itself"
                )));
            }
            if !target.children.contains(sibling) {
                return Err(CoreError::invalid(format!(
                    "{sibling} is not a child of {new_parent}"
                )));
            }
        }
        if target.is_immutable() {
            return Err(CoreError::PermissionDenied {
                id: new_parent.clone(),
                capability: Capability::Edit,
            });
        }
        let old_parent = node.parent.clone();
        if old_parent.as_ref() != Some(new_parent) {
            permission::require(target, Capability::AddChild)?;
        }

        if let Some(old_parent) = old_parent {
            self.detach(&old_parent, id);
        }
        self.attach(new_parent, id.clone(), sibling);
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = Some(new_parent.clone());
        }
        Ok(())
    }

    /// Deletes `id` and its whole sub-tree. Returns the removed ids.
    pub fn delete_node(&mut self, id: &NodeId) -> Result<Vec<NodeId>, CoreError> {
        let node = self.get_node(id)?;
        if id == &self.root {
            return Err(CoreError::invalid("the root folder cannot be deleted"));
        }
        permission::require(node, Capability::Delete)?;
        let parent = node.parent.clone();

        let mut removed = vec![id.clone()];
        removed.extend(self.descendants(id)?);

        if let Some(parent) = parent {
            self.detach(&parent, id);
        }
        for gone in &removed {
            self.nodes.shift_remove(gone);
        }
        Ok(removed)
    }

    /// Merges attribute changes into the tree's copy of `id`.
    pub fn update_node(&mut self, id: &NodeId, changes: &NodeChanges) -> Result<(), CoreError> {
        let node = self.get_node(id)?;
        permission::require(node, Capability::Edit)?;
        if let Some(node) = self.nodes.get_mut(id) {
            changes.apply_to(node);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Identity allocator. Skips sequence numbers already present in the
    /// tree, which can happen for snapshots written by older allocators.
    fn allocate_id(&mut self, kind: &NodeKind) -> NodeId {
        loop {
            let seq = self.next_id;
            self.next_id += 1;
            let id = if kind.is_folder() {
                NodeId::folder(seq)
            } else {
                NodeId::portlet(seq)
            };
            if !self.nodes.contains_key(&id) {
                return id;
            }
        }
    }

    /// Inserts `child` into `parent.children` before `sibling` (or at the
    /// end). Caller has validated both ids.
    fn attach(&mut self, parent: &NodeId, child: NodeId, sibling: Option<&NodeId>) {
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            let index = sibling
                .and_then(|s| parent_node.children.iter().position(|c| c == s))
                .unwrap_or(parent_node.children.len());
            parent_node.children.insert(index, child);
        }
    }

    fn detach(&mut self, parent: &NodeId, child: &NodeId) {
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.retain(|c| c != child);
        }
    }

    /// Checks every tree invariant.
    pub fn validate(&self) -> Result<(), CoreError> {
        let fail = |reason: String| Err(CoreError::TreeInconsistency { reason });

        let root = match self.nodes.get(&self.root) {
            Some(root) => root,
            None => return fail(format!("root {} is missing", self.root)),
        };
        if root.kind != NodeKind::Root || root.parent.is_some() {
            return fail("root must be a parentless root folder".to_string());
        }

        for node in self.nodes.values() {
            if node.kind == NodeKind::Root && node.id != self.root {
                return fail(format!("second root folder {}", node.id));
            }
            let mut seen = HashSet::new();
            for child in &node.children {
                if !seen.insert(child) {
                    return fail(format!("{} lists child {} twice", node.id, child));
                }
                match self.nodes.get(child) {
                    Some(c) if c.parent.as_ref() == Some(&node.id) => {}
                    Some(_) => {
                        return fail(format!("{} does not point back to parent {}", child, node.id))
                    }
                    None => return fail(format!("{} lists unknown child {}", node.id, child)),
                }
            }
            if let Some(parent) = &node.parent {
                let parent_node = match self.nodes.get(parent) {
                    Some(p) => p,
                    None => return fail(format!("{} has unknown parent {}", node.id, parent)),
                };
                if !parent_node.children.contains(&node.id) {
                    return fail(format!("{} is missing from its parent {}", node.id, parent));
                }
                if !parent_node.kind.accepts(&node.kind) {
                    return fail(format!(
                        "{} {} cannot live under {} {}",
                        node.kind.label(),
                        node.id,
                        parent_node.kind.label(),
                        parent
                    ));
                }
            } else if node.id != self.root {
                return fail(format!("{} has no parent", node.id));
            }
        }

        let reachable = self.descendants(&self.root)?.len() + 1;
        if reachable != self.nodes.len() {
            return fail(format!(
                "{} node(s) are not reachable from the root",
                self.nodes.len() - reachable
            ));
        }
        Ok(())
    }
}
