//! Layout node types.
//!
//! A [`LayoutNode`] is one folder or portlet in a user's layout. The node
//! kind is a tagged enum ([`NodeKind`]); kind-specific rules (which kinds may
//! contain which) are resolved by `match` in [`NodeKind::accepts`].

use serde::{Deserialize, Serialize};

use crate::id::{ContentId, NodeId};

/// Default name given to a tab created without one.
pub const DEFAULT_TAB_NAME: &str = "New Tab";

/// Name given to columns created by the tree.
pub const DEFAULT_COLUMN_NAME: &str = "Column";

/// Reference from a portlet node to its published content definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortletRef {
    pub content_id: ContentId,
    /// Functional name of the definition (stable, human-readable key).
    pub fname: String,
}

/// The kind of a layout node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// The single root folder.
    Root,
    /// Top-level folder; child of the root.
    Tab,
    /// Folder inside a tab; holds portlets.
    Column,
    /// Leaf content node.
    Portlet(PortletRef),
}

impl NodeKind {
    /// Whether a node of kind `child` may be placed directly under a node of
    /// this kind.
    pub fn accepts(&self, child: &NodeKind) -> bool {
        matches!(
            (self, child),
            (NodeKind::Root, NodeKind::Tab)
                | (NodeKind::Tab, NodeKind::Column)
                | (NodeKind::Column, NodeKind::Portlet(_))
        )
    }

    pub fn is_folder(&self) -> bool {
        !matches!(self, NodeKind::Portlet(_))
    }

    /// Short label used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Tab => "tab",
            NodeKind::Column => "column",
            NodeKind::Portlet(_) => "portlet",
        }
    }
}

/// Per-node capability flags. Each flag is independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub deletable: bool,
    pub movable: bool,
    pub editable: bool,
    pub add_child_allowed: bool,
}

impl Capabilities {
    /// Every capability granted.
    pub const ALL: Capabilities = Capabilities {
        deletable: true,
        movable: true,
        editable: true,
        add_child_allowed: true,
    };
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities::ALL
    }
}

/// A node in a layout tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutNode {
    pub id: NodeId,
    pub name: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Parent folder. `None` only for the root.
    pub parent: Option<NodeId>,
    /// Ordered children.
    pub children: Vec<NodeId>,
    pub capabilities: Capabilities,
    pub hidden: bool,
}

impl LayoutNode {
    /// A node is immutable when it may not be edited.
    pub fn is_immutable(&self) -> bool {
        !self.capabilities.editable
    }
}

/// A node that has not been added to a tree yet.
///
/// The tree assigns the id and the parent/children links on insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDraft {
    pub name: String,
    pub kind: NodeKind,
    pub capabilities: Capabilities,
    pub hidden: bool,
}

impl NodeDraft {
    /// A tab with every capability granted. Blank names fall back to
    /// [`DEFAULT_TAB_NAME`].
    pub fn tab(name: &str) -> Self {
        let name = name.trim();
        NodeDraft {
            name: if name.is_empty() {
                DEFAULT_TAB_NAME.to_string()
            } else {
                name.to_string()
            },
            kind: NodeKind::Tab,
            capabilities: Capabilities::ALL,
            hidden: false,
        }
    }

    pub fn column() -> Self {
        NodeDraft {
            name: DEFAULT_COLUMN_NAME.to_string(),
            kind: NodeKind::Column,
            capabilities: Capabilities::ALL,
            hidden: false,
        }
    }

    pub fn portlet(title: &str, portlet: PortletRef) -> Self {
        NodeDraft {
            name: title.to_string(),
            kind: NodeKind::Portlet(portlet),
            capabilities: Capabilities::ALL,
            hidden: false,
        }
    }
}

/// Attribute changes merged into an existing node by `update_node`.
///
/// `None` leaves the attribute unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub hidden: Option<bool>,
    #[serde(default)]
    pub deletable: Option<bool>,
    #[serde(default)]
    pub movable: Option<bool>,
    #[serde(default)]
    pub editable: Option<bool>,
    #[serde(default)]
    pub add_child_allowed: Option<bool>,
}

impl NodeChanges {
    pub fn rename(name: impl Into<String>) -> Self {
        NodeChanges {
            name: Some(name.into()),
            ..NodeChanges::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == NodeChanges::default()
    }

    pub(crate) fn apply_to(&self, node: &mut LayoutNode) {
        if let Some(name) = &self.name {
            node.name = name.clone();
        }
        if let Some(hidden) = self.hidden {
            node.hidden = hidden;
        }
        let caps = &mut node.capabilities;
        if let Some(v) = self.deletable {
            caps.deletable = v;
        }
        if let Some(v) = self.movable {
            caps.movable = v;
        }
        if let Some(v) = self.editable {
            caps.editable = v;
        }
        if let Some(v) = self.add_child_allowed {
            caps.add_child_allowed = v;
        }
    }
}
