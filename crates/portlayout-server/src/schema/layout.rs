//! Layout and subscription view types.

use serde::Serialize;

use portlayout_core::{
    ContentId, LayoutNode, LayoutTree, NodeId, NodeKind, StructurePreferences, ThemePreferences,
    UserId,
};
use portlayout_storage::ProfileId;

/// Flat view of one node.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub id: NodeId,
    pub name: String,
    /// `root`, `tab`, `column` or `portlet`.
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    pub child_ids: Vec<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<ContentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fname: Option<String>,
    pub deletable: bool,
    pub movable: bool,
    pub editable: bool,
    pub add_child_allowed: bool,
    pub hidden: bool,
    /// Owner of the fragment the node was merged from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment_owner: Option<UserId>,
}

impl From<&LayoutNode> for NodeView {
    fn from(node: &LayoutNode) -> Self {
        let (content_id, fname) = match &node.kind {
            NodeKind::Portlet(portlet) => (Some(portlet.content_id), Some(portlet.fname.clone())),
            _ => (None, None),
        };
        NodeView {
            id: node.id.clone(),
            name: node.name.clone(),
            kind: node.kind.label(),
            parent_id: node.parent.clone(),
            child_ids: node.children.clone(),
            content_id,
            fname,
            deletable: node.capabilities.deletable,
            movable: node.capabilities.movable,
            editable: node.capabilities.editable,
            add_child_allowed: node.capabilities.add_child_allowed,
            hidden: node.hidden,
            fragment_owner: node.id.fragment().map(|origin| origin.owner),
        }
    }
}

/// A user's merged layout as returned by `GET /profiles/{profile}/layout`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutView {
    pub user_id: UserId,
    pub user_name: String,
    pub profile: ProfileId,
    /// Pass back as `expectedHash` to make an action conditional.
    pub hash: String,
    pub root: NodeId,
    /// Every node, root first, in document order.
    pub nodes: Vec<NodeView>,
    pub structure: StructurePreferences,
    pub theme: ThemePreferences,
}

/// Nodes of `tree` in pre-order from the root.
pub fn document_order(tree: &LayoutTree) -> Vec<NodeView> {
    let root = tree.root_id();
    let mut ids = vec![root.clone()];
    if let Ok(descendants) = tree.descendants(root) {
        ids.extend(descendants);
    }
    ids.iter()
        .filter_map(|id| tree.get_node(id).ok())
        .map(NodeView::from)
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub owner_id: UserId,
    pub owner_name: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionListResponse {
    pub subscriber_id: UserId,
    pub subscriptions: Vec<SubscriptionView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use portlayout_core::{NodeDraft, PortletRef};

    #[test]
    fn document_order_is_pre_order() {
        let mut tree = LayoutTree::new("Layout");
        let root = tree.root_id().clone();
        let tab = tree.add_node(NodeDraft::tab("Home"), &root, None).unwrap();
        let column = tree.add_node(NodeDraft::column(), &tab, None).unwrap();
        let weather = PortletRef {
            content_id: ContentId(3),
            fname: "weather".into(),
        };
        let portlet = tree
            .add_node(NodeDraft::portlet("Weather", weather), &column, None)
            .unwrap();
        let second = tree.add_node(NodeDraft::tab("Work"), &root, None).unwrap();

        let views = document_order(&tree);
        let ids: Vec<_> = views.iter().map(|v| v.id.clone()).collect();
        assert_eq!(ids, vec![root, tab, column, portlet, second]);
        assert_eq!(views[3].kind, "portlet");
        assert_eq!(views[3].content_id, Some(ContentId(3)));

        let json = serde_json::to_value(&views[1]).unwrap();
        assert_eq!(json["kind"], "tab");
        assert_eq!(json["addChildAllowed"], true);
        assert!(json.get("fragmentOwner").is_none());
    }
}
