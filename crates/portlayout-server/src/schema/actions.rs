//! Layout action request/response types.
//!
//! One [`LayoutAction`] variant per portal action, tagged by its `action`
//! field:
//!
//! ```json
//! { "action": "movePortlet", "sourceId": "n4", "elementId": "s3", "method": "insertBefore" }
//! ```

use serde::{Deserialize, Serialize};

use portlayout_core::{ContentId, NodeChanges, NodeId};

/// Where a moved or added node goes relative to the element it targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MoveMethod {
    /// Immediately before the target element.
    InsertBefore,
    /// At the end of the target's container.
    #[default]
    AppendAfter,
}

/// A structural edit request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum LayoutAction {
    /// Deletes a node, or cancels the subscription a fragment tab belongs to.
    #[serde(rename_all = "camelCase")]
    RemoveElement { element_id: NodeId },

    /// Adds a portlet for a published content definition.
    #[serde(rename_all = "camelCase")]
    AddPortlet {
        channel_id: ContentId,
        element_id: NodeId,
        #[serde(default)]
        position: MoveMethod,
    },

    #[serde(rename_all = "camelCase")]
    MovePortlet {
        source_id: NodeId,
        element_id: NodeId,
        #[serde(default)]
        method: MoveMethod,
    },

    #[serde(rename_all = "camelCase")]
    MoveTab {
        source_id: NodeId,
        element_id: NodeId,
        #[serde(default)]
        method: MoveMethod,
    },

    #[serde(rename_all = "camelCase")]
    RenameTab {
        tab_id: NodeId,
        #[serde(default)]
        tab_name: String,
    },

    /// Sets the number of columns of a tab; `columns` holds one width each.
    #[serde(rename_all = "camelCase")]
    ChangeColumns { tab_id: NodeId, columns: Vec<String> },

    #[serde(rename_all = "camelCase")]
    AddTab {
        #[serde(default)]
        tab_name: String,
        #[serde(default)]
        columns: Vec<String>,
    },

    /// Subscribes to the fragment owned by the user named `sourceId`.
    #[serde(rename_all = "camelCase")]
    SubscribeToTab {
        source_id: String,
        #[serde(default)]
        element_id: Option<NodeId>,
    },

    #[serde(rename_all = "camelCase")]
    UpdatePermissions {
        element_id: NodeId,
        #[serde(default)]
        deletable: Option<bool>,
        #[serde(default)]
        movable: Option<bool>,
        #[serde(default)]
        editable: Option<bool>,
        #[serde(default)]
        add_child_allowed: Option<bool>,
    },

    #[serde(rename_all = "camelCase")]
    ChooseSkin { skin_name: String },
}

impl LayoutAction {
    /// The wire name of the action, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            LayoutAction::RemoveElement { .. } => "removeElement",
            LayoutAction::AddPortlet { .. } => "addPortlet",
            LayoutAction::MovePortlet { .. } => "movePortlet",
            LayoutAction::MoveTab { .. } => "moveTab",
            LayoutAction::RenameTab { .. } => "renameTab",
            LayoutAction::ChangeColumns { .. } => "changeColumns",
            LayoutAction::AddTab { .. } => "addTab",
            LayoutAction::SubscribeToTab { .. } => "subscribeToTab",
            LayoutAction::UpdatePermissions { .. } => "updatePermissions",
            LayoutAction::ChooseSkin { .. } => "chooseSkin",
        }
    }

    /// The capability changes carried by `updatePermissions`.
    pub fn permission_changes(&self) -> Option<NodeChanges> {
        match self {
            LayoutAction::UpdatePermissions {
                deletable,
                movable,
                editable,
                add_child_allowed,
                ..
            } => Some(NodeChanges {
                deletable: *deletable,
                movable: *movable,
                editable: *editable,
                add_child_allowed: *add_child_allowed,
                ..NodeChanges::default()
            }),
            _ => None,
        }
    }
}

/// A single action plus the optional optimistic check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    #[serde(flatten)]
    pub action: LayoutAction,
    /// Layout hash the client last saw. The action is refused with a
    /// conflict if the stored layout no longer has this hash.
    #[serde(default)]
    pub expected_hash: Option<String>,
}

impl From<LayoutAction> for ActionRequest {
    fn from(action: LayoutAction) -> Self {
        ActionRequest {
            action,
            expected_hash: None,
        }
    }
}

/// Response from a committed action.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub success: bool,
    /// Id of the portlet created by `addPortlet`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_node_id: Option<NodeId>,
    /// Columns created by `changeColumns` or `addTab`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub new_column_ids: Vec<NodeId>,
    /// Id of the tab created by `addTab`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<NodeId>,
    /// Hash of the layout after the action.
    pub hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_tagged_actions() {
        let req: ActionRequest = serde_json::from_value(json!({
            "action": "movePortlet",
            "sourceId": "n4",
            "elementId": "s3",
            "method": "insertBefore",
            "expectedHash": "abc"
        }))
        .unwrap();
        assert_eq!(
            req.action,
            LayoutAction::MovePortlet {
                source_id: NodeId::portlet(4),
                element_id: NodeId::folder(3),
                method: MoveMethod::InsertBefore,
            }
        );
        assert_eq!(req.expected_hash.as_deref(), Some("abc"));
    }

    #[test]
    fn defaults_for_optional_fields() {
        let req: ActionRequest = serde_json::from_value(json!({
            "action": "addTab"
        }))
        .unwrap();
        assert_eq!(
            req.action,
            LayoutAction::AddTab {
                tab_name: String::new(),
                columns: Vec::new(),
            }
        );
        assert_eq!(req.expected_hash, None);

        let req: ActionRequest = serde_json::from_value(json!({
            "action": "addPortlet",
            "channelId": 7,
            "elementId": "s2"
        }))
        .unwrap();
        assert!(matches!(
            req.action,
            LayoutAction::AddPortlet { position: MoveMethod::AppendAfter, .. }
        ));
    }

    #[test]
    fn fragment_ids_parse_in_actions() {
        let req: ActionRequest = serde_json::from_value(json!({
            "action": "removeElement",
            "elementId": "u2l1s3"
        }))
        .unwrap();
        let LayoutAction::RemoveElement { element_id } = req.action else {
            panic!("wrong variant");
        };
        assert!(element_id.is_fragment());
    }

    #[test]
    fn rejects_unknown_actions_and_bad_ids() {
        assert!(serde_json::from_value::<ActionRequest>(json!({ "action": "explode" })).is_err());
        assert!(serde_json::from_value::<ActionRequest>(json!({
            "action": "removeElement",
            "elementId": ""
        }))
        .is_err());
    }

    #[test]
    fn permission_changes_only_carry_flags() {
        let action = LayoutAction::UpdatePermissions {
            element_id: NodeId::folder(2),
            deletable: Some(false),
            movable: None,
            editable: None,
            add_child_allowed: Some(true),
        };
        let changes = action.permission_changes().unwrap();
        assert_eq!(changes.deletable, Some(false));
        assert_eq!(changes.add_child_allowed, Some(true));
        assert_eq!(changes.name, None);
        assert!(LayoutAction::ChooseSkin {
            skin_name: "dark".into()
        }
        .permission_changes()
        .is_none());
    }

    #[test]
    fn response_omits_empty_fields() {
        let value = serde_json::to_value(ActionResponse {
            success: true,
            hash: "h".into(),
            ..ActionResponse::default()
        })
        .unwrap();
        assert_eq!(value, json!({ "success": true, "hash": "h" }));
    }
}
