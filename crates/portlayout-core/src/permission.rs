//! Permission guard: capability checks consulted by every mutation.
//!
//! Flags are plain booleans on each node. There is no inheritance from
//! parent nodes and no role hierarchy; a check looks at exactly one flag on
//! exactly one node.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::node::LayoutNode;

/// A capability that a mutation requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Delete,
    Move,
    Edit,
    AddChild,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Delete => "delete",
            Capability::Move => "move",
            Capability::Edit => "edit",
            Capability::AddChild => "add child",
        };
        f.write_str(s)
    }
}

/// Whether `node` grants `capability`.
pub fn allows(node: &LayoutNode, capability: Capability) -> bool {
    let caps = &node.capabilities;
    match capability {
        Capability::Delete => caps.deletable,
        Capability::Move => caps.movable,
        Capability::Edit => caps.editable,
        Capability::AddChild => caps.add_child_allowed,
    }
}

/// Fails with [`CoreError::PermissionDenied`] unless `node` grants
/// `capability`.
pub fn require(node: &LayoutNode, capability: Capability) -> Result<(), CoreError> {
    if allows(node, capability) {
        Ok(())
    } else {
        Err(CoreError::PermissionDenied {
            id: node.id.clone(),
            capability,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::NodeId;
    use crate::node::{Capabilities, NodeKind};

    fn tab_with(capabilities: Capabilities) -> LayoutNode {
        LayoutNode {
            id: NodeId::folder(4),
            name: "Tab".into(),
            kind: NodeKind::Tab,
            parent: Some(NodeId::root()),
            children: Vec::new(),
            capabilities,
            hidden: false,
        }
    }

    #[test]
    fn each_flag_guards_one_capability() {
        let node = tab_with(Capabilities {
            deletable: false,
            movable: true,
            editable: false,
            add_child_allowed: true,
        });
        assert!(!allows(&node, Capability::Delete));
        assert!(allows(&node, Capability::Move));
        assert!(!allows(&node, Capability::Edit));
        assert!(allows(&node, Capability::AddChild));
    }

    #[test]
    fn require_reports_the_failed_capability() {
        let node = tab_with(Capabilities {
            movable: false,
            ..Capabilities::ALL
        });
        match require(&node, Capability::Move) {
            Err(CoreError::PermissionDenied { id, capability }) => {
                assert_eq!(id, NodeId::folder(4));
                assert_eq!(capability, Capability::Move);
            }
            other => panic!("expected PermissionDenied, got {other:?}"),
        }
        assert!(require(&node, Capability::Delete).is_ok());
    }
}
