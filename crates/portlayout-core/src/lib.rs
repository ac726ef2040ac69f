pub mod id;
pub mod error;
pub mod node;
pub mod permission;
pub mod preferences;
pub mod reflow;
pub mod tree;

// Re-export commonly used types
pub use id::{ContentId, FragmentOrigin, NodeId, UserId};
pub use error::CoreError;
pub use node::{
    Capabilities, LayoutNode, NodeChanges, NodeDraft, NodeKind, PortletRef, DEFAULT_COLUMN_NAME,
    DEFAULT_TAB_NAME,
};
pub use permission::Capability;
pub use preferences::{StructurePreferences, ThemePreferences};
pub use reflow::{change_column_count, ReflowOutcome};
pub use tree::LayoutTree;
