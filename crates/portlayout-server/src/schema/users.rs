//! User registration request/response types.

use serde::{Deserialize, Serialize};

use portlayout_core::{NodeId, UserId};
use portlayout_storage::ProfileId;

/// Request to register a new portal user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    pub user_name: String,
}

/// Response from registering a user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserResponse {
    pub user_id: UserId,
    pub user_name: String,
    /// The profile that received the default layout.
    pub profile: ProfileId,
    /// The default layout's single tab.
    pub default_tab: NodeId,
}
