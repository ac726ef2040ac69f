//! Storage-layer types for layout identity, subscriptions and content.
//!
//! [`ProfileId`] and [`LayoutKey`] are defined here (not in portlayout-core)
//! because a tree only gains a key when it is persisted for someone.

use std::fmt;

use serde::{Deserialize, Serialize};

use portlayout_core::{ContentId, UserId};

/// Numeric profile id. Every user has the default profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProfileId(pub u32);

/// The profile created for every user and used for fragments.
pub const DEFAULT_PROFILE: ProfileId = ProfileId(1);

impl Default for ProfileId {
    fn default() -> Self {
        DEFAULT_PROFILE
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The `(user, profile)` pair that keys layouts, preferences and locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayoutKey {
    pub user: UserId,
    pub profile: ProfileId,
}

impl LayoutKey {
    pub fn new(user: UserId, profile: ProfileId) -> Self {
        LayoutKey { user, profile }
    }

    /// The key of `user`'s default profile.
    pub fn default_for(user: UserId) -> Self {
        LayoutKey::new(user, DEFAULT_PROFILE)
    }
}

impl fmt::Display for LayoutKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user={}, profile={}", self.user, self.profile)
    }
}

/// Record linking a subscriber to a fragment owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentSubscription {
    pub subscriber: UserId,
    pub owner: UserId,
    /// Inactive subscriptions are kept but not merged into the layout.
    pub active: bool,
}

/// A published content definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDescriptor {
    pub id: ContentId,
    /// Functional name; unique across the registry.
    pub fname: String,
    pub title: String,
    pub description: String,
}
