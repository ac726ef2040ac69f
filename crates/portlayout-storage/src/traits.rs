//! The storage contracts used by the layout service.
//!
//! Four narrow traits, one per collaborator the service talks to:
//! - [`LayoutStore`]: layout snapshots and their preferences
//! - [`SubscriptionStore`]: fragment subscription records
//! - [`IdentityResolver`]: user names to numeric identities
//! - [`ContentRegistry`]: published content definitions
//!
//! [`PortalStore`] bundles them so a backend can be injected as one object.
//! All traits are synchronous; callers in async contexts move store calls
//! onto a blocking thread.

use portlayout_core::{ContentId, LayoutTree, StructurePreferences, ThemePreferences, UserId};

use crate::error::StorageError;
use crate::types::{ContentDescriptor, FragmentSubscription, LayoutKey};

/// Persistence of layout snapshots.
pub trait LayoutStore {
    /// Loads the merged view of a layout: the user's own nodes plus the
    /// fragments of every active subscription.
    fn load(&self, key: LayoutKey) -> Result<LayoutTree, StorageError>;

    /// Replaces the stored snapshot with `tree`. Fragment nodes are not
    /// stored; only their positions among the user's own nodes are.
    fn save(&mut self, key: LayoutKey, tree: &LayoutTree) -> Result<(), StorageError>;

    /// Saves `tree` and, if given, the structure preferences as one unit.
    ///
    /// The default implementation is not atomic; backends that can do
    /// better override it.
    fn commit(
        &mut self,
        key: LayoutKey,
        tree: &LayoutTree,
        prefs: Option<&StructurePreferences>,
    ) -> Result<(), StorageError> {
        self.save(key, tree)?;
        if let Some(prefs) = prefs {
            self.set_structure_preferences(key, prefs)?;
        }
        Ok(())
    }

    fn structure_preferences(&self, key: LayoutKey) -> Result<StructurePreferences, StorageError>;

    fn set_structure_preferences(
        &mut self,
        key: LayoutKey,
        prefs: &StructurePreferences,
    ) -> Result<(), StorageError>;

    fn theme_preferences(&self, key: LayoutKey) -> Result<ThemePreferences, StorageError>;

    fn set_theme_preferences(
        &mut self,
        key: LayoutKey,
        prefs: &ThemePreferences,
    ) -> Result<(), StorageError>;
}

/// Fragment subscription records.
pub trait SubscriptionStore {
    fn get_subscription(
        &self,
        subscriber: UserId,
        owner: UserId,
    ) -> Result<Option<FragmentSubscription>, StorageError>;

    /// Fails with an integrity error if the pair is already subscribed.
    fn create_subscription(&mut self, sub: &FragmentSubscription) -> Result<(), StorageError>;

    /// Fails with `SubscriptionNotFound` if the pair has no record.
    fn update_subscription(&mut self, sub: &FragmentSubscription) -> Result<(), StorageError>;

    /// Fails with `SubscriptionNotFound` if the pair has no record.
    fn delete_subscription(&mut self, subscriber: UserId, owner: UserId)
        -> Result<(), StorageError>;

    /// Every subscription held by `subscriber`, ordered by owner.
    fn subscriptions_for(
        &self,
        subscriber: UserId,
    ) -> Result<Vec<FragmentSubscription>, StorageError>;
}

/// User name to numeric identity resolution.
pub trait IdentityResolver {
    /// Stable across calls for the same name.
    fn resolve_numeric_id(&self, user_name: &str) -> Result<UserId, StorageError>;

    fn user_name(&self, id: UserId) -> Result<String, StorageError>;

    /// Creates a user. Fails with an integrity error if the name is taken.
    fn register_user(&mut self, user_name: &str) -> Result<UserId, StorageError>;
}

/// Published content definitions.
pub trait ContentRegistry {
    fn definition_for(&self, id: ContentId) -> Result<ContentDescriptor, StorageError>;

    /// Publishes a new definition. Fails with an integrity error if `fname`
    /// is already taken.
    fn publish(
        &mut self,
        fname: &str,
        title: &str,
        description: &str,
    ) -> Result<ContentDescriptor, StorageError>;
}

/// Everything the layout service needs from a backend.
pub trait PortalStore:
    LayoutStore + SubscriptionStore + IdentityResolver + ContentRegistry + Send
{
}

impl<T> PortalStore for T where
    T: LayoutStore + SubscriptionStore + IdentityResolver + ContentRegistry + Send
{
}
