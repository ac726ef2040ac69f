//! In-memory implementation of the storage traits.
//!
//! [`InMemoryStore`] is a first-class backend for tests and ephemeral
//! servers. It keeps decomposed snapshots in maps, so it goes through the
//! same decompose/recompose path as the SQLite backend and merges fragments
//! the same way.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use portlayout_core::{
    ContentId, FragmentOrigin, LayoutTree, StructurePreferences, ThemePreferences, UserId,
};

use crate::convert::{decompose, recompose, DecomposedLayout};
use crate::error::StorageError;
use crate::traits::{ContentRegistry, IdentityResolver, LayoutStore, SubscriptionStore};
use crate::types::{ContentDescriptor, FragmentSubscription, LayoutKey, DEFAULT_PROFILE};

/// Map-backed store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    users: BTreeMap<UserId, String>,
    next_user_id: u32,
    layouts: HashMap<LayoutKey, DecomposedLayout>,
    structure: HashMap<LayoutKey, StructurePreferences>,
    themes: HashMap<LayoutKey, ThemePreferences>,
    /// `(subscriber, owner) -> active`
    subscriptions: BTreeMap<(UserId, UserId), bool>,
    content: BTreeMap<ContentId, ContentDescriptor>,
    next_content_id: u32,
    reject_writes: WriteFailureSwitch,
    reject_layout_writes: WriteFailureSwitch,
}

/// Shared handle that makes an [`InMemoryStore`] reject writes.
///
/// Cloned handles control the same store, so a test can keep one after the
/// store has been boxed and handed to a service.
#[derive(Debug, Clone, Default)]
pub struct WriteFailureSwitch(Arc<AtomicBool>);

impl WriteFailureSwitch {
    pub fn set(&self, reject: bool) {
        self.0.store(reject, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with `WriteRejected` (or succeed
    /// again with `false`). Reads are unaffected.
    pub fn set_write_failure(&self, reject: bool) {
        self.reject_writes.set(reject);
    }

    /// A handle to the same switch as [`InMemoryStore::set_write_failure`].
    pub fn write_failure_switch(&self) -> WriteFailureSwitch {
        self.reject_writes.clone()
    }

    /// Like [`InMemoryStore::write_failure_switch`], but only layout and
    /// preference writes fail. Subscription, identity and content writes
    /// still succeed.
    pub fn layout_write_failure_switch(&self) -> WriteFailureSwitch {
        self.reject_layout_writes.clone()
    }

    fn check_layout_writable(&self) -> Result<(), StorageError> {
        self.check_writable()?;
        if self.reject_layout_writes.is_set() {
            return Err(StorageError::WriteRejected {
                reason: "store is rejecting layout writes".to_string(),
            });
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.reject_writes.is_set() {
            return Err(StorageError::WriteRejected {
                reason: "store is rejecting writes".to_string(),
            });
        }
        Ok(())
    }

    fn require_user(&self, id: UserId) -> Result<(), StorageError> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(StorageError::UserIdNotFound(id))
        }
    }
}

impl LayoutStore for InMemoryStore {
    fn load(&self, key: LayoutKey) -> Result<LayoutTree, StorageError> {
        let own = self
            .layouts
            .get(&key)
            .ok_or(StorageError::LayoutNotFound(key))?;

        let mut fragments = Vec::new();
        for (&(subscriber, owner), &active) in &self.subscriptions {
            if subscriber != key.user || !active {
                continue;
            }
            if let Some(layout) = self.layouts.get(&LayoutKey::new(owner, DEFAULT_PROFILE)) {
                let origin = FragmentOrigin {
                    owner,
                    layout: DEFAULT_PROFILE.0,
                };
                fragments.push((origin, layout));
            }
        }
        recompose(own, &fragments)
    }

    fn save(&mut self, key: LayoutKey, tree: &LayoutTree) -> Result<(), StorageError> {
        self.check_layout_writable()?;
        self.require_user(key.user)?;
        self.layouts.insert(key, decompose(tree));
        Ok(())
    }

    fn commit(
        &mut self,
        key: LayoutKey,
        tree: &LayoutTree,
        prefs: Option<&StructurePreferences>,
    ) -> Result<(), StorageError> {
        self.check_layout_writable()?;
        self.require_user(key.user)?;
        self.layouts.insert(key, decompose(tree));
        if let Some(prefs) = prefs {
            self.structure.insert(key, prefs.clone());
        }
        Ok(())
    }

    fn structure_preferences(&self, key: LayoutKey) -> Result<StructurePreferences, StorageError> {
        Ok(self.structure.get(&key).cloned().unwrap_or_default())
    }

    fn set_structure_preferences(
        &mut self,
        key: LayoutKey,
        prefs: &StructurePreferences,
    ) -> Result<(), StorageError> {
        self.check_layout_writable()?;
        self.require_user(key.user)?;
        self.structure.insert(key, prefs.clone());
        Ok(())
    }

    fn theme_preferences(&self, key: LayoutKey) -> Result<ThemePreferences, StorageError> {
        Ok(self.themes.get(&key).cloned().unwrap_or_default())
    }

    fn set_theme_preferences(
        &mut self,
        key: LayoutKey,
        prefs: &ThemePreferences,
    ) -> Result<(), StorageError> {
        self.check_layout_writable()?;
        self.require_user(key.user)?;
        self.themes.insert(key, prefs.clone());
        Ok(())
    }
}

impl SubscriptionStore for InMemoryStore {
    fn get_subscription(
        &self,
        subscriber: UserId,
        owner: UserId,
    ) -> Result<Option<FragmentSubscription>, StorageError> {
        Ok(self
            .subscriptions
            .get(&(subscriber, owner))
            .map(|&active| FragmentSubscription {
                subscriber,
                owner,
                active,
            }))
    }

    fn create_subscription(&mut self, sub: &FragmentSubscription) -> Result<(), StorageError> {
        self.check_writable()?;
        self.require_user(sub.subscriber)?;
        self.require_user(sub.owner)?;
        let key = (sub.subscriber, sub.owner);
        if self.subscriptions.contains_key(&key) {
            return Err(StorageError::IntegrityError {
                reason: format!(
                    "user {} is already subscribed to user {}",
                    sub.subscriber, sub.owner
                ),
            });
        }
        self.subscriptions.insert(key, sub.active);
        Ok(())
    }

    fn update_subscription(&mut self, sub: &FragmentSubscription) -> Result<(), StorageError> {
        self.check_writable()?;
        match self.subscriptions.get_mut(&(sub.subscriber, sub.owner)) {
            Some(active) => {
                *active = sub.active;
                Ok(())
            }
            None => Err(StorageError::SubscriptionNotFound {
                subscriber: sub.subscriber,
                owner: sub.owner,
            }),
        }
    }

    fn delete_subscription(
        &mut self,
        subscriber: UserId,
        owner: UserId,
    ) -> Result<(), StorageError> {
        self.check_writable()?;
        self.subscriptions
            .remove(&(subscriber, owner))
            .map(|_| ())
            .ok_or(StorageError::SubscriptionNotFound { subscriber, owner })
    }

    fn subscriptions_for(
        &self,
        subscriber: UserId,
    ) -> Result<Vec<FragmentSubscription>, StorageError> {
        Ok(self
            .subscriptions
            .iter()
            .filter(|((s, _), _)| *s == subscriber)
            .map(|(&(subscriber, owner), &active)| FragmentSubscription {
                subscriber,
                owner,
                active,
            })
            .collect())
    }
}

impl IdentityResolver for InMemoryStore {
    fn resolve_numeric_id(&self, user_name: &str) -> Result<UserId, StorageError> {
        self.users
            .iter()
            .find(|(_, name)| name.as_str() == user_name)
            .map(|(&id, _)| id)
            .ok_or_else(|| StorageError::UserNotFound(user_name.to_string()))
    }

    fn user_name(&self, id: UserId) -> Result<String, StorageError> {
        self.users
            .get(&id)
            .cloned()
            .ok_or(StorageError::UserIdNotFound(id))
    }

    fn register_user(&mut self, user_name: &str) -> Result<UserId, StorageError> {
        self.check_writable()?;
        if self.users.values().any(|name| name == user_name) {
            return Err(StorageError::IntegrityError {
                reason: format!("user name '{user_name}' is taken"),
            });
        }
        self.next_user_id += 1;
        let id = UserId(self.next_user_id);
        self.users.insert(id, user_name.to_string());
        Ok(id)
    }
}

impl ContentRegistry for InMemoryStore {
    fn definition_for(&self, id: ContentId) -> Result<ContentDescriptor, StorageError> {
        self.content
            .get(&id)
            .cloned()
            .ok_or(StorageError::ContentNotFound(id))
    }

    fn publish(
        &mut self,
        fname: &str,
        title: &str,
        description: &str,
    ) -> Result<ContentDescriptor, StorageError> {
        self.check_writable()?;
        if self.content.values().any(|c| c.fname == fname) {
            return Err(StorageError::IntegrityError {
                reason: format!("content '{fname}' is already published"),
            });
        }
        self.next_content_id += 1;
        let descriptor = ContentDescriptor {
            id: ContentId(self.next_content_id),
            fname: fname.to_string(),
            title: title.to_string(),
            description: description.to_string(),
        };
        self.content.insert(descriptor.id, descriptor.clone());
        Ok(descriptor)
    }
}
