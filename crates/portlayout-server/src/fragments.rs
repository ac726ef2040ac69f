//! Fragment subscription manager.
//!
//! Subscribing records a [`FragmentSubscription`] and reloads the
//! subscriber's layout so the store merges the owner's tabs in; the merged
//! tabs are then moved next to the tab the user picked. Unsubscribing
//! deletes the record and reloads, which makes the fragment disappear.
//!
//! Both operations change the subscription record before the layout is
//! committed. The returned [`SubscriptionChange`] remembers the prior
//! record so the caller can put it back if the commit fails.

use tracing::{debug, warn};

use portlayout_core::{LayoutTree, NodeId, UserId};
use portlayout_storage::{
    FragmentSubscription, IdentityResolver, LayoutKey, LayoutStore, SubscriptionStore,
};

use crate::error::ApiError;
use crate::store::SharedStore;

/// A subscription record touched by an action, with its previous state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionChange {
    pub subscriber: UserId,
    pub owner: UserId,
    pub prior: Option<FragmentSubscription>,
}

impl SubscriptionChange {
    /// Restores the record to `prior`.
    pub fn rollback(&self, store: &SharedStore) -> Result<(), ApiError> {
        store.call(|s| {
            let current = s.get_subscription(self.subscriber, self.owner)?;
            match (self.prior, current) {
                (Some(prior), Some(current)) if prior != current => {
                    s.update_subscription(&prior)?
                }
                (Some(prior), None) => s.create_subscription(&prior)?,
                (None, Some(_)) => s.delete_subscription(self.subscriber, self.owner)?,
                _ => {}
            }
            Ok(())
        })
    }

    /// Like [`SubscriptionChange::rollback`], but only logs failures.
    pub fn rollback_or_warn(&self, store: &SharedStore) {
        if let Err(err) = self.rollback(store) {
            warn!(
                subscriber = %self.subscriber,
                owner = %self.owner,
                error = %err,
                "could not restore fragment subscription"
            );
        }
    }
}

/// Result of a subscription action: the new working copy and what changed.
#[derive(Debug)]
pub struct FragmentEdit {
    /// Replaces the caller's working copy.
    pub tree: LayoutTree,
    pub change: Option<SubscriptionChange>,
    /// Fragment tabs that were moved into place.
    pub moved: Vec<NodeId>,
    /// Nodes that are gone from the working copy.
    pub removed: Vec<NodeId>,
}

/// Subscribes `key.user` to `owner_name`'s fragment and places the merged
/// tabs immediately before `destination`, or at the end when no destination
/// is given.
pub fn subscribe(
    store: &SharedStore,
    key: LayoutKey,
    tree: &LayoutTree,
    owner_name: &str,
    destination: Option<&NodeId>,
) -> Result<FragmentEdit, ApiError> {
    let owner = store.call(|s| Ok(s.resolve_numeric_id(owner_name)?))?;
    if owner == key.user {
        return Err(ApiError::BadRequest(
            "a user cannot subscribe to their own fragment".to_string(),
        ));
    }
    if let Some(dest) = destination {
        if !tree.is_tab(dest) {
            return Err(ApiError::BadRequest(format!("{dest} is not a tab")));
        }
    }

    let subscriber = key.user;
    let prior = store.call(|s| {
        let prior = s.get_subscription(subscriber, owner)?;
        let active = FragmentSubscription {
            subscriber,
            owner,
            active: true,
        };
        match prior {
            None => s.create_subscription(&active)?,
            Some(existing) if !existing.active => s.update_subscription(&active)?,
            Some(_) => {}
        }
        Ok(prior)
    })?;
    let change = SubscriptionChange {
        subscriber,
        owner,
        prior,
    };

    match place_fragment(store, key, owner, destination) {
        Ok((tree, moved)) => Ok(FragmentEdit {
            tree,
            change: Some(change),
            moved,
            removed: Vec::new(),
        }),
        Err(err) => {
            change.rollback_or_warn(store);
            Err(err)
        }
    }
}

fn place_fragment(
    store: &SharedStore,
    key: LayoutKey,
    owner: UserId,
    destination: Option<&NodeId>,
) -> Result<(LayoutTree, Vec<NodeId>), ApiError> {
    debug!(%key, %owner, "reloading layout after subscribe");
    let mut tree = store.call(|s| Ok(s.load(key)?))?;

    let roots = tree.fragment_roots(owner);
    if let Some(dest) = destination {
        let root = tree.root_id().clone();
        for fragment_root in roots.iter().filter(|r| *r != dest) {
            tree.move_node(fragment_root, &root, Some(dest))?;
        }
    }
    Ok((tree, roots))
}

/// Removes `element_id` from `key.user`'s layout, cancelling the fragment
/// subscription it belongs to when there is one.
///
/// Ids outside the fragment namespace, and fragment ids whose owner has no
/// subscription record, fall back to an ordinary node deletion.
pub fn unsubscribe(
    store: &SharedStore,
    key: LayoutKey,
    tree: &LayoutTree,
    element_id: &NodeId,
) -> Result<FragmentEdit, ApiError> {
    let subscription = match element_id.fragment() {
        Some(origin) => find_subscription(store, key.user, origin.owner)?,
        None => None,
    };

    let Some(subscription) = subscription else {
        let mut work = tree.clone();
        let removed = work.delete_node(element_id)?;
        return Ok(FragmentEdit {
            tree: work,
            change: None,
            moved: Vec::new(),
            removed,
        });
    };

    let owner = subscription.owner;
    store.call(|s| Ok(s.delete_subscription(key.user, owner)?))?;
    let change = SubscriptionChange {
        subscriber: key.user,
        owner,
        prior: Some(subscription),
    };

    debug!(%key, %owner, "reloading layout after unsubscribe");
    match store.call(|s| Ok(s.load(key)?)) {
        Ok(reloaded) => {
            let removed: Vec<NodeId> = tree
                .node_ids()
                .into_iter()
                .filter(|id| !reloaded.contains(id))
                .collect();
            let dropped_own: Vec<String> = removed
                .iter()
                .filter(|id| !id.is_fragment())
                .map(NodeId::to_string)
                .collect();
            if !dropped_own.is_empty() {
                warn!(
                    %key,
                    %owner,
                    nodes = %dropped_own.join(","),
                    "own nodes placed inside the fragment were dropped with it"
                );
            }
            Ok(FragmentEdit {
                tree: reloaded,
                change: Some(change),
                moved: Vec::new(),
                removed,
            })
        }
        Err(err) => {
            change.rollback_or_warn(store);
            Err(err)
        }
    }
}

/// The subscription linking `subscriber` to `owner`, if the owner still
/// exists and the record does.
fn find_subscription(
    store: &SharedStore,
    subscriber: UserId,
    owner: UserId,
) -> Result<Option<FragmentSubscription>, ApiError> {
    store.call(|s| match s.user_name(owner) {
        Ok(_) => Ok(s.get_subscription(subscriber, owner)?),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err.into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use portlayout_core::{ContentId, NodeDraft, PortletRef};
    use portlayout_storage::{InMemoryStore, DEFAULT_PROFILE};

    fn layout_with_tabs(names: &[&str]) -> LayoutTree {
        let mut tree = LayoutTree::new("Layout");
        let root = tree.root_id().clone();
        for name in names {
            let tab = tree.add_node(NodeDraft::tab(name), &root, None).unwrap();
            tree.add_node(NodeDraft::column(), &tab, None).unwrap();
        }
        tree
    }

    /// `ada` owns one tab, `bob` owns two.
    fn setup() -> (SharedStore, UserId, UserId) {
        let mut mem = InMemoryStore::new();
        let ada = mem.register_user("ada").unwrap();
        let bob = mem.register_user("bob").unwrap();
        mem.save(LayoutKey::default_for(ada), &layout_with_tabs(&["Mine"]))
            .unwrap();
        mem.save(LayoutKey::default_for(bob), &layout_with_tabs(&["News", "Sport"]))
            .unwrap();
        (SharedStore::new(Box::new(mem)), ada, bob)
    }

    fn load(store: &SharedStore, user: UserId) -> LayoutTree {
        store
            .call(|s| Ok(s.load(LayoutKey::default_for(user))?))
            .unwrap()
    }

    fn subscription(
        store: &SharedStore,
        subscriber: UserId,
        owner: UserId,
    ) -> Option<FragmentSubscription> {
        store
            .call(|s| Ok(s.get_subscription(subscriber, owner)?))
            .unwrap()
    }

    #[test]
    fn subscribe_places_fragment_before_destination() {
        let (store, ada, bob) = setup();
        let key = LayoutKey::new(ada, DEFAULT_PROFILE);
        let tree = load(&store, ada);
        let mine = tree.tabs()[0].clone();

        let edit = subscribe(&store, key, &tree, "bob", Some(&mine)).unwrap();

        assert_eq!(edit.moved.len(), 2);
        let tabs = edit.tree.tabs();
        assert_eq!(tabs.len(), 3);
        assert!(tabs[0].is_owned_by(bob));
        assert!(tabs[1].is_owned_by(bob));
        assert_eq!(tabs[2], mine);
        assert_eq!(edit.tree.get_node(&tabs[0]).unwrap().name, "News");
        assert!(subscription(&store, ada, bob).unwrap().active);
        assert_eq!(edit.change.unwrap().prior, None);
    }

    #[test]
    fn subscribe_without_destination_appends() {
        let (store, ada, bob) = setup();
        let key = LayoutKey::default_for(ada);
        let tree = load(&store, ada);

        let edit = subscribe(&store, key, &tree, "bob", None).unwrap();
        let tabs = edit.tree.tabs();
        assert!(!tabs[0].is_fragment());
        assert!(tabs[1].is_owned_by(bob));
    }

    #[test]
    fn subscribe_reactivates_inactive_record() {
        let (store, ada, bob) = setup();
        let inactive = FragmentSubscription {
            subscriber: ada,
            owner: bob,
            active: false,
        };
        store
            .call(|s| Ok(s.create_subscription(&inactive)?))
            .unwrap();
        assert_eq!(load(&store, ada).tabs().len(), 1);

        let tree = load(&store, ada);
        let edit = subscribe(&store, LayoutKey::default_for(ada), &tree, "bob", None).unwrap();
        assert!(subscription(&store, ada, bob).unwrap().active);
        assert_eq!(edit.change.clone().unwrap().prior, Some(inactive));

        edit.change.unwrap().rollback(&store).unwrap();
        assert_eq!(subscription(&store, ada, bob), Some(inactive));
    }

    #[test]
    fn subscribe_rejects_unknown_owner_and_self() {
        let (store, ada, _) = setup();
        let key = LayoutKey::default_for(ada);
        let tree = load(&store, ada);
        assert!(matches!(
            subscribe(&store, key, &tree, "nobody", None),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            subscribe(&store, key, &tree, "ada", None),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn subscribe_requires_tab_destination() {
        let (store, ada, bob) = setup();
        let tree = load(&store, ada);
        let column = tree.columns(&tree.tabs()[0]).unwrap()[0].clone();
        let result = subscribe(&store, LayoutKey::default_for(ada), &tree, "bob", Some(&column));
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
        assert_eq!(subscription(&store, ada, bob), None);
    }

    #[test]
    fn rollback_removes_new_record() {
        let (store, ada, bob) = setup();
        let tree = load(&store, ada);
        let edit = subscribe(&store, LayoutKey::default_for(ada), &tree, "bob", None).unwrap();
        edit.change.unwrap().rollback(&store).unwrap();
        assert_eq!(subscription(&store, ada, bob), None);
    }

    #[test]
    fn unsubscribe_round_trips_node_set() {
        let (store, ada, bob) = setup();
        let key = LayoutKey::default_for(ada);
        let before = load(&store, ada);

        let subscribed = subscribe(&store, key, &before, "bob", None).unwrap();
        store
            .call(|s| Ok(s.save(key, &subscribed.tree)?))
            .unwrap();
        let fragment_root = subscribed.moved[0].clone();

        let edit = unsubscribe(&store, key, &subscribed.tree, &fragment_root).unwrap();
        assert_eq!(edit.tree.node_ids(), before.node_ids());
        assert!(edit.removed.iter().all(|id| id.is_owned_by(bob)));
        assert_eq!(edit.removed.len(), 4);
        assert_eq!(subscription(&store, ada, bob), None);
    }

    #[test]
    fn own_nodes_inside_fragment_leave_with_it() {
        let (store, ada, _) = setup();
        let key = LayoutKey::default_for(ada);
        let before = load(&store, ada);

        let subscribed = subscribe(&store, key, &before, "bob", None).unwrap();
        let mut tree = subscribed.tree;
        let fragment_root = subscribed.moved[0].clone();
        let column = tree.columns(&fragment_root).unwrap()[0].clone();
        let mine = tree
            .add_node(
                NodeDraft::portlet(
                    "Notes",
                    PortletRef {
                        content_id: ContentId(1),
                        fname: "notes".into(),
                    },
                ),
                &column,
                None,
            )
            .unwrap();
        store.call(|s| Ok(s.save(key, &tree)?)).unwrap();
        assert!(load(&store, ada).contains(&mine));

        let edit = unsubscribe(&store, key, &tree, &fragment_root).unwrap();
        assert!(edit.removed.contains(&mine));
        assert!(!edit.tree.contains(&mine));
        assert_eq!(edit.tree.node_ids(), before.node_ids());
    }

    #[test]
    fn plain_ids_are_deleted_directly() {
        let (store, ada, _) = setup();
        let tree = load(&store, ada);
        let tab = tree.tabs()[0].clone();

        let edit = unsubscribe(&store, LayoutKey::default_for(ada), &tree, &tab).unwrap();
        assert!(edit.change.is_none());
        assert_eq!(edit.removed.len(), 2);
        assert!(edit.tree.tabs().is_empty());
    }

    #[test]
    fn fragment_id_without_record_falls_back_to_delete() {
        let (store, ada, bob) = setup();
        let key = LayoutKey::default_for(ada);
        let tree = load(&store, ada);
        let subscribed = subscribe(&store, key, &tree, "bob", None).unwrap();
        store
            .call(|s| Ok(s.delete_subscription(ada, bob)?))
            .unwrap();

        // Merged fragment tabs are not deletable.
        let fragment_root = subscribed.moved[0].clone();
        let result = unsubscribe(&store, key, &subscribed.tree, &fragment_root);
        assert!(matches!(result, Err(ApiError::PermissionDenied(_))));
    }
}
