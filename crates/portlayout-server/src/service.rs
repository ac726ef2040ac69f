//! LayoutService: the single coordinator between HTTP handlers and the
//! layout model.
//!
//! Every action runs as lock, load, mutate, commit:
//!
//! 1. take the [`LayoutLockManager`] guard for the `(user, profile)` key,
//! 2. load a fresh working copy (tree and structure preferences),
//! 3. apply the action to the working copy only,
//! 4. commit the whole working copy in one store call.
//!
//! A rejected action or a failed commit drops the working copy, so the
//! stored layout is either fully updated or untouched. Subscription records
//! changed by the action are restored when the commit fails.
//!
//! All methods block on the store and the layout lock; async callers run
//! them through `spawn_blocking`.

use tracing::{info, warn};

use portlayout_core::preferences::SKIN;
use portlayout_core::{
    change_column_count, LayoutTree, NodeChanges, NodeDraft, NodeId, PortletRef,
    StructurePreferences, ThemePreferences, UserId, DEFAULT_TAB_NAME,
};
use portlayout_storage::{
    layout_hash_hex, ContentDescriptor, ContentRegistry, IdentityResolver, LayoutKey,
    LayoutStore, PortalStore, ProfileId, SubscriptionStore, DEFAULT_PROFILE,
};

use crate::concurrency::LayoutLockManager;
use crate::error::ApiError;
use crate::fragments::{self, SubscriptionChange};
use crate::schema::actions::{ActionRequest, ActionResponse, LayoutAction, MoveMethod};
use crate::schema::layout::{document_order, LayoutView, SubscriptionListResponse, SubscriptionView};
use crate::schema::users::RegisterUserResponse;
use crate::store::SharedStore;

/// The anonymous user. Guests may look at nothing and edit nothing.
pub const GUEST_USER: &str = "guest";

/// Name of the tab in a newly registered user's layout.
pub const HOME_TAB_NAME: &str = "Home";

const ROOT_FOLDER_NAME: &str = "Layout";

pub fn is_guest(user_name: &str) -> bool {
    user_name.trim().eq_ignore_ascii_case(GUEST_USER)
}

/// Mutable state of one action. Dropped without a trace unless committed.
struct WorkingCopy {
    tree: LayoutTree,
    prefs: StructurePreferences,
    prefs_dirty: bool,
    theme: Option<ThemePreferences>,
    subscription: Option<SubscriptionChange>,
}

impl WorkingCopy {
    fn forget_nodes(&mut self, removed: &[NodeId]) {
        for id in removed {
            self.prefs.remove_node(id);
        }
        self.prefs_dirty |= !removed.is_empty();
    }
}

/// Where a portlet goes for a given destination element.
enum PortletTarget {
    /// A tab: its columns in order.
    Columns(Vec<NodeId>),
    /// A tab without columns; one has to be created first.
    EmptyTab(NodeId),
    /// A column, or the column of a portlet (optionally before it).
    Slot {
        parent: NodeId,
        sibling: Option<NodeId>,
    },
}

pub struct LayoutService {
    store: SharedStore,
    locks: LayoutLockManager,
}

impl LayoutService {
    pub fn new(store: Box<dyn PortalStore>) -> Self {
        LayoutService {
            store: SharedStore::new(store),
            locks: LayoutLockManager::new(),
        }
    }

    pub fn locks(&self) -> &LayoutLockManager {
        &self.locks
    }

    // -----------------------------------------------------------------------
    // Users, content and reads
    // -----------------------------------------------------------------------

    /// Registers a user and gives them the default layout: one tab with one
    /// full-width column.
    pub fn register_user(&self, user_name: &str) -> Result<RegisterUserResponse, ApiError> {
        let name = user_name.trim();
        if name.is_empty() {
            return Err(ApiError::BadRequest("user name must not be blank".to_string()));
        }
        if is_guest(name) {
            return Err(ApiError::BadRequest(format!("'{name}' is reserved")));
        }

        let mut tree = LayoutTree::new(ROOT_FOLDER_NAME);
        let root = tree.root_id().clone();
        let tab = tree.add_node(NodeDraft::tab(HOME_TAB_NAME), &root, None)?;
        let column = tree.add_node(NodeDraft::column(), &tab, None)?;
        let mut prefs = StructurePreferences::new();
        prefs.set_width(&column, "100%");

        let user_id = self.store.call(|s| {
            let id = s.register_user(name)?;
            s.commit(LayoutKey::default_for(id), &tree, Some(&prefs))?;
            Ok(id)
        })?;
        info!(user = %user_id, user_name = name, "registered user");

        Ok(RegisterUserResponse {
            user_id,
            user_name: name.to_string(),
            profile: DEFAULT_PROFILE,
            default_tab: tab,
        })
    }

    pub fn publish(
        &self,
        fname: &str,
        title: &str,
        description: &str,
    ) -> Result<ContentDescriptor, ApiError> {
        let fname = fname.trim();
        if fname.is_empty() {
            return Err(ApiError::BadRequest("fname must not be blank".to_string()));
        }
        let descriptor = self
            .store
            .call(|s| Ok(s.publish(fname, title, description)?))?;
        info!(content = %descriptor.id, fname, "published content");
        Ok(descriptor)
    }

    /// The merged layout of `user_name` with its hash and preferences.
    pub fn layout(&self, user_name: &str, profile: ProfileId) -> Result<LayoutView, ApiError> {
        let user = self.resolve_actor(user_name)?;
        let key = LayoutKey::new(user, profile);
        let (tree, structure, theme) = self.store.call(|s| {
            Ok((
                s.load(key)?,
                s.structure_preferences(key)?,
                s.theme_preferences(key)?,
            ))
        })?;
        Ok(LayoutView {
            user_id: user,
            user_name: user_name.trim().to_string(),
            profile,
            hash: layout_hash_hex(&tree),
            root: tree.root_id().clone(),
            nodes: document_order(&tree),
            structure,
            theme,
        })
    }

    pub fn subscriptions(&self, user_name: &str) -> Result<SubscriptionListResponse, ApiError> {
        let user = self.resolve_actor(user_name)?;
        let subscriptions = self.store.call(|s| {
            s.subscriptions_for(user)?
                .into_iter()
                .map(|sub| -> Result<SubscriptionView, ApiError> {
                    Ok(SubscriptionView {
                        owner_id: sub.owner,
                        owner_name: s.user_name(sub.owner)?,
                        active: sub.active,
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })?;
        Ok(SubscriptionListResponse {
            subscriber_id: user,
            subscriptions,
        })
    }

    /// The numeric id of an acting user. Guests and unknown names are
    /// unauthorized.
    fn resolve_actor(&self, user_name: &str) -> Result<UserId, ApiError> {
        let name = user_name.trim();
        if name.is_empty() || is_guest(name) {
            return Err(ApiError::Unauthorized(
                "layouts can only be changed by a signed-in user".to_string(),
            ));
        }
        self.store.call(|s| match s.resolve_numeric_id(name) {
            Ok(id) => Ok(id),
            Err(err) if err.is_not_found() => {
                Err(ApiError::Unauthorized(format!("unknown user '{name}'")))
            }
            Err(err) => Err(err.into()),
        })
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Applies one action to `user_name`'s layout and commits it.
    pub fn apply(
        &self,
        user_name: &str,
        profile: ProfileId,
        request: ActionRequest,
    ) -> Result<ActionResponse, ApiError> {
        let user = self.resolve_actor(user_name)?;
        let key = LayoutKey::new(user, profile);
        let action = request.action.name();
        let _guard = self.locks.lock(key);

        let (tree, prefs) =
            self.store
                .call(|s| Ok((s.load(key)?, s.structure_preferences(key)?)))?;
        if let Some(expected) = &request.expected_hash {
            let actual = layout_hash_hex(&tree);
            if *expected != actual {
                warn!(%key, action, "refusing action on a stale layout");
                return Err(ApiError::Conflict(format!(
                    "layout hash is {actual}, expected {expected}"
                )));
            }
        }

        let mut work = WorkingCopy {
            tree,
            prefs,
            prefs_dirty: false,
            theme: None,
            subscription: None,
        };
        let mut response = match self.dispatch(key, &mut work, &request.action) {
            Ok(response) => response,
            Err(err) => {
                if let Some(change) = work.subscription.take() {
                    change.rollback_or_warn(&self.store);
                }
                warn!(%key, action, error = %err, "layout action rejected");
                return Err(err);
            }
        };

        if let Err(err) = self.commit(key, &work) {
            if let Some(change) = &work.subscription {
                change.rollback_or_warn(&self.store);
            }
            warn!(%key, action, error = %err, "failed to persist layout; edit discarded");
            return Err(match err {
                err @ ApiError::PersistenceFailure(_) => err,
                other => ApiError::PersistenceFailure(other.to_string()),
            });
        }

        response.success = true;
        response.hash = layout_hash_hex(&work.tree);
        info!(%key, action, hash = %response.hash, "committed layout action");
        Ok(response)
    }

    fn commit(&self, key: LayoutKey, work: &WorkingCopy) -> Result<(), ApiError> {
        let prefs = work.prefs_dirty.then_some(&work.prefs);
        self.store.call(|s| {
            s.commit(key, &work.tree, prefs)?;
            if let Some(theme) = &work.theme {
                s.set_theme_preferences(key, theme)?;
            }
            Ok(())
        })
    }

    fn dispatch(
        &self,
        key: LayoutKey,
        work: &mut WorkingCopy,
        action: &LayoutAction,
    ) -> Result<ActionResponse, ApiError> {
        let mut response = ActionResponse::default();
        match action {
            LayoutAction::RemoveElement { element_id } => {
                let node = work.tree.get_node(element_id)?;
                if element_id.is_fragment() && node.kind.is_folder() {
                    let edit = fragments::unsubscribe(&self.store, key, &work.tree, element_id)?;
                    work.tree = edit.tree;
                    work.subscription = edit.change;
                    work.forget_nodes(&edit.removed);
                } else {
                    let removed = work.tree.delete_node(element_id)?;
                    work.forget_nodes(&removed);
                }
            }

            LayoutAction::AddPortlet {
                channel_id,
                element_id,
                position,
            } => {
                let definition = self.store.call(|s| Ok(s.definition_for(*channel_id)?))?;
                let draft = NodeDraft::portlet(
                    &definition.title,
                    PortletRef {
                        content_id: definition.id,
                        fname: definition.fname,
                    },
                );
                let id = add_portlet(&mut work.tree, draft, element_id, *position)?;
                response.new_node_id = Some(id);
            }

            LayoutAction::MovePortlet {
                source_id,
                element_id,
                method,
            } => {
                if !work.tree.get_node(source_id)?.kind.is_folder() {
                    move_portlet(&mut work.tree, source_id, element_id, *method)?;
                } else {
                    return Err(ApiError::BadRequest(format!("{source_id} is not a portlet")));
                }
            }

            LayoutAction::MoveTab {
                source_id,
                element_id,
                method,
            } => {
                work.tree.get_node(source_id)?;
                if !work.tree.is_tab(source_id) {
                    return Err(ApiError::BadRequest(format!("{source_id} is not a tab")));
                }
                let parent = parent_of(&work.tree, element_id)?;
                let sibling = (*method == MoveMethod::InsertBefore).then_some(element_id);
                work.tree.move_node(source_id, &parent, sibling)?;
            }

            LayoutAction::RenameTab { tab_id, tab_name } => {
                work.tree.get_node(tab_id)?;
                if !work.tree.is_tab(tab_id) {
                    return Err(ApiError::BadRequest(format!("{tab_id} is not a tab")));
                }
                if !work.tree.can_update_node(tab_id) {
                    return Err(ApiError::PermissionDenied(format!(
                        "tab {tab_id} cannot be renamed"
                    )));
                }
                let name = match tab_name.trim() {
                    "" => DEFAULT_TAB_NAME,
                    name => name,
                };
                work.tree.update_node(tab_id, &NodeChanges::rename(name))?;
            }

            LayoutAction::ChangeColumns { tab_id, columns } => {
                let outcome = change_column_count(
                    &mut work.tree,
                    &mut work.prefs,
                    tab_id,
                    columns.len(),
                    columns,
                )?;
                work.prefs_dirty = true;
                response.new_column_ids = outcome.new_columns;
            }

            LayoutAction::AddTab { tab_name, columns } => {
                let root = work.tree.root_id().clone();
                let tab = work.tree.add_node(NodeDraft::tab(tab_name), &root, None)?;
                if columns.is_empty() {
                    let column = work.tree.add_node(NodeDraft::column(), &tab, None)?;
                    response.new_column_ids = vec![column];
                } else {
                    let outcome = change_column_count(
                        &mut work.tree,
                        &mut work.prefs,
                        &tab,
                        columns.len(),
                        columns,
                    )?;
                    work.prefs_dirty = true;
                    response.new_column_ids = outcome.new_columns;
                }
                response.tab_id = Some(tab);
            }

            LayoutAction::SubscribeToTab {
                source_id,
                element_id,
            } => {
                let edit = fragments::subscribe(
                    &self.store,
                    key,
                    &work.tree,
                    source_id,
                    element_id.as_ref(),
                )?;
                work.tree = edit.tree;
                work.subscription = edit.change;
            }

            LayoutAction::UpdatePermissions { element_id, .. } => {
                let changes = action.permission_changes().unwrap_or_default();
                work.tree.update_node(element_id, &changes)?;
            }

            LayoutAction::ChooseSkin { skin_name } => {
                let skin = skin_name.trim();
                if skin.is_empty() {
                    return Err(ApiError::BadRequest("skin name must not be blank".to_string()));
                }
                let mut theme = self.store.call(|s| Ok(s.theme_preferences(key)?))?;
                theme.set(SKIN, skin);
                work.theme = Some(theme);
            }
        }
        Ok(response)
    }
}

fn parent_of(tree: &LayoutTree, id: &NodeId) -> Result<NodeId, ApiError> {
    tree.get_parent_id(id)?
        .cloned()
        .ok_or_else(|| ApiError::BadRequest(format!("{id} has no parent")))
}

fn portlet_target(
    tree: &LayoutTree,
    destination: &NodeId,
    method: MoveMethod,
) -> Result<PortletTarget, ApiError> {
    tree.get_node(destination)?;
    if tree.is_tab(destination) {
        let columns = tree.columns(destination)?;
        return Ok(if columns.is_empty() {
            PortletTarget::EmptyTab(destination.clone())
        } else {
            PortletTarget::Columns(columns.to_vec())
        });
    }
    if tree.is_column(destination) {
        return Ok(PortletTarget::Slot {
            parent: destination.clone(),
            sibling: None,
        });
    }
    Ok(PortletTarget::Slot {
        parent: parent_of(tree, destination)?,
        sibling: (method == MoveMethod::InsertBefore).then(|| destination.clone()),
    })
}

/// Adds a portlet at `destination`. A tab destination takes the first of its
/// columns that accepts the portlet.
fn add_portlet(
    tree: &mut LayoutTree,
    draft: NodeDraft,
    destination: &NodeId,
    position: MoveMethod,
) -> Result<NodeId, ApiError> {
    match portlet_target(tree, destination, position)? {
        PortletTarget::Columns(columns) => {
            let mut first_err = None;
            for column in &columns {
                match tree.add_node(draft.clone(), column, None) {
                    Ok(id) => return Ok(id),
                    Err(err) => {
                        first_err.get_or_insert(err);
                    }
                }
            }
            Err(first_err
                .map(ApiError::from)
                .unwrap_or_else(|| ApiError::BadRequest(format!("{destination} has no columns"))))
        }
        PortletTarget::EmptyTab(tab) => {
            let column = tree.add_node(NodeDraft::column(), &tab, None)?;
            Ok(tree.add_node(draft, &column, None)?)
        }
        PortletTarget::Slot { parent, sibling } => {
            Ok(tree.add_node(draft, &parent, sibling.as_ref())?)
        }
    }
}

/// Moves a portlet to `destination`. A tab destination means the end of its
/// first column.
fn move_portlet(
    tree: &mut LayoutTree,
    source: &NodeId,
    destination: &NodeId,
    method: MoveMethod,
) -> Result<(), ApiError> {
    match portlet_target(tree, destination, method)? {
        PortletTarget::Columns(columns) => {
            tree.move_node(source, &columns[0], None)?;
        }
        PortletTarget::EmptyTab(tab) => {
            let column = tree.add_node(NodeDraft::column(), &tab, None)?;
            tree.move_node(source, &column, None)?;
        }
        PortletTarget::Slot { parent, sibling } => {
            tree.move_node(source, &parent, sibling.as_ref())?;
        }
    }
    Ok(())
}
