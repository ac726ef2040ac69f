//! SQLite implementation of the storage traits.
//!
//! [`SqliteStore`] persists layouts in a SQLite database with WAL mode,
//! one transaction per write, and automatic schema migrations. Node kinds
//! are stored as JSON TEXT columns via serde_json.

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use portlayout_core::{
    Capabilities, ContentId, FragmentOrigin, LayoutTree, NodeId, NodeKind, StructurePreferences,
    ThemePreferences, UserId,
};

use crate::convert::{decompose, recompose, DecomposedLayout, StoredNode};
use crate::error::StorageError;
use crate::traits::{ContentRegistry, IdentityResolver, LayoutStore, SubscriptionStore};
use crate::types::{ContentDescriptor, FragmentSubscription, LayoutKey, DEFAULT_PROFILE};

/// SQLite-backed store.
///
/// Every write operation is wrapped in a transaction for atomicity.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn assert_user_exists(conn: &Connection, id: UserId) -> Result<(), StorageError> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![id.0],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StorageError::UserIdNotFound(id));
        }
        Ok(())
    }

    /// Loads the user's own rows for a layout, or `None` if it was never
    /// saved.
    fn load_decomposed(&self, key: LayoutKey) -> Result<Option<DecomposedLayout>, StorageError> {
        let next_id: Option<u32> = self
            .conn
            .query_row(
                "SELECT next_id FROM layouts WHERE user_id = ?1 AND profile_id = ?2",
                params![key.user.0, key.profile.0],
                |row| row.get(0),
            )
            .optional()?;
        let Some(next_id) = next_id else {
            return Ok(None);
        };

        let nodes: Vec<StoredNode> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT node_id, parent_id, name, kind_json, deletable, movable, editable, add_child_allowed, hidden \
                 FROM layout_nodes WHERE user_id = ?1 AND profile_id = ?2 ORDER BY position",
            )?;
            let rows = stmt.query_map(params![key.user.0, key.profile.0], |row| {
                let id: String = row.get(0)?;
                let parent: Option<String> = row.get(1)?;
                let name: String = row.get(2)?;
                let kind_json: String = row.get(3)?;
                let capabilities = Capabilities {
                    deletable: row.get(4)?,
                    movable: row.get(5)?,
                    editable: row.get(6)?,
                    add_child_allowed: row.get(7)?,
                };
                let hidden: bool = row.get(8)?;
                Ok((id, parent, name, kind_json, capabilities, hidden))
            })?;
            let mut result = Vec::new();
            for row in rows {
                let (id, parent, name, kind_json, capabilities, hidden) = row?;
                let kind: NodeKind = serde_json::from_str(&kind_json)?;
                result.push(StoredNode {
                    id: id.parse::<NodeId>()?,
                    name,
                    kind,
                    parent: parent.map(|p| p.parse::<NodeId>()).transpose()?,
                    capabilities,
                    hidden,
                });
            }
            result
        };

        let child_order: Vec<(NodeId, Vec<NodeId>)> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT parent_id, child_id FROM layout_child_order \
                 WHERE user_id = ?1 AND profile_id = ?2 ORDER BY parent_id, position",
            )?;
            let rows = stmt.query_map(params![key.user.0, key.profile.0], |row| {
                let parent: String = row.get(0)?;
                let child: String = row.get(1)?;
                Ok((parent, child))
            })?;
            let mut result: Vec<(NodeId, Vec<NodeId>)> = Vec::new();
            for row in rows {
                let (parent, child) = row?;
                let parent: NodeId = parent.parse()?;
                let child: NodeId = child.parse()?;
                match result.last_mut() {
                    Some((last, children)) if *last == parent => children.push(child),
                    _ => result.push((parent, vec![child])),
                }
            }
            result
        };

        Ok(Some(DecomposedLayout {
            next_id,
            nodes,
            child_order,
        }))
    }

    /// Replaces all rows of a layout inside `tx`.
    fn write_decomposed(
        tx: &Transaction<'_>,
        key: LayoutKey,
        layout: &DecomposedLayout,
    ) -> Result<(), StorageError> {
        tx.execute(
            "INSERT INTO layouts (user_id, profile_id, next_id) VALUES (?1, ?2, ?3) \
             ON CONFLICT(user_id, profile_id) DO UPDATE SET next_id = excluded.next_id",
            params![key.user.0, key.profile.0, layout.next_id],
        )?;
        tx.execute(
            "DELETE FROM layout_child_order WHERE user_id = ?1 AND profile_id = ?2",
            params![key.user.0, key.profile.0],
        )?;
        tx.execute(
            "DELETE FROM layout_nodes WHERE user_id = ?1 AND profile_id = ?2",
            params![key.user.0, key.profile.0],
        )?;

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO layout_nodes (user_id, profile_id, node_id, parent_id, position, name, kind_json, \
                 deletable, movable, editable, add_child_allowed, hidden) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?;
            for (position, node) in layout.nodes.iter().enumerate() {
                let kind_json = serde_json::to_string(&node.kind)?;
                let caps = node.capabilities;
                stmt.execute(params![
                    key.user.0,
                    key.profile.0,
                    node.id.to_string(),
                    node.parent.as_ref().map(|p| p.to_string()),
                    position as i64,
                    node.name,
                    kind_json,
                    caps.deletable,
                    caps.movable,
                    caps.editable,
                    caps.add_child_allowed,
                    node.hidden,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO layout_child_order (user_id, profile_id, parent_id, position, child_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (parent, children) in &layout.child_order {
                let parent = parent.to_string();
                for (position, child) in children.iter().enumerate() {
                    stmt.execute(params![
                        key.user.0,
                        key.profile.0,
                        parent,
                        position as i64,
                        child.to_string(),
                    ])?;
                }
            }
        }
        Ok(())
    }

    fn write_structure(
        tx: &Transaction<'_>,
        key: LayoutKey,
        prefs: &StructurePreferences,
    ) -> Result<(), StorageError> {
        tx.execute(
            "DELETE FROM structure_preferences WHERE user_id = ?1 AND profile_id = ?2",
            params![key.user.0, key.profile.0],
        )?;
        let mut stmt = tx.prepare_cached(
            "INSERT INTO structure_preferences (user_id, profile_id, node_id, name, value) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (node, name, value) in prefs.iter() {
            stmt.execute(params![
                key.user.0,
                key.profile.0,
                node.to_string(),
                name,
                value
            ])?;
        }
        Ok(())
    }

    fn read_subscription(row: &rusqlite::Row<'_>) -> rusqlite::Result<FragmentSubscription> {
        Ok(FragmentSubscription {
            subscriber: UserId(row.get(0)?),
            owner: UserId(row.get(1)?),
            active: row.get(2)?,
        })
    }
}

impl LayoutStore for SqliteStore {
    fn load(&self, key: LayoutKey) -> Result<LayoutTree, StorageError> {
        let own = self
            .load_decomposed(key)?
            .ok_or(StorageError::LayoutNotFound(key))?;

        let mut owned_fragments = Vec::new();
        for sub in self.subscriptions_for(key.user)? {
            if !sub.active {
                continue;
            }
            if let Some(layout) =
                self.load_decomposed(LayoutKey::new(sub.owner, DEFAULT_PROFILE))?
            {
                let origin = FragmentOrigin {
                    owner: sub.owner,
                    layout: DEFAULT_PROFILE.0,
                };
                owned_fragments.push((origin, layout));
            }
        }
        let fragments: Vec<(FragmentOrigin, &DecomposedLayout)> = owned_fragments
            .iter()
            .map(|(origin, layout)| (*origin, layout))
            .collect();
        recompose(&own, &fragments)
    }

    fn save(&mut self, key: LayoutKey, tree: &LayoutTree) -> Result<(), StorageError> {
        self.commit(key, tree, None)
    }

    fn commit(
        &mut self,
        key: LayoutKey,
        tree: &LayoutTree,
        prefs: Option<&StructurePreferences>,
    ) -> Result<(), StorageError> {
        let decomposed = decompose(tree);
        let tx = self.conn.transaction()?;
        Self::assert_user_exists(&tx, key.user)?;
        Self::write_decomposed(&tx, key, &decomposed)?;
        if let Some(prefs) = prefs {
            Self::write_structure(&tx, key, prefs)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn structure_preferences(&self, key: LayoutKey) -> Result<StructurePreferences, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT node_id, name, value FROM structure_preferences \
             WHERE user_id = ?1 AND profile_id = ?2",
        )?;
        let rows = stmt.query_map(params![key.user.0, key.profile.0], |row| {
            let node: String = row.get(0)?;
            let name: String = row.get(1)?;
            let value: String = row.get(2)?;
            Ok((node, name, value))
        })?;
        let mut prefs = StructurePreferences::new();
        for row in rows {
            let (node, name, value) = row?;
            let node: NodeId = node.parse()?;
            prefs.set(&node, &name, value);
        }
        Ok(prefs)
    }

    fn set_structure_preferences(
        &mut self,
        key: LayoutKey,
        prefs: &StructurePreferences,
    ) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        Self::assert_user_exists(&tx, key.user)?;
        Self::write_structure(&tx, key, prefs)?;
        tx.commit()?;
        Ok(())
    }

    fn theme_preferences(&self, key: LayoutKey) -> Result<ThemePreferences, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT name, value FROM theme_preferences WHERE user_id = ?1 AND profile_id = ?2",
        )?;
        let rows = stmt.query_map(params![key.user.0, key.profile.0], |row| {
            let name: String = row.get(0)?;
            let value: String = row.get(1)?;
            Ok((name, value))
        })?;
        let mut prefs = ThemePreferences::default();
        for row in rows {
            let (name, value) = row?;
            prefs.set(&name, value);
        }
        Ok(prefs)
    }

    fn set_theme_preferences(
        &mut self,
        key: LayoutKey,
        prefs: &ThemePreferences,
    ) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        Self::assert_user_exists(&tx, key.user)?;
        tx.execute(
            "DELETE FROM theme_preferences WHERE user_id = ?1 AND profile_id = ?2",
            params![key.user.0, key.profile.0],
        )?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO theme_preferences (user_id, profile_id, name, value) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (name, value) in prefs.iter() {
                stmt.execute(params![key.user.0, key.profile.0, name, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl SubscriptionStore for SqliteStore {
    fn get_subscription(
        &self,
        subscriber: UserId,
        owner: UserId,
    ) -> Result<Option<FragmentSubscription>, StorageError> {
        let sub = self
            .conn
            .query_row(
                "SELECT subscriber_id, owner_id, active FROM fragment_subscriptions \
                 WHERE subscriber_id = ?1 AND owner_id = ?2",
                params![subscriber.0, owner.0],
                Self::read_subscription,
            )
            .optional()?;
        Ok(sub)
    }

    fn create_subscription(&mut self, sub: &FragmentSubscription) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        Self::assert_user_exists(&tx, sub.subscriber)?;
        Self::assert_user_exists(&tx, sub.owner)?;
        let inserted = tx.execute(
            "INSERT INTO fragment_subscriptions (subscriber_id, owner_id, active) VALUES (?1, ?2, ?3) \
             ON CONFLICT(subscriber_id, owner_id) DO NOTHING",
            params![sub.subscriber.0, sub.owner.0, sub.active],
        )?;
        if inserted == 0 {
            return Err(StorageError::IntegrityError {
                reason: format!(
                    "user {} is already subscribed to user {}",
                    sub.subscriber, sub.owner
                ),
            });
        }
        tx.commit()?;
        Ok(())
    }

    fn update_subscription(&mut self, sub: &FragmentSubscription) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        let updated = tx.execute(
            "UPDATE fragment_subscriptions SET active = ?3 WHERE subscriber_id = ?1 AND owner_id = ?2",
            params![sub.subscriber.0, sub.owner.0, sub.active],
        )?;
        if updated == 0 {
            return Err(StorageError::SubscriptionNotFound {
                subscriber: sub.subscriber,
                owner: sub.owner,
            });
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_subscription(
        &mut self,
        subscriber: UserId,
        owner: UserId,
    ) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        let deleted = tx.execute(
            "DELETE FROM fragment_subscriptions WHERE subscriber_id = ?1 AND owner_id = ?2",
            params![subscriber.0, owner.0],
        )?;
        if deleted == 0 {
            return Err(StorageError::SubscriptionNotFound { subscriber, owner });
        }
        tx.commit()?;
        Ok(())
    }

    fn subscriptions_for(
        &self,
        subscriber: UserId,
    ) -> Result<Vec<FragmentSubscription>, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT subscriber_id, owner_id, active FROM fragment_subscriptions \
             WHERE subscriber_id = ?1 ORDER BY owner_id",
        )?;
        let rows = stmt.query_map(params![subscriber.0], Self::read_subscription)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

impl IdentityResolver for SqliteStore {
    fn resolve_numeric_id(&self, user_name: &str) -> Result<UserId, StorageError> {
        let id: Option<u32> = self
            .conn
            .query_row(
                "SELECT id FROM users WHERE name = ?1",
                params![user_name],
                |row| row.get(0),
            )
            .optional()?;
        id.map(UserId)
            .ok_or_else(|| StorageError::UserNotFound(user_name.to_string()))
    }

    fn user_name(&self, id: UserId) -> Result<String, StorageError> {
        let name: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM users WHERE id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .optional()?;
        name.ok_or(StorageError::UserIdNotFound(id))
    }

    fn register_user(&mut self, user_name: &str) -> Result<UserId, StorageError> {
        let tx = self.conn.transaction()?;
        let inserted = tx.execute(
            "INSERT INTO users (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![user_name],
        )?;
        if inserted == 0 {
            return Err(StorageError::IntegrityError {
                reason: format!("user name '{user_name}' is taken"),
            });
        }
        let id = tx.last_insert_rowid();
        tx.commit()?;
        let id = u32::try_from(id).map_err(|_| StorageError::IntegrityError {
            reason: format!("user id {id} out of range"),
        })?;
        Ok(UserId(id))
    }
}

impl ContentRegistry for SqliteStore {
    fn definition_for(&self, id: ContentId) -> Result<ContentDescriptor, StorageError> {
        self.conn
            .query_row(
                "SELECT id, fname, title, description FROM content_definitions WHERE id = ?1",
                params![id.0],
                |row| {
                    Ok(ContentDescriptor {
                        id: ContentId(row.get(0)?),
                        fname: row.get(1)?,
                        title: row.get(2)?,
                        description: row.get(3)?,
                    })
                },
            )
            .optional()?
            .ok_or(StorageError::ContentNotFound(id))
    }

    fn publish(
        &mut self,
        fname: &str,
        title: &str,
        description: &str,
    ) -> Result<ContentDescriptor, StorageError> {
        let tx = self.conn.transaction()?;
        let inserted = tx.execute(
            "INSERT INTO content_definitions (fname, title, description) VALUES (?1, ?2, ?3) \
             ON CONFLICT(fname) DO NOTHING",
            params![fname, title, description],
        )?;
        if inserted == 0 {
            return Err(StorageError::IntegrityError {
                reason: format!("content '{fname}' is already published"),
            });
        }
        let id = tx.last_insert_rowid();
        tx.commit()?;
        let id = u32::try_from(id).map_err(|_| StorageError::IntegrityError {
            reason: format!("content id {id} out of range"),
        })?;
        Ok(ContentDescriptor {
            id: ContentId(id),
            fname: fname.to_string(),
            title: title.to_string(),
            description: description.to_string(),
        })
    }
}
