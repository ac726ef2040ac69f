//! SQL schema and migration setup for the SQLite backend.
//!
//! Uses `rusqlite_migration` to manage schema migrations via SQLite's
//! `user_version` pragma. Migrations are embedded at compile time via
//! `include_str!`.

use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};

use crate::error::StorageError;

/// All schema migrations, applied in order via `user_version` tracking.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(include_str!(
        "migrations/001_initial_schema.sql"
    ))])
}

/// Opens (or creates) a layout database at `path` and applies all pending
/// migrations.
pub fn open_database(path: &str) -> Result<Connection, StorageError> {
    let mut conn = Connection::open(path)?;
    configure_and_migrate(&mut conn)?;
    Ok(conn)
}

/// Opens an in-memory SQLite database with the same configuration.
pub fn open_in_memory() -> Result<Connection, StorageError> {
    let mut conn = Connection::open_in_memory()?;
    configure_and_migrate(&mut conn)?;
    Ok(conn)
}

fn configure_and_migrate(conn: &mut Connection) -> Result<(), StorageError> {
    // The admin CLI may read a database the server is writing to.
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    // Node and child-order rows hang off their `layouts` row, and layouts,
    // preferences and subscriptions off `users`. Removing a user must take
    // all of it along, and a subscription must name two real users. SQLite
    // only enforces either with this pragma set per connection.
    conn.pragma_update(None, "foreign_keys", "ON")?;

    migrations()
        .to_latest(conn)
        .map_err(|e| StorageError::Migration(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_valid() {
        assert!(migrations().validate().is_ok());
    }

    #[test]
    fn removing_a_user_cascades_through_layouts() {
        let conn = open_in_memory().unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, name) VALUES (1, 'ada'), (2, 'bob');
             INSERT INTO layouts (user_id, profile_id, next_id) VALUES (1, 1, 3);
             INSERT INTO layout_nodes (user_id, profile_id, node_id, parent_id, position, name,
                 kind_json, deletable, movable, editable, add_child_allowed, hidden)
             VALUES (1, 1, 'root', NULL, 0, 'Layout', '\"Root\"', 0, 0, 0, 1, 0);
             INSERT INTO layout_child_order (user_id, profile_id, parent_id, position, child_id)
             VALUES (1, 1, 'root', 0, 'u2l1s1');
             INSERT INTO fragment_subscriptions (subscriber_id, owner_id, active) VALUES (1, 2, 1);",
        )
        .unwrap();

        conn.execute("DELETE FROM users WHERE id = 1", []).unwrap();
        for table in ["layouts", "layout_nodes", "layout_child_order", "fragment_subscriptions"] {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                .unwrap();
            assert_eq!(count, 0, "{table} kept rows of a removed user");
        }
    }

    #[test]
    fn subscriptions_need_real_users() {
        let conn = open_in_memory().unwrap();
        conn.execute("INSERT INTO users (id, name) VALUES (1, 'ada')", [])
            .unwrap();
        let result = conn.execute(
            "INSERT INTO fragment_subscriptions (subscriber_id, owner_id, active) VALUES (1, 99, 1)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn in_memory_database_has_all_tables() {
        let conn = open_in_memory().unwrap();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        for expected in [
            "content_definitions",
            "fragment_subscriptions",
            "layout_child_order",
            "layout_nodes",
            "layouts",
            "structure_preferences",
            "theme_preferences",
            "users",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing {expected}");
        }
    }
}
