//! Store fixtures.
//!
//! Every fixture registers the same statement set over a table
//! `items (name TEXT, qty INTEGER)`.

use qcsync_core::{LocalStore, MemoryExecutor, SqliteExecutor};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Inserts an item: `(name, qty)`.
pub const ADD_ITEM: &str = "addItem";
/// Sets an item's quantity: `(qty, name)`.
pub const UPDATE_ITEM: &str = "updateItem";
/// Deletes an item: `(name)`.
pub const DELETE_ITEM: &str = "deleteItem";
/// Lists items ordered by name.
pub const LIST_ITEMS: &str = "listItems";

/// The standard statement set.
pub const STATEMENTS: [(&str, &str); 4] = [
    (ADD_ITEM, "INSERT INTO items (name, qty) VALUES (?1, ?2)"),
    (UPDATE_ITEM, "UPDATE items SET qty = ?1 WHERE name = ?2"),
    (DELETE_ITEM, "DELETE FROM items WHERE name = ?1"),
    (LIST_ITEMS, "SELECT name, qty FROM items ORDER BY name"),
];

/// Creates the `items` table.
pub const CREATE_ITEMS: &str = "CREATE TABLE IF NOT EXISTS items (name TEXT NOT NULL, qty INTEGER)";

/// A store on a [`MemoryExecutor`], with a probe sharing its state.
pub struct MemoryStore {
    /// The store.
    pub store: Arc<LocalStore<MemoryExecutor>>,
    /// Probe onto the executor the store runs on.
    pub probe: MemoryExecutor,
}

impl MemoryStore {
    /// Opens a store with the standard statements registered.
    pub fn new() -> Self {
        let probe = MemoryExecutor::new();
        let store = LocalStore::open(probe.clone()).expect("Failed to open memory store");
        store.register_many(STATEMENTS);
        Self {
            store: Arc::new(store),
            probe,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A SQLite-backed store in a temporary directory.
pub struct TempSqliteStore {
    /// The store.
    pub store: Arc<LocalStore<SqliteExecutor>>,
    path: PathBuf,
    /// Kept alive so the directory outlives the store.
    _temp_dir: TempDir,
}

impl TempSqliteStore {
    /// Creates a database file, the `items` table and the standard statements.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("local.db");
        let store = open_sqlite(&path);
        Self {
            store: Arc::new(store),
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Path of the database file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Opens a second store on the same file, as a restarted process would.
    pub fn reopen(&self) -> LocalStore<SqliteExecutor> {
        open_sqlite(&self.path)
    }
}

impl Default for TempSqliteStore {
    fn default() -> Self {
        Self::new()
    }
}

fn open_sqlite(path: &std::path::Path) -> LocalStore<SqliteExecutor> {
    let executor = SqliteExecutor::open(path).expect("Failed to open SQLite database");
    executor
        .connection()
        .execute_batch(CREATE_ITEMS)
        .expect("Failed to create items table");
    let store = LocalStore::open(executor).expect("Failed to open SQLite store");
    store.register_many(STATEMENTS);
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcsync_codec::Value;

    #[test]
    fn memory_store_has_statements() {
        let fixture = MemoryStore::new();
        assert_eq!(fixture.store.registry().len(), STATEMENTS.len());
        fixture
            .store
            .set_data(ADD_ITEM, &[Value::from("a"), Value::Integer(1)])
            .unwrap();
        assert_eq!(fixture.probe.outbox_len(), 1);
    }

    #[test]
    fn sqlite_store_survives_reopen() {
        let fixture = TempSqliteStore::new();
        fixture
            .store
            .set_data(ADD_ITEM, &[Value::from("a"), Value::Integer(2)])
            .unwrap();

        let reopened = fixture.reopen();
        let rows = reopened.get_data(LIST_ITEMS, &[]).unwrap().rows;
        assert_eq!(rows, vec![vec![Value::from("a"), Value::Integer(2)]]);
        assert_eq!(reopened.pending_count().unwrap(), 1);
    }
}
