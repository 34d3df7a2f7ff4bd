//! Statements over the sync tables.
//!
//! `sync_info` holds the single watermark row (id 0). `sync_values` is
//! the outbox; `seq` gives commit order.

/// Creates the watermark table.
pub const CREATE_SYNC_INFO: &str =
    "CREATE TABLE IF NOT EXISTS sync_info (id INTEGER PRIMARY KEY NOT NULL, last_sync TEXT)";

/// Creates the outbox table.
pub const CREATE_SYNC_VALUES: &str = "CREATE TABLE IF NOT EXISTS sync_values (\
     seq INTEGER PRIMARY KEY AUTOINCREMENT, \
     recorded_at TEXT NOT NULL, \
     sql_key TEXT NOT NULL, \
     sql_params TEXT NOT NULL)";

/// Appends an outbox record: `(recorded_at, sql_key, sql_params)`.
pub const INSERT_RECORD: &str =
    "INSERT INTO sync_values (recorded_at, sql_key, sql_params) VALUES (?1, ?2, ?3)";

/// Reads every outbox record in commit order.
pub const SELECT_RECORDS: &str =
    "SELECT seq, recorded_at, sql_key, sql_params FROM sync_values ORDER BY seq";

/// Counts outbox records.
pub const COUNT_RECORDS: &str = "SELECT COUNT(*) FROM sync_values";

/// Deletes every outbox record.
pub const DELETE_RECORDS: &str = "DELETE FROM sync_values";

/// Reads the watermark.
pub const SELECT_LAST_SYNC: &str = "SELECT last_sync FROM sync_info WHERE id = 0";

/// Writes the watermark: `(last_sync)`.
pub const UPSERT_LAST_SYNC: &str =
    "INSERT OR REPLACE INTO sync_info (id, last_sync) VALUES (0, ?1)";
