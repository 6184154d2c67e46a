//! SQLite persistence for the pending-change queue.
//!
//! The queue must survive process restart, and every enqueue/remove/discard
//! must be durable before it returns. Edit sets and base snapshots are stored
//! as JSON text columns; the `sync_meta` table holds queue-level state such as
//! the offline edit window expiry.

mod schema;

pub use schema::{CURRENT_SCHEMA_VERSION, SCHEMA_SQL, apply_schema};

use crate::error::Result;
use crate::model::QueuedEdit;
use crate::util::time::{format_timestamp, parse_timestamp};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::time::Duration;

/// SQLite-backed store for queued edits.
#[derive(Debug)]
pub struct QueueStore {
    conn: Connection,
}

impl QueueStore {
    /// Open (creating if needed) the queue database at the given path.
    ///
    /// # Errors
    ///
    /// Returns a database error if the file cannot be opened or the schema
    /// cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory queue database (tests, ephemeral embedders).
    ///
    /// # Errors
    ///
    /// Returns a database error if the schema cannot be applied.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Insert or replace the entry for a record identity.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn upsert(&mut self, edit: &QueuedEdit) -> Result<()> {
        let edits_json = serde_json::to_string(&edit.edits)?;
        let base_json = serde_json::to_string(&edit.base)?;
        self.conn.execute(
            "INSERT INTO queued_edits (record_id, entry_id, edits, base, queued_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(record_id) DO UPDATE SET
                 entry_id = excluded.entry_id,
                 edits = excluded.edits,
                 base = excluded.base,
                 queued_at = excluded.queued_at",
            params![
                edit.record_id,
                edit.entry_id,
                edits_json,
                base_json,
                format_timestamp(&edit.queued_at),
            ],
        )?;
        Ok(())
    }

    /// Fetch the entry for a record identity, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or row decode fails.
    pub fn get(&self, record_id: &str) -> Result<Option<QueuedEdit>> {
        self.conn
            .query_row(
                "SELECT record_id, entry_id, edits, base, queued_at
                 FROM queued_edits WHERE record_id = ?1",
                params![record_id],
                row_to_edit,
            )
            .optional()?
            .transpose()
    }

    /// All entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or a row decode fails.
    pub fn load_all(&self) -> Result<Vec<QueuedEdit>> {
        let mut stmt = self.conn.prepare(
            "SELECT record_id, entry_id, edits, base, queued_at
             FROM queued_edits ORDER BY queued_at, record_id",
        )?;
        let rows = stmt.query_map([], row_to_edit)?;
        let mut edits = Vec::new();
        for row in rows {
            edits.push(row??);
        }
        Ok(edits)
    }

    /// Remove the entry for a record identity. Returns whether a row existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_by_record(&mut self, record_id: &str) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM queued_edits WHERE record_id = ?1", params![record_id])?;
        Ok(n > 0)
    }

    /// Remove an entry by its queue-entry identity, returning the record
    /// identity it belonged to.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup or delete fails.
    pub fn delete_by_entry(&mut self, entry_id: &str) -> Result<Option<String>> {
        let record_id: Option<String> = self
            .conn
            .query_row(
                "SELECT record_id FROM queued_edits WHERE entry_id = ?1",
                params![entry_id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = &record_id {
            self.conn
                .execute("DELETE FROM queued_edits WHERE record_id = ?1", params![id])?;
        }
        Ok(record_id)
    }

    /// Number of pending entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM queued_edits", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Read a queue-level metadata value.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn meta_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM sync_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Write a queue-level metadata value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn meta_set(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Delete a queue-level metadata value.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn meta_delete(&mut self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM sync_meta WHERE key = ?1", params![key])?;
        Ok(())
    }
}

type RowResult = std::result::Result<Result<QueuedEdit>, rusqlite::Error>;

fn row_to_edit(row: &rusqlite::Row<'_>) -> RowResult {
    let record_id: String = row.get(0)?;
    let entry_id: String = row.get(1)?;
    let edits_json: String = row.get(2)?;
    let base_json: String = row.get(3)?;
    let queued_at: String = row.get(4)?;
    Ok(decode_row(record_id, entry_id, &edits_json, &base_json, &queued_at))
}

fn decode_row(
    record_id: String,
    entry_id: String,
    edits_json: &str,
    base_json: &str,
    queued_at: &str,
) -> Result<QueuedEdit> {
    Ok(QueuedEdit {
        record_id,
        entry_id,
        edits: serde_json::from_str(edits_json)?,
        base: serde_json::from_str(base_json)?,
        queued_at: parse_timestamp(queued_at)
            .map_err(|e| crate::error::SyncError::validation("queued_at", e.to_string()))?,
    })
}
