//! Queue database schema and migration logic.

use rusqlite::{Connection, Result};

pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the queue database.
///
/// Edit sets and base snapshots are stored as JSON text: they are opaque to
/// SQL and only ever read back whole.
pub const SCHEMA_SQL: &str = r"
    -- Pending edits, at most one per record identity.
    CREATE TABLE IF NOT EXISTS queued_edits (
        record_id TEXT PRIMARY KEY,
        entry_id TEXT NOT NULL UNIQUE,
        edits TEXT NOT NULL,
        base TEXT NOT NULL,
        queued_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_queued_edits_queued_at ON queued_edits(queued_at);

    -- Queue-level state: edit window expiry, schema version.
    CREATE TABLE IF NOT EXISTS sync_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

/// Apply the schema to a fresh or existing connection, recording the schema
/// version on first use.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT INTO sync_meta (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO NOTHING",
        [CURRENT_SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_applies_twice() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        apply_schema(&conn).unwrap();

        let version: String = conn
            .query_row(
                "SELECT value FROM sync_meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION.to_string());
    }
}
