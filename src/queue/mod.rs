//! Durable queue of not-yet-synchronized edits.
//!
//! Invariants:
//! - At most one `QueuedEdit` per record identity. A second edit to the same
//!   record folds into the existing entry (later field values win) without
//!   advancing its base snapshot.
//! - Every mutation is durable before the call returns.
//! - The offline edit window gates NEW local edits only; expiry never
//!   discards entries already queued.
//!
//! The queue is shared between the UI (enqueue/fold) and an in-flight
//! reconcile pass; `list()` returns a snapshot, so edits folded in after a
//! pass begins are simply picked up by the next pass.

use crate::error::{Result, SyncError};
use crate::model::{EditSet, QueuedEdit, Record};
use crate::storage::QueueStore;
use crate::util::id::entry_id;
use crate::util::time::{format_timestamp, parse_timestamp};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::Path;
use tracing::debug;

const META_EDIT_WINDOW: &str = "edit_window_expires";

/// Durable, ordered collection of pending edits keyed by record identity.
#[derive(Debug)]
pub struct ChangeQueue {
    store: Mutex<QueueStore>,
}

impl ChangeQueue {
    /// Open (creating if needed) the queue at the given database path.
    ///
    /// # Errors
    ///
    /// Returns a database error if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            store: Mutex::new(QueueStore::open(path)?),
        })
    }

    /// Open an ephemeral in-memory queue (tests).
    ///
    /// # Errors
    ///
    /// Returns a database error if the schema cannot be applied.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            store: Mutex::new(QueueStore::open_in_memory()?),
        })
    }

    /// Queue an edit for a record, folding into an existing entry when one is
    /// already pending for the same identity.
    ///
    /// `base` is the record as currently known locally; it becomes the merge
    /// ancestor for a new entry and is ignored when folding (the first
    /// snapshot stays authoritative until the entry is reconciled).
    ///
    /// # Errors
    ///
    /// Rejects empty edit sets and edits attempted after the offline window
    /// expired; database failures propagate.
    pub fn enqueue(
        &self,
        record_id: &str,
        edits: EditSet,
        base: &Record,
        now: DateTime<Utc>,
    ) -> Result<QueuedEdit> {
        if edits.is_empty() {
            return Err(SyncError::EmptyEditSet {
                record_id: record_id.to_string(),
            });
        }
        let mut store = self.store.lock();
        check_window(&store, now)?;

        let entry = if let Some(mut existing) = store.get(record_id)? {
            debug!(record_id, "folding edit into existing queue entry");
            existing.edits.fold(edits);
            existing
        } else {
            debug!(record_id, "queueing new edit");
            QueuedEdit {
                entry_id: entry_id(record_id, &now),
                record_id: record_id.to_string(),
                edits,
                base: base.clone(),
                queued_at: now,
            }
        };
        store.upsert(&entry)?;
        Ok(entry)
    }

    /// Fold an edit set into the existing entry for a record, without
    /// touching its base snapshot. Returns `false` when nothing is pending
    /// for that identity.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`enqueue`](Self::enqueue).
    pub fn fold(&self, record_id: &str, edits: EditSet, now: DateTime<Utc>) -> Result<bool> {
        if edits.is_empty() {
            return Err(SyncError::EmptyEditSet {
                record_id: record_id.to_string(),
            });
        }
        let mut store = self.store.lock();
        check_window(&store, now)?;

        let Some(mut existing) = store.get(record_id)? else {
            return Ok(false);
        };
        existing.edits.fold(edits);
        store.upsert(&existing)?;
        Ok(true)
    }

    /// Replace the edit set and base snapshot of an existing entry wholesale.
    /// Used by the conflict-resolution path, so it is not gated by the edit
    /// window. Returns `false` when nothing is pending.
    ///
    /// # Errors
    ///
    /// Database failures propagate.
    pub fn replace_entry(&self, record_id: &str, edits: EditSet, base: &Record) -> Result<bool> {
        let mut store = self.store.lock();
        let Some(mut existing) = store.get(record_id)? else {
            return Ok(false);
        };
        existing.edits = edits;
        existing.base = base.clone();
        store.upsert(&existing)?;
        Ok(true)
    }

    /// Remove the entry for a record identity (successful reconcile).
    ///
    /// # Errors
    ///
    /// Database failures propagate.
    pub fn remove(&self, record_id: &str) -> Result<bool> {
        self.store.lock().delete_by_record(record_id)
    }

    /// Discard an entry by queue-entry identity (user abandoned the edit).
    /// Returns the record identity it belonged to.
    ///
    /// # Errors
    ///
    /// Database failures propagate.
    pub fn discard(&self, entry_id: &str) -> Result<Option<String>> {
        self.store.lock().delete_by_entry(entry_id)
    }

    /// Snapshot of all pending entries, oldest first.
    ///
    /// # Errors
    ///
    /// Database failures propagate.
    pub fn list(&self) -> Result<Vec<QueuedEdit>> {
        self.store.lock().load_all()
    }

    /// The pending entry for a record identity, if any.
    ///
    /// # Errors
    ///
    /// Database failures propagate.
    pub fn get(&self, record_id: &str) -> Result<Option<QueuedEdit>> {
        self.store.lock().get(record_id)
    }

    /// Number of pending entries.
    ///
    /// # Errors
    ///
    /// Database failures propagate.
    pub fn len(&self) -> Result<usize> {
        self.store.lock().count()
    }

    /// Is the queue empty?
    ///
    /// # Errors
    ///
    /// Database failures propagate.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Grant a new offline editing window.
    ///
    /// # Errors
    ///
    /// Database failures propagate.
    pub fn grant_edit_window(&self, expires_at: DateTime<Utc>) -> Result<()> {
        self.store
            .lock()
            .meta_set(META_EDIT_WINDOW, &format_timestamp(&expires_at))
    }

    /// Clear the edit window (edits permitted unconditionally).
    ///
    /// # Errors
    ///
    /// Database failures propagate.
    pub fn clear_edit_window(&self) -> Result<()> {
        self.store.lock().meta_delete(META_EDIT_WINDOW)
    }

    /// The current window expiry, if one has been granted.
    ///
    /// # Errors
    ///
    /// Database failures propagate.
    pub fn edit_window(&self) -> Result<Option<DateTime<Utc>>> {
        window_expiry(&self.store.lock())
    }

    /// Are new local edits currently permitted?
    ///
    /// True when no window has been recorded, or the recorded expiry is still
    /// in the future relative to the supplied clock.
    ///
    /// # Errors
    ///
    /// Database failures propagate.
    pub fn edits_permitted(&self, now: DateTime<Utc>) -> Result<bool> {
        Ok(match window_expiry(&self.store.lock())? {
            Some(expires_at) => now < expires_at,
            None => true,
        })
    }
}

fn window_expiry(store: &QueueStore) -> Result<Option<DateTime<Utc>>> {
    store
        .meta_get(META_EDIT_WINDOW)?
        .map(|raw| {
            parse_timestamp(&raw)
                .map_err(|e| SyncError::validation(META_EDIT_WINDOW, e.to_string()))
        })
        .transpose()
}

fn check_window(store: &QueueStore, now: DateTime<Utc>) -> Result<()> {
    if let Some(expires_at) = window_expiry(store)? {
        if now >= expires_at {
            return Err(SyncError::EditWindowExpired {
                expired_at: expires_at,
            });
        }
    }
    Ok(())
}
