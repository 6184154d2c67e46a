//! Reconcile protocol: fetch remote state, merge queued edits, commit with a
//! precondition-guarded write, surface conflicts.
//!
//! # Concurrency model
//!
//! One logical writer per record store: reconcile is not reentrant. A
//! `reconcile()` call arriving while a pass is in flight waits for that pass
//! and receives its outcome, success or failure, instead of racing it for the
//! version token. Local
//! enqueues may run concurrently with a pass; the pass works on the queue
//! snapshot taken when it began, and edits folded in afterwards are picked up
//! next time.
//!
//! # Cancel safety
//!
//! The queue and the conflict set are only mutated after the commit stage
//! resolves. Dropping the reconcile future mid-fetch or mid-commit leaves the
//! queue exactly as if the pass had never started; at worst a committed write
//! whose response was never observed is re-merged next pass, where every edit
//! converges with its own committed value and commits again cleanly.

use crate::codec;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::merge::{self, MergeOutcome};
use crate::model::{Conflict, FieldName, QueuedEdit, Record, Resolution};
use crate::queue::ChangeQueue;
use crate::store::{ReadOutcome, RepositoryStore, WriteOutcome};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Observable engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No pass in flight, no unresolved conflicts.
    Idle,
    /// Reading remote state.
    Fetching,
    /// Merging queued edits against remote records.
    Merging,
    /// Writing staged records.
    Committing,
    /// No pass in flight, but conflicts await user decisions.
    ConflictsPending,
}

impl SyncState {
    /// Is a reconcile pass currently running?
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Fetching | Self::Merging | Self::Committing)
    }
}

/// An edit that could not be synchronized this pass and will be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientFailure {
    pub record_id: String,
    pub message: String,
}

/// Outcome of one reconcile pass.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Record identities committed this pass.
    pub written: Vec<String>,
    /// Conflicts open after this pass (raised now or earlier).
    pub conflicts: Vec<Conflict>,
    /// Edits discarded because their record no longer exists remotely.
    pub discarded: Vec<String>,
    /// Edits that failed transiently; retried on the next pass.
    pub transient: Vec<TransientFailure>,
    /// Count of undecodable lines in the remote file. Non-zero is a warning:
    /// a truncated or mangled file can mask data loss.
    pub malformed_lines: usize,
    /// The record set after this pass; the new local cache state. Always
    /// mirrors the committed store: remote as fetched when the commit did
    /// not land, the merged set once it did.
    pub records: Vec<Record>,
}

impl SyncReport {
    /// Did everything queued make it upstream?
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty() && self.transient.is_empty()
    }
}

/// Running counters across reconcile passes.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    pub passes_completed: u64,
    pub records_written: u64,
    pub conflicts_raised: u64,
    pub edits_discarded: u64,
    pub precondition_retries: u64,
    pub last_error: Option<String>,
}

enum PassAttempt {
    Done(SyncReport),
    /// The guarded write lost the precondition race; re-read and re-merge.
    Stale,
}

/// Drives the reconcile protocol against one repository store.
///
/// Owned by the application's composition root; tests construct one per case
/// with a [`MemoryStore`](crate::store::MemoryStore) and a fixed clock.
pub struct SyncOrchestrator<S: RepositoryStore> {
    store: S,
    queue: Arc<ChangeQueue>,
    owner: String,
    repo: String,
    conflicts: RwLock<BTreeMap<String, Conflict>>,
    state_tx: watch::Sender<SyncState>,
    pass_lock: tokio::sync::Mutex<()>,
    generation: AtomicU64,
    last_outcome: RwLock<Option<Result<SyncReport>>>,
    stats: RwLock<SyncStats>,
    clock: fn() -> DateTime<Utc>,
}

impl<S: RepositoryStore> SyncOrchestrator<S> {
    #[must_use]
    pub fn new(store: S, queue: Arc<ChangeQueue>, config: &SyncConfig) -> Self {
        let (state_tx, _) = watch::channel(SyncState::Idle);
        Self {
            store,
            queue,
            owner: config.target.owner.clone(),
            repo: config.target.repo.clone(),
            conflicts: RwLock::new(BTreeMap::new()),
            state_tx,
            pass_lock: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            last_outcome: RwLock::new(None),
            stats: RwLock::new(SyncStats::default()),
            clock: Utc::now,
        }
    }

    /// Replace the clock (tests).
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// The change queue this orchestrator drains.
    #[must_use]
    pub fn queue(&self) -> &Arc<ChangeQueue> {
        &self.queue
    }

    /// The repository store this orchestrator commits to.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current engine state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        *self.state_tx.borrow()
    }

    /// Subscribe to state transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.state_tx.subscribe()
    }

    /// Running counters.
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Capability check: is the record store present in the repository?
    ///
    /// # Errors
    ///
    /// Propagates transport failures; absence itself is `Ok(false)`.
    pub async fn probe_store(&self) -> Result<bool> {
        self.store.probe().await
    }

    /// Open conflicts, ordered by record identity.
    #[must_use]
    pub fn conflicts(&self) -> Vec<Conflict> {
        self.conflicts.read().values().cloned().collect()
    }

    /// The open conflict for a record, if any.
    #[must_use]
    pub fn conflict(&self, record_id: &str) -> Option<Conflict> {
        self.conflicts.read().get(record_id).cloned()
    }

    /// Run one reconcile pass, or wait for the in-flight one.
    ///
    /// Store I/O failures are reported inside the returned `SyncReport` as
    /// transient entries; the only fatal error is a store that was never
    /// initialized (the record file is absent).
    ///
    /// # Errors
    ///
    /// Returns `StoreNotInitialized` when the remote record file does not
    /// exist, or a database error if the local queue is unreadable.
    pub async fn reconcile(&self) -> Result<SyncReport> {
        let entered_at = self.generation.load(Ordering::Acquire);
        let _guard = self.pass_lock.lock().await;
        if self.generation.load(Ordering::Acquire) != entered_at {
            // A pass finished while we waited for the lock; its outcome
            // covers this request too, failure included.
            if let Some(outcome) = &*self.last_outcome.read() {
                debug!("reconcile coalesced into the pass that just finished");
                return match outcome {
                    Ok(report) => Ok(report.clone()),
                    Err(e) => Err(share_error(e)),
                };
            }
        }

        let result = self.run_pass().await;
        *self.last_outcome.write() = Some(match &result {
            Ok(report) => Ok(report.clone()),
            Err(e) => {
                self.stats.write().last_error = Some(e.to_string());
                Err(share_error(e))
            }
        });
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.settle_state();
        result
    }

    async fn run_pass(&self) -> Result<SyncReport> {
        let mut retried = false;
        loop {
            match self.attempt_pass(retried).await? {
                PassAttempt::Done(report) => {
                    let mut stats = self.stats.write();
                    stats.passes_completed += 1;
                    stats.records_written += report.written.len() as u64;
                    stats.edits_discarded += report.discarded.len() as u64;
                    return Ok(report);
                }
                PassAttempt::Stale => {
                    debug_assert!(!retried, "stale after retry must resolve to Done");
                    info!("write lost the precondition race; re-reading and re-merging");
                    self.stats.write().precondition_retries += 1;
                    retried = true;
                }
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    async fn attempt_pass(&self, last_attempt: bool) -> Result<PassAttempt> {
        let pending = self.queue.list()?;
        let mut report = SyncReport::default();

        // 1. Fetch remote state and the token guarding our write.
        self.state_tx.send_replace(SyncState::Fetching);
        let (bytes, token) = match self.store.read().await {
            Ok(ReadOutcome::Found { bytes, token }) => (bytes, token),
            Ok(ReadOutcome::NotFound) => {
                return Err(SyncError::StoreNotInitialized {
                    owner: self.owner.clone(),
                    repo: self.repo.clone(),
                });
            }
            Err(e) => {
                warn!(error = %e, "fetch failed; queue left untouched");
                self.note_error(&e);
                report.transient = transient_for(&pending, &e);
                report.conflicts = self.conflicts();
                return Ok(PassAttempt::Done(report));
            }
        };

        let parsed = codec::parse(&bytes);
        report.malformed_lines = parsed.skipped.len();
        if report.malformed_lines > 0 {
            warn!(
                skipped = report.malformed_lines,
                "remote record file has undecodable lines; possible data loss"
            );
        }

        // 2-4. Merge every queued edit against its remote counterpart.
        self.state_tx.send_replace(SyncState::Merging);
        let now = (self.clock)();
        let mut staged: BTreeMap<String, Record> = BTreeMap::new();
        let mut raised: BTreeMap<String, Conflict> = BTreeMap::new();
        let mut cleanly_merged: Vec<String> = Vec::new();
        let mut to_discard: Vec<(String, String)> = Vec::new();

        for edit in &pending {
            let Some(remote) = parsed.find(&edit.record_id) else {
                // The edit targets a deleted record: drop it, tell the user,
                // keep the pass going.
                to_discard.push((edit.entry_id.clone(), edit.record_id.clone()));
                continue;
            };
            match merge::merge(&edit.base, &edit.edits, remote, now) {
                MergeOutcome::Merged(merged) => {
                    debug!(record_id = %edit.record_id, "merged cleanly");
                    staged.insert(edit.record_id.clone(), merged);
                    cleanly_merged.push(edit.record_id.clone());
                }
                MergeOutcome::Conflicted { fields, .. } => {
                    info!(
                        record_id = %edit.record_id,
                        fields = fields.len(),
                        "merge conflict; user decision required"
                    );
                    raised.insert(
                        edit.record_id.clone(),
                        Conflict::new(remote, fields, edit.edits.clone(), now),
                    );
                }
            }
        }

        // 5. Commit everything staged in one guarded write. The report's
        // record set only ever reflects committed state: the fetched remote
        // on failure, the merged set once the write lands.
        let remote_records = parsed.records;
        if staged.is_empty() {
            report.records = remote_records;
        } else {
            let mut merged_records = remote_records.clone();
            for record in &mut merged_records {
                if let Some(merged) = staged.remove(&record.id) {
                    *record = merged;
                }
            }
            let payload = codec::serialize(&merged_records)?;
            self.state_tx.send_replace(SyncState::Committing);
            match self.store.write(payload, Some(&token)).await {
                Ok(WriteOutcome::Committed(_)) => {
                    for id in &cleanly_merged {
                        self.queue.remove(id)?;
                    }
                    report.written = cleanly_merged;
                    report.records = merged_records;
                }
                Ok(WriteOutcome::PreconditionFailed) => {
                    if !last_attempt {
                        return Ok(PassAttempt::Stale);
                    }
                    // Second loss in a row: report transient, retry next pass.
                    warn!("precondition failed twice; deferring to next reconcile");
                    let e = SyncError::PreconditionFailed;
                    self.note_error(&e);
                    report.transient = cleanly_merged
                        .iter()
                        .map(|id| TransientFailure {
                            record_id: id.clone(),
                            message: e.to_string(),
                        })
                        .collect();
                    report.records = remote_records;
                }
                Err(e) => {
                    warn!(error = %e, "commit failed; queue left untouched");
                    self.note_error(&e);
                    report.transient = cleanly_merged
                        .iter()
                        .map(|id| TransientFailure {
                            record_id: id.clone(),
                            message: e.to_string(),
                        })
                        .collect();
                    report.records = remote_records;
                }
            }
        }

        // 6. Apply discards for edits whose target vanished remotely.
        for (entry_id, record_id) in to_discard {
            info!(%record_id, "remote record deleted; discarding queued edit");
            self.queue.discard(&entry_id)?;
            report.discarded.push(record_id);
        }

        // 7. Refresh the conflict set: written records cannot stay
        // conflicted, newly raised conflicts replace earlier ones.
        {
            let mut open = self.conflicts.write();
            for id in &report.written {
                open.remove(id);
            }
            for id in &report.discarded {
                open.remove(id);
            }
            let raised_count = raised.len();
            for (id, conflict) in raised {
                open.insert(id, conflict);
            }
            self.stats.write().conflicts_raised += raised_count as u64;
            report.conflicts = open.values().cloned().collect();
        }

        Ok(PassAttempt::Done(report))
    }

    /// Record a decision for one field of an open conflict. When the last
    /// field is decided the conflict dissolves: the decisions become a
    /// replacement edit set on the still-queued entry, re-based onto the
    /// remote snapshot the conflict was raised against, and flow through the
    /// merge on the next pass. A remote change landing between resolution and
    /// sync diverges from that snapshot and is detected as a fresh conflict.
    ///
    /// Returns `true` when the conflict fully dissolved.
    ///
    /// # Errors
    ///
    /// Returns a validation error when no conflict is open for the record or
    /// the field is not in conflict; database failures propagate.
    pub fn resolve_conflict_field(
        &self,
        record_id: &str,
        field: FieldName,
        resolution: Resolution,
    ) -> Result<bool> {
        let resolved = {
            let mut open = self.conflicts.write();
            let Some(conflict) = open.get_mut(record_id) else {
                return Err(SyncError::validation(
                    "conflict",
                    format!("no open conflict for {record_id}"),
                ));
            };
            if !conflict.resolve(field, resolution) {
                return Err(SyncError::validation(
                    "conflict",
                    format!("field {field} is not in conflict for {record_id}"),
                ));
            }
            if !conflict.is_resolved() {
                return Ok(false);
            }
            open.remove(record_id)
        };

        if let Some(conflict) = resolved {
            let (edits, base) = conflict.into_resolution();
            if !self.queue.replace_entry(record_id, edits, &base)? {
                warn!(%record_id, "resolved conflict had no queued entry; decisions dropped");
            }
        }
        self.settle_state();
        Ok(true)
    }

    /// Drop an open conflict together with its underlying queued edit.
    ///
    /// # Errors
    ///
    /// Database failures propagate.
    pub fn discard_conflict(&self, record_id: &str) -> Result<bool> {
        let existed = self.conflicts.write().remove(record_id).is_some();
        if existed {
            self.queue.remove(record_id)?;
            info!(%record_id, "conflict and queued edit discarded");
        }
        self.settle_state();
        Ok(existed)
    }

    fn note_error(&self, e: &SyncError) {
        self.stats.write().last_error = Some(e.to_string());
    }

    fn settle_state(&self) {
        let next = if self.conflicts.read().is_empty() {
            SyncState::Idle
        } else {
            SyncState::ConflictsPending
        };
        self.state_tx.send_replace(next);
    }
}

/// Copy a pass error so both the running caller and coalesced waiters can
/// receive it. The fatal misconfiguration variant is rebuilt field-for-field;
/// everything else keeps its message through the wrapped channel.
fn share_error(e: &SyncError) -> SyncError {
    match e {
        SyncError::StoreNotInitialized { owner, repo } => SyncError::StoreNotInitialized {
            owner: owner.clone(),
            repo: repo.clone(),
        },
        other => SyncError::Other(anyhow::anyhow!("{other}")),
    }
}

fn transient_for(pending: &[QueuedEdit], e: &SyncError) -> Vec<TransientFailure> {
    pending
        .iter()
        .map(|edit| TransientFailure {
            record_id: edit.record_id.clone(),
            message: e.to_string(),
        })
        .collect()
}
