//! Offline-first sync engine for an issue tracker whose source of truth is a
//! newline-delimited JSON file in a hosted repository.
//!
//! There is no database server: every read and write is a call against the
//! host's file-contents endpoint, guarded by its optimistic-concurrency
//! content hash. This crate provides the pieces that make that substrate
//! behave: the record codec, a pure three-way merge, a durable queue of
//! offline edits, and the orchestrator that replays the queue with
//! precondition-protected writes and surfaces real conflicts to the user.
//!
//! ```no_run
//! use std::sync::Arc;
//! use issuesync::config::{RepoTarget, SyncConfig};
//! use issuesync::queue::ChangeQueue;
//! use issuesync::store::GitHubStore;
//! use issuesync::sync::SyncOrchestrator;
//!
//! # async fn run() -> issuesync::Result<()> {
//! let config = SyncConfig::new(RepoTarget::new("acme", "issues"));
//! let store = GitHubStore::new(&config)?;
//! let queue = Arc::new(ChangeQueue::open(&config.queue_db)?);
//! let orchestrator = SyncOrchestrator::new(store, queue, &config);
//!
//! let report = orchestrator.reconcile().await?;
//! for conflict in report.conflicts {
//!     // surface to the user for per-field decisions
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod merge;
pub mod model;
pub mod queue;
pub mod storage;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Result, SyncError};
pub use merge::{MergeOutcome, merge};
pub use model::{
    Conflict, ConflictingField, EditSet, FieldName, IssueType, Priority, QueuedEdit, Record,
    Resolution, Status,
};
pub use queue::ChangeQueue;
pub use store::{ReadOutcome, RepositoryStore, VersionToken, WriteOutcome};
pub use sync::{SyncOrchestrator, SyncReport, SyncState, SyncStats, TransientFailure};
