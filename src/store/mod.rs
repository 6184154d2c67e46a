//! Repository store boundary.
//!
//! The sole source of truth is a single file in a hosted repository. The
//! hosting API offers exactly one concurrency primitive: every read returns a
//! content hash, and every write must present the hash it read. This module
//! abstracts that contract so the engine depends on `read`/`write`/`probe`
//! only, never on transport detail.

pub mod github;
pub mod memory;

pub use github::GitHubStore;
pub use memory::MemoryStore;

use crate::error::Result;
use std::future::Future;

/// Opaque optimistic-concurrency token returned with every read and consumed
/// by exactly one write attempt. A failed precondition invalidates it; the
/// caller must re-read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(String);

impl VersionToken {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of reading the record file.
#[derive(Debug, Clone)]
pub enum ReadOutcome {
    /// The file exists; bytes plus the token guarding the next write.
    Found {
        bytes: Vec<u8>,
        token: VersionToken,
    },
    /// The file does not exist in the repository.
    NotFound,
}

/// Result of a precondition-guarded write.
#[derive(Debug, Clone)]
pub enum WriteOutcome {
    /// The write landed; the token guards the next write.
    Committed(VersionToken),
    /// Someone else wrote concurrently; re-read and retry.
    PreconditionFailed,
}

/// The record-file store the engine reads from and writes to.
///
/// Implementations perform network I/O; all methods are asynchronous, and the
/// returned futures are cancel-safe from the engine's perspective (dropping
/// one mid-flight never corrupts engine state).
pub trait RepositoryStore: Send + Sync {
    /// Read the record file and its version token.
    fn read(&self) -> impl Future<Output = Result<ReadOutcome>> + Send;

    /// Replace the record file, guarded by the token from a prior read.
    /// `None` performs the first-ever write (file must not exist yet).
    fn write(
        &self,
        bytes: Vec<u8>,
        expected: Option<&VersionToken>,
    ) -> impl Future<Output = Result<WriteOutcome>> + Send;

    /// Capability check: does the store marker directory exist in the
    /// repository? Absence is a normal `false`, not an error.
    fn probe(&self) -> impl Future<Output = Result<bool>> + Send;
}
