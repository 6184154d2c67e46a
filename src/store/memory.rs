//! In-memory [`RepositoryStore`] for tests and ephemeral embedders.
//!
//! Behaves like the hosted file: a versioned byte blob guarded by a token
//! that changes on every commit. Failure injection lets tests script
//! transient errors and out-of-band writes force precondition failures.

use super::{ReadOutcome, RepositoryStore, VersionToken, WriteOutcome};
use crate::error::{Result, SyncError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

#[derive(Debug, Default)]
struct Inner {
    bytes: Option<Vec<u8>>,
    version: u64,
}

impl Inner {
    fn token(&self) -> VersionToken {
        VersionToken::new(format!("v{}", self.version))
    }
}

/// Versioned in-memory record file.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_reads: AtomicU32,
    fail_writes: AtomicU32,
    probe_result: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryStore {
    /// An empty store: reads answer `NotFound` until something is written.
    #[must_use]
    pub fn new() -> Self {
        Self {
            probe_result: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// A store seeded with file contents at version 1.
    #[must_use]
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        let store = Self::new();
        store.put(bytes);
        store
    }

    /// Replace the file contents out of band, bumping the version. Simulates
    /// a concurrent writer: any token handed out before this call goes stale.
    pub fn put(&self, bytes: Vec<u8>) {
        let mut inner = self.inner.lock();
        inner.bytes = Some(bytes);
        inner.version += 1;
    }

    /// Current file contents, if any.
    #[must_use]
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.inner.lock().bytes.clone()
    }

    /// Current version counter.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.lock().version
    }

    /// Fail the next `n` reads with a transient error.
    pub fn inject_read_failures(&self, n: u32) {
        self.fail_reads.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` writes with a transient error.
    pub fn inject_write_failures(&self, n: u32) {
        self.fail_writes.store(n, Ordering::SeqCst);
    }

    /// Script the probe answer.
    pub fn set_probe_result(&self, present: bool) {
        self.probe_result.store(present, Ordering::SeqCst);
    }

    /// Total reads served (including injected failures).
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Total write attempts (including rejected ones).
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl RepositoryStore for MemoryStore {
    async fn read(&self) -> Result<ReadOutcome> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.fail_reads) {
            return Err(SyncError::Api {
                status: 503,
                message: "injected read failure".to_string(),
            });
        }
        let inner = self.inner.lock();
        Ok(match &inner.bytes {
            Some(bytes) => ReadOutcome::Found {
                bytes: bytes.clone(),
                token: inner.token(),
            },
            None => ReadOutcome::NotFound,
        })
    }

    async fn write(
        &self,
        bytes: Vec<u8>,
        expected: Option<&VersionToken>,
    ) -> Result<WriteOutcome> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.fail_writes) {
            return Err(SyncError::Api {
                status: 503,
                message: "injected write failure".to_string(),
            });
        }
        let mut inner = self.inner.lock();
        let stale = match expected {
            Some(token) => *token != inner.token(),
            // Unguarded writes are create-only, like the hosting API.
            None => inner.bytes.is_some(),
        };
        if stale {
            return Ok(WriteOutcome::PreconditionFailed);
        }
        inner.bytes = Some(bytes);
        inner.version += 1;
        Ok(WriteOutcome::Committed(inner.token()))
    }

    async fn probe(&self) -> Result<bool> {
        Ok(self.probe_result.load(Ordering::SeqCst))
    }
}
