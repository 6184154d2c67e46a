//! Error types for `issuesync`.
//!
//! # Design
//!
//! - Uses `thiserror` for derive-based error types
//! - Structured variants for the failure taxonomy the orchestrator cares
//!   about: transient network failures, precondition races, and fatal
//!   misconfiguration
//! - Malformed record lines and merge conflicts are NOT errors; the codec and
//!   merge engine return tagged results instead

use thiserror::Error;

/// Primary error type for `issuesync` operations.
#[derive(Error, Debug)]
pub enum SyncError {
    // === Repository store errors ===
    /// The record store was never initialized in the target repository.
    ///
    /// This is a fatal misconfiguration: the repository must be registered
    /// (probe succeeded, record file present) before reconcile runs.
    #[error("Record store not initialized in {owner}/{repo}")]
    StoreNotInitialized { owner: String, repo: String },

    /// A write was rejected because the version token was stale.
    ///
    /// Expected outcome of a concurrent remote write; the orchestrator
    /// retries once with a fresh read before reporting it as transient.
    #[error("Precondition failed: remote changed since last read")]
    PreconditionFailed,

    /// The hosting API answered with an unexpected status.
    #[error("Hosting API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP transport failure (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === Queue errors ===
    /// The offline editing window has expired; new local edits are rejected
    /// until a new window is granted.
    #[error("Offline edit window expired at {expired_at}")]
    EditWindowExpired { expired_at: chrono::DateTime<chrono::Utc> },

    /// Refusing to queue an edit set with no field changes.
    #[error("Empty edit set for {record_id}")]
    EmptyEditSet { record_id: String },

    /// Queue database error.
    #[error("Queue database error: {0}")]
    Database(#[from] rusqlite::Error),

    // === Validation errors ===
    /// Field validation failed.
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Invalid status value.
    #[error("Invalid status: {status}")]
    InvalidStatus { status: String },

    /// Invalid issue type value.
    #[error("Invalid issue type: {issue_type}")]
    InvalidType { issue_type: String },

    /// Priority out of valid range (1-4).
    #[error("Priority must be 1-4, got: {priority}")]
    InvalidPriority { priority: String },

    // === Configuration errors ===
    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    // === I/O and serialization ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Wrapped error with additional context.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Will retrying on the next reconcile pass plausibly succeed?
    ///
    /// Transient failures leave the queue untouched and are reported in the
    /// `SyncReport` rather than propagated.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::PreconditionFailed => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Convenience result type for `issuesync` operations.
pub type Result<T> = std::result::Result<T, SyncError>;
