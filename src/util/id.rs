//! Queue entry ID generation.
//!
//! Entry IDs are `qe-<hash>` where hash is the first 12 hex chars of a SHA256
//! over the record identity and enqueue time. They identify a queue entry for
//! `discard` independently of the record identity.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Generate a stable entry ID for a queued edit.
#[must_use]
pub fn entry_id(record_id: &str, queued_at: &DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record_id.as_bytes());
    hasher.update([0]);
    hasher.update(queued_at.to_rfc3339().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest[..6].iter().map(|b| format!("{b:02x}")).collect();
    format!("qe-{hex}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_id_is_deterministic() {
        let at = Utc::now();
        assert_eq!(entry_id("task-001", &at), entry_id("task-001", &at));
    }

    #[test]
    fn entry_id_varies_by_record() {
        let at = Utc::now();
        assert_ne!(entry_id("task-001", &at), entry_id("task-002", &at));
    }

    #[test]
    fn entry_id_format() {
        let id = entry_id("task-001", &Utc::now());
        assert!(id.starts_with("qe-"));
        assert_eq!(id.len(), 15);
    }
}
