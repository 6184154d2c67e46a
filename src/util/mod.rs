//! Shared utilities for `issuesync`.
//!
//! - Timestamp serialization (RFC3339, fixed write form)
//! - Queue entry ID generation (SHA256)

pub mod id;
pub mod time;

pub use id::entry_id;
pub use time::{format_timestamp, parse_timestamp};
