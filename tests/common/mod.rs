#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use issuesync::config::{RepoTarget, SyncConfig};
use issuesync::model::{EditSet, IssueType, Priority, Record, Status};
use std::sync::Once;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(issuesync::logging::init_test_logging);
}

pub fn test_config() -> SyncConfig {
    SyncConfig::new(RepoTarget::new("acme", "issues"))
}

pub mod fixtures {
    use super::*;

    pub fn record(id: &str) -> Record {
        Record {
            id: id.to_string(),
            title: format!("Issue {id}"),
            description: None,
            status: Status::Open,
            priority: Priority(2),
            issue_type: IssueType::Task,
            assignee: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_at: None,
            closed_at: None,
            parent: None,
            comments: None,
        }
    }

    pub fn title_edit(title: &str) -> EditSet {
        EditSet {
            title: Some(title.to_string()),
            ..EditSet::default()
        }
    }

    pub fn status_edit(status: Status) -> EditSet {
        EditSet {
            status: Some(status),
            ..EditSet::default()
        }
    }

    pub fn priority_edit(priority: i32) -> EditSet {
        EditSet {
            priority: Some(Priority(priority)),
            ..EditSet::default()
        }
    }

    /// Serialize records to the wire form for seeding a store.
    pub fn wire(records: &[Record]) -> Vec<u8> {
        issuesync::codec::serialize(records).unwrap()
    }
}
