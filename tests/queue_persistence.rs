//! Durability tests for the change queue: entries and the edit window must
//! survive process restarts (simulated by reopening the database file).

mod common;

use common::{fixtures, init_test_logging, test_config};
use issuesync::model::Status;
use issuesync::queue::ChangeQueue;
use issuesync::store::MemoryStore;
use issuesync::sync::SyncOrchestrator;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn queued_edit_survives_reopen() {
    init_test_logging();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("queue.db");
    let base = fixtures::record("task-001");
    let now = Utc::now();

    {
        let queue = ChangeQueue::open(&path).unwrap();
        queue
            .enqueue("task-001", fixtures::title_edit("offline rename"), &base, now)
            .unwrap();
    }

    let queue = ChangeQueue::open(&path).unwrap();
    assert_eq!(queue.len().unwrap(), 1);
    let entry = queue.get("task-001").unwrap().unwrap();
    assert_eq!(entry.edits.title.as_deref(), Some("offline rename"));
    assert_eq!(entry.base, base);
    // Timestamps narrow to whole seconds across the database trip.
    assert_eq!(entry.queued_at.timestamp(), now.timestamp());
}

#[test]
fn folded_edits_stay_one_entry_across_reopen() {
    init_test_logging();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("queue.db");
    let base = fixtures::record("task-001");
    let now = Utc::now();

    {
        let queue = ChangeQueue::open(&path).unwrap();
        queue
            .enqueue("task-001", fixtures::title_edit("first"), &base, now)
            .unwrap();
    }
    {
        // Second session edits the same record before any reconcile ran.
        let queue = ChangeQueue::open(&path).unwrap();
        queue
            .enqueue(
                "task-001",
                fixtures::status_edit(Status::Closed),
                &base,
                now + Duration::minutes(10),
            )
            .unwrap();
    }

    let queue = ChangeQueue::open(&path).unwrap();
    assert_eq!(queue.len().unwrap(), 1);
    let entry = queue.get("task-001").unwrap().unwrap();
    assert_eq!(entry.edits.title.as_deref(), Some("first"));
    assert_eq!(entry.edits.status, Some(Status::Closed));
    assert_eq!(entry.queued_at.timestamp(), now.timestamp());
}

#[test]
fn edit_window_survives_reopen() {
    init_test_logging();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("queue.db");
    let now = Utc::now();
    let expires = now + Duration::hours(1);

    {
        let queue = ChangeQueue::open(&path).unwrap();
        queue.grant_edit_window(expires).unwrap();
    }

    let queue = ChangeQueue::open(&path).unwrap();
    assert!(queue.edits_permitted(now).unwrap());
    assert!(!queue.edits_permitted(expires + Duration::seconds(1)).unwrap());
    assert_eq!(
        queue.edit_window().unwrap().unwrap().timestamp(),
        expires.timestamp()
    );

    queue.clear_edit_window().unwrap();
    assert!(queue.edits_permitted(expires + Duration::days(7)).unwrap());
}

#[tokio::test]
async fn reconcile_drains_disk_backed_queue() {
    init_test_logging();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("queue.db");
    let base = fixtures::record("task-001");

    {
        let queue = ChangeQueue::open(&path).unwrap();
        queue
            .enqueue("task-001", fixtures::priority_edit(1), &base, Utc::now())
            .unwrap();
    }

    // Restart: a fresh queue handle over the same file feeds the sync.
    let queue = Arc::new(ChangeQueue::open(&path).unwrap());
    let store = MemoryStore::with_bytes(fixtures::wire(&[base]));
    let orch = SyncOrchestrator::new(store, Arc::clone(&queue), &test_config());

    let report = orch.reconcile().await.unwrap();
    assert_eq!(report.written, vec!["task-001"]);
    assert_eq!(report.records[0].priority.0, 1);
    assert!(queue.is_empty().unwrap());

    // The drained state is durable too.
    drop(queue);
    let reopened = ChangeQueue::open(&path).unwrap();
    assert!(reopened.is_empty().unwrap());
}
