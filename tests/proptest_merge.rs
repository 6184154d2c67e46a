//! Property-based tests for the three-way merge and the wire codec.
//!
//! Uses proptest to verify that:
//! - An unchanged remote always merges cleanly (no false conflicts)
//! - An empty edit set yields the remote record verbatim
//! - Convergent edits never raise a conflict
//! - Merge is deterministic
//! - Arbitrary records survive the newline-delimited JSON wire form

use chrono::{DateTime, TimeZone, Utc};
use proptest::option;
use proptest::prelude::*;

use issuesync::codec;
use issuesync::merge::{MergeOutcome, merge};
use issuesync::model::{EditSet, IssueType, Priority, Record, Status};

fn status_strategy() -> impl Strategy<Value = Status> {
    prop_oneof![
        Just(Status::Open),
        Just(Status::InProgress),
        Just(Status::Closed),
    ]
}

fn issue_type_strategy() -> impl Strategy<Value = IssueType> {
    prop_oneof![
        Just(IssueType::Task),
        Just(IssueType::Bug),
        Just(IssueType::Feature),
        Just(IssueType::Epic),
    ]
}

fn priority_strategy() -> impl Strategy<Value = Priority> {
    (1..=4i32).prop_map(Priority)
}

// The wire form carries whole seconds only.
fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..=4_102_444_800).prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}

fn record_strategy() -> impl Strategy<Value = Record> {
    (
        (
            "[a-z]{1,8}-[0-9]{1,4}",
            "\\PC{1,40}",
            option::of("[a-zA-Z0-9 .,]{0,80}"),
            status_strategy(),
            priority_strategy(),
        ),
        (
            issue_type_strategy(),
            option::of("[a-z]{1,12}"),
            timestamp_strategy(),
            option::of(timestamp_strategy()),
            option::of(timestamp_strategy()),
        ),
        option::of("[a-z]{1,8}-[0-9]{1,4}"),
    )
        .prop_map(
            |(
                (id, title, description, status, priority),
                (issue_type, assignee, created_at, updated_at, closed_at),
                parent,
            )| Record {
                id,
                title,
                description,
                status,
                priority,
                issue_type,
                assignee,
                created_at,
                updated_at,
                closed_at,
                parent,
                comments: None,
            },
        )
}

fn edit_set_strategy() -> impl Strategy<Value = EditSet> {
    (
        option::of("\\PC{1,40}"),
        option::of(option::of("[a-zA-Z0-9 ]{0,60}")),
        option::of(status_strategy()),
        option::of(priority_strategy()),
        option::of(option::of("[a-z]{1,12}")),
    )
        .prop_map(|(title, description, status, priority, assignee)| EditSet {
            title,
            description,
            status,
            priority,
            assignee,
        })
}

fn merge_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        ..ProptestConfig::default()
    })]

    /// An unchanged remote can never conflict: every edited field lands and
    /// every untouched field keeps the remote value.
    #[test]
    fn unchanged_remote_merges_cleanly(
        base in record_strategy(),
        edits in edit_set_strategy(),
    ) {
        let remote = base.clone();
        match merge(&base, &edits, &remote, merge_instant()) {
            MergeOutcome::Merged(m) => {
                if let Some(title) = &edits.title {
                    prop_assert_eq!(&m.title, title);
                } else {
                    prop_assert_eq!(&m.title, &remote.title);
                }
                if let Some(status) = edits.status {
                    prop_assert_eq!(m.status, status);
                } else {
                    prop_assert_eq!(m.status, remote.status);
                }
                if let Some(priority) = edits.priority {
                    prop_assert_eq!(m.priority, priority);
                } else {
                    prop_assert_eq!(m.priority, remote.priority);
                }
                // Non-editable fields always pass through.
                prop_assert_eq!(m.issue_type, remote.issue_type);
                prop_assert_eq!(&m.parent, &remote.parent);
                prop_assert_eq!(m.created_at, remote.created_at);
            }
            MergeOutcome::Conflicted { fields, .. } => {
                prop_assert!(false, "false conflict on unchanged remote: {fields:?}");
            }
        }
    }

    /// No local edit means the remote state is already the answer.
    #[test]
    fn empty_edit_set_is_identity(
        base in record_strategy(),
        remote in record_strategy(),
    ) {
        let outcome = merge(&base, &EditSet::default(), &remote, merge_instant());
        prop_assert_eq!(outcome, MergeOutcome::Merged(remote));
    }

    /// Both sides moving a field to the identical value never conflicts,
    /// even though the remote differs from the base.
    #[test]
    fn convergent_status_edit_never_conflicts(
        base in record_strategy(),
        target in status_strategy(),
    ) {
        let mut remote = base.clone();
        remote.status = target;
        let edits = EditSet { status: Some(target), ..EditSet::default() };

        let outcome = merge(&base, &edits, &remote, merge_instant());
        prop_assert!(outcome.is_clean(), "convergent edit conflicted: {outcome:?}");
    }

    /// Identical inputs always produce identical results.
    #[test]
    fn merge_is_deterministic(
        base in record_strategy(),
        edits in edit_set_strategy(),
        remote in record_strategy(),
    ) {
        let first = merge(&base, &edits, &remote, merge_instant());
        let second = merge(&base, &edits, &remote, merge_instant());
        prop_assert_eq!(first, second);
    }

    /// Any record this crate can build survives the wire form unchanged.
    #[test]
    fn record_survives_wire_form(records in proptest::collection::vec(record_strategy(), 0..8)) {
        let bytes = codec::serialize(&records).unwrap();
        let parsed = codec::parse(&bytes);
        prop_assert!(parsed.skipped.is_empty(), "skipped: {:?}", parsed.skipped);
        prop_assert_eq!(parsed.records, records);
    }
}
