//! Core data types for `issuesync`.
//!
//! This module defines the fundamental types used throughout the engine:
//! - `Record` - The canonical issue entity, one JSON line in the store
//! - `Status` / `Priority` / `IssueType` - Field value types
//! - `EditSet` - Sparse field-level proposed changes
//! - `QueuedEdit` - An edit set pending synchronization, with its merge base
//! - `Conflict` - Unresolved per-field divergence (see `conflict` submodule)

mod conflict;

pub use conflict::{Conflict, ConflictingField, Resolution};

use crate::util::time::{rfc3339, rfc3339_opt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Record lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Open,
    InProgress,
    Closed,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Status {
    type Err = crate::error::SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "in_progress" | "inprogress" => Ok(Self::InProgress),
            "closed" => Ok(Self::Closed),
            other => Err(crate::error::SyncError::InvalidStatus {
                status: other.to_string(),
            }),
        }
    }
}

/// Record priority (1=Highest, 4=Lowest).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Priority(pub i32);

impl Priority {
    pub const HIGHEST: Self = Self(1);
    pub const HIGH: Self = Self(2);
    pub const MEDIUM: Self = Self(3);
    pub const LOW: Self = Self(4);

    /// Is the ordinal inside the valid 1-4 range?
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 1 && self.0 <= 4
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::MEDIUM
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl FromStr for Priority {
    type Err = crate::error::SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        let val = upper.strip_prefix('P').unwrap_or(&upper);

        match val.parse::<i32>() {
            Ok(p) if (1..=4).contains(&p) => Ok(Self(p)),
            _ => Err(crate::error::SyncError::InvalidPriority {
                priority: s.trim().to_string(),
            }),
        }
    }
}

/// Record type category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    #[default]
    Task,
    Bug,
    Feature,
    Epic,
}

impl IssueType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Bug => "bug",
            Self::Feature => "feature",
            Self::Epic => "epic",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IssueType {
    type Err = crate::error::SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "task" => Ok(Self::Task),
            "bug" => Ok(Self::Bug),
            "feature" => Ok(Self::Feature),
            "epic" => Ok(Self::Epic),
            other => Err(crate::error::SyncError::InvalidType {
                issue_type: other.to_string(),
            }),
        }
    }
}

/// The canonical issue entity, one JSON object per line in the record file.
///
/// Every key is emitted on write (optionals as explicit `null`) so a record
/// line always carries the full field set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    /// Unique ID, assigned once at creation. The merge key; never changes.
    pub id: String,

    /// Title.
    pub title: String,

    /// Detailed description.
    #[serde(default)]
    pub description: Option<String>,

    /// Workflow status.
    #[serde(default)]
    pub status: Status,

    /// Priority (1=Highest, 4=Lowest).
    #[serde(default)]
    pub priority: Priority,

    /// Record type (bug, feature, task, epic). Not locally editable.
    #[serde(default)]
    pub issue_type: IssueType,

    /// Assigned user.
    #[serde(default)]
    pub assignee: Option<String>,

    /// Creation timestamp.
    #[serde(with = "rfc3339")]
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    #[serde(default, with = "rfc3339_opt")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Closure timestamp.
    #[serde(default, with = "rfc3339_opt")]
    pub closed_at: Option<DateTime<Utc>>,

    /// Parent record ID (non-owning reference). Not locally editable.
    #[serde(default)]
    pub parent: Option<String>,

    /// Opaque comment blob. Not locally editable.
    #[serde(default)]
    pub comments: Option<String>,
}

impl Record {
    /// Validate invariants that the store relies on.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the ID or title is empty, or the
    /// priority ordinal falls outside 1-4.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.id.trim().is_empty() {
            return Err(crate::error::SyncError::validation("id", "must not be empty"));
        }
        if self.title.trim().is_empty() {
            return Err(crate::error::SyncError::validation(
                "title",
                "must not be empty",
            ));
        }
        if !self.priority.is_valid() {
            return Err(crate::error::SyncError::InvalidPriority {
                priority: self.priority.0.to_string(),
            });
        }
        Ok(())
    }
}

/// The record fields subject to local editing and three-way merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Title,
    Description,
    Status,
    Priority,
    Assignee,
}

impl FieldName {
    /// All editable fields, in display order.
    pub const ALL: [Self; 5] = [
        Self::Title,
        Self::Description,
        Self::Status,
        Self::Priority,
        Self::Assignee,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::Status => "status",
            Self::Priority => "priority",
            Self::Assignee => "assignee",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Distinguishes an explicit `null` (clear the field) from an absent key
/// (leave unchanged) when deserializing clearable optionals.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A sparse set of proposed field changes to one record.
///
/// Each field is present-with-new-value or absent-meaning-unchanged. For the
/// clearable optionals (`description`, `assignee`) the inner option encodes
/// "set to this" vs "clear".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub description: Option<Option<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub assignee: Option<Option<String>>,
}

impl EditSet {
    /// An edit set with all fields absent is inert and must not be queued.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.assignee.is_none()
    }

    /// Does this edit set touch the given field?
    #[must_use]
    pub const fn touches(&self, field: FieldName) -> bool {
        match field {
            FieldName::Title => self.title.is_some(),
            FieldName::Description => self.description.is_some(),
            FieldName::Status => self.status.is_some(),
            FieldName::Priority => self.priority.is_some(),
            FieldName::Assignee => self.assignee.is_some(),
        }
    }

    /// Fields touched by this edit set, in display order.
    #[must_use]
    pub fn touched(&self) -> Vec<FieldName> {
        FieldName::ALL
            .into_iter()
            .filter(|f| self.touches(*f))
            .collect()
    }

    /// Fold a later edit set into this one: later field values win, untouched
    /// fields keep their current value.
    pub fn fold(&mut self, later: Self) {
        if later.title.is_some() {
            self.title = later.title;
        }
        if later.description.is_some() {
            self.description = later.description;
        }
        if later.status.is_some() {
            self.status = later.status;
        }
        if later.priority.is_some() {
            self.priority = later.priority;
        }
        if later.assignee.is_some() {
            self.assignee = later.assignee;
        }
    }

    /// Apply the edits to a record, returning the modified copy.
    #[must_use]
    pub fn apply_to(&self, record: &Record) -> Record {
        let mut out = record.clone();
        if let Some(title) = &self.title {
            out.title = title.clone();
        }
        if let Some(description) = &self.description {
            out.description = description.clone();
        }
        if let Some(status) = self.status {
            out.status = status;
        }
        if let Some(priority) = self.priority {
            out.priority = priority;
        }
        if let Some(assignee) = &self.assignee {
            out.assignee = assignee.clone();
        }
        out
    }
}

/// An edit set bound to its record, merge-ancestor snapshot, and queue entry
/// identity, pending synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedEdit {
    /// Stable queue-entry identity (for `discard`).
    pub entry_id: String,

    /// Identity of the record being edited.
    pub record_id: String,

    /// The proposed field changes.
    pub edits: EditSet,

    /// The record as known locally at edit time. Used as the three-way merge
    /// ancestor; never advanced by folding later edits in.
    pub base: Record,

    /// When the entry was first queued.
    #[serde(with = "rfc3339")]
    pub queued_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str) -> Record {
        Record {
            id: id.to_string(),
            title: "Test".to_string(),
            description: None,
            status: Status::Open,
            priority: Priority::MEDIUM,
            issue_type: IssueType::Task,
            assignee: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_at: None,
            closed_at: None,
            parent: None,
            comments: None,
        }
    }

    #[test]
    fn status_wire_form() {
        assert_eq!(
            serde_json::to_string(&Status::InProgress).unwrap(),
            "\"in_progress\""
        );
        let status: Status = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(status, Status::InProgress);
    }

    #[test]
    fn priority_parse_rejects_out_of_range() {
        assert!("P0".parse::<Priority>().is_err());
        assert!("5".parse::<Priority>().is_err());
        assert_eq!("p3".parse::<Priority>().unwrap(), Priority::MEDIUM);
    }

    #[test]
    fn priority_parse_error_names_the_input() {
        let err = "urgent".parse::<Priority>().unwrap_err();
        match err {
            crate::error::SyncError::InvalidPriority { priority } => {
                assert_eq!(priority, "urgent");
            }
            other => panic!("unexpected error: {other}"),
        }
        let err = " P9 ".parse::<Priority>().unwrap_err();
        assert!(err.to_string().contains("P9"));
    }

    #[test]
    fn record_emits_full_key_set() {
        let json = serde_json::to_string(&record("task-001")).unwrap();
        for key in [
            "id",
            "title",
            "description",
            "status",
            "priority",
            "issue_type",
            "assignee",
            "created_at",
            "updated_at",
            "closed_at",
            "parent",
            "comments",
        ] {
            assert!(json.contains(&format!("\"{key}\"")), "missing key {key}");
        }
        assert!(json.contains("\"description\":null"));
    }

    #[test]
    fn record_validate_rejects_bad_priority() {
        let mut r = record("task-001");
        r.priority = Priority(0);
        assert!(r.validate().is_err());
    }

    #[test]
    fn edit_set_null_clears_absent_leaves() {
        let edits: EditSet = serde_json::from_str(r#"{"assignee":null}"#).unwrap();
        assert_eq!(edits.assignee, Some(None));
        assert!(edits.description.is_none());

        let edits: EditSet = serde_json::from_str(r#"{"assignee":"alice"}"#).unwrap();
        assert_eq!(edits.assignee, Some(Some("alice".to_string())));
    }

    #[test]
    fn edit_set_fold_later_wins() {
        let mut first = EditSet {
            title: Some("first".to_string()),
            priority: Some(Priority::HIGH),
            ..EditSet::default()
        };
        let second = EditSet {
            title: Some("second".to_string()),
            status: Some(Status::Closed),
            ..EditSet::default()
        };
        first.fold(second);
        assert_eq!(first.title.as_deref(), Some("second"));
        assert_eq!(first.priority, Some(Priority::HIGH));
        assert_eq!(first.status, Some(Status::Closed));
    }

    #[test]
    fn edit_set_apply_to_clears_optional() {
        let mut base = record("task-001");
        base.assignee = Some("bob".to_string());
        let edits = EditSet {
            assignee: Some(None),
            ..EditSet::default()
        };
        let out = edits.apply_to(&base);
        assert!(out.assignee.is_none());
        // Untouched fields are carried over.
        assert_eq!(out.title, base.title);
    }

    #[test]
    fn empty_edit_set_is_inert() {
        assert!(EditSet::default().is_empty());
        assert!(EditSet::default().touched().is_empty());
    }
}
