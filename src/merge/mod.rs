//! Three-way merge of one record.
//!
//! Reconciles {base snapshot, local edit set, remote record} per field. The
//! base distinguishes "remote moved since the edit was captured" from "remote
//! unchanged": an edit lands cleanly when remote still matches base, converges
//! silently when both sides chose the same value, and conflicts otherwise.
//!
//! `merge` is pure: no I/O, no argument mutation, identical inputs always
//! produce an identical result. The merge instant is supplied by the caller.

use crate::model::{ConflictingField, EditSet, FieldName, Record};
use chrono::{DateTime, Utc};

/// Result of merging one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Every edited field either landed cleanly or converged with remote.
    Merged(Record),
    /// At least one field diverged. `merged` keeps the remote value for each
    /// conflicting field as a placeholder; it must not be committed until the
    /// conflict is resolved.
    Conflicted {
        merged: Record,
        fields: Vec<ConflictingField>,
    },
}

impl MergeOutcome {
    /// Did the merge complete without conflicts?
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        matches!(self, Self::Merged(_))
    }
}

// Absent optionals compare as empty string, for comparison only; the stored
// value stays None.
fn opt_str(v: Option<&str>) -> &str {
    v.unwrap_or("")
}

/// Merge the local edit set against the remote record, using the base
/// snapshot as the common ancestor.
///
/// Fields untouched by the edit set always take the remote value (the most
/// recent committed state). Record fields outside the editable set
/// (`issue_type`, `parent`, `comments`, timestamps) pass through from remote.
/// An empty edit set yields `Merged(remote)` verbatim; a clean non-empty
/// merge stamps `updated_at` with `merged_at`.
#[must_use]
pub fn merge(
    base: &Record,
    edits: &EditSet,
    remote: &Record,
    merged_at: DateTime<Utc>,
) -> MergeOutcome {
    if edits.is_empty() {
        return MergeOutcome::Merged(remote.clone());
    }

    let mut merged = remote.clone();
    let mut fields = Vec::new();

    if let Some(edited) = &edits.title {
        if remote.title == base.title {
            merged.title = edited.clone();
        } else if remote.title != *edited {
            fields.push(ConflictingField {
                field: FieldName::Title,
                base: base.title.clone(),
                local: edited.clone(),
                remote: remote.title.clone(),
            });
        }
    }

    if let Some(edited) = &edits.description {
        let edited_cmp = opt_str(edited.as_deref());
        let base_cmp = opt_str(base.description.as_deref());
        let remote_cmp = opt_str(remote.description.as_deref());
        if remote_cmp == base_cmp {
            merged.description = edited.clone();
        } else if remote_cmp != edited_cmp {
            fields.push(ConflictingField {
                field: FieldName::Description,
                base: base_cmp.to_string(),
                local: edited_cmp.to_string(),
                remote: remote_cmp.to_string(),
            });
        }
    }

    if let Some(edited) = edits.status {
        if remote.status == base.status {
            merged.status = edited;
        } else if remote.status != edited {
            fields.push(ConflictingField {
                field: FieldName::Status,
                base: base.status.to_string(),
                local: edited.to_string(),
                remote: remote.status.to_string(),
            });
        }
    }

    if let Some(edited) = edits.priority {
        if remote.priority.0 == base.priority.0 {
            merged.priority = edited;
        } else if remote.priority.0 != edited.0 {
            fields.push(ConflictingField {
                field: FieldName::Priority,
                base: base.priority.to_string(),
                local: edited.to_string(),
                remote: remote.priority.to_string(),
            });
        }
    }

    if let Some(edited) = &edits.assignee {
        let edited_cmp = opt_str(edited.as_deref());
        let base_cmp = opt_str(base.assignee.as_deref());
        let remote_cmp = opt_str(remote.assignee.as_deref());
        if remote_cmp == base_cmp {
            merged.assignee = edited.clone();
        } else if remote_cmp != edited_cmp {
            fields.push(ConflictingField {
                field: FieldName::Assignee,
                base: base_cmp.to_string(),
                local: edited_cmp.to_string(),
                remote: remote_cmp.to_string(),
            });
        }
    }

    if fields.is_empty() {
        merged.updated_at = Some(merged_at);
        MergeOutcome::Merged(merged)
    } else {
        MergeOutcome::Conflicted { merged, fields }
    }
}
