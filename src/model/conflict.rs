//! Conflict entities surfaced when divergent edits cannot be auto-merged.

use super::{EditSet, FieldName, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One field on which local and remote edits diverge. Values are display
/// strings ready for a resolution UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictingField {
    pub field: FieldName,
    pub base: String,
    pub local: String,
    pub remote: String,
}

/// Per-field user decision when resolving a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Keep the locally edited value.
    KeepLocal,
    /// Take the value committed remotely.
    TakeRemote,
}

/// Unresolved per-field divergence for one record.
///
/// A conflict is terminal until every field is resolved; resolving a field
/// removes it from the set, and an empty field set dissolves the conflict.
/// The typed edit set and remote snapshot are kept so that a fully resolved
/// conflict can be converted back into an `EditSet` and replayed through the
/// merge on the next reconcile pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Identity of the conflicted record.
    pub record_id: String,

    /// Title for display (taken from the remote copy, the latest committed
    /// state).
    pub title: String,

    /// The still-undecided fields, in display order.
    pub fields: Vec<ConflictingField>,

    /// When the conflict was raised.
    pub raised_at: DateTime<Utc>,

    /// The local edit set that produced the conflict.
    local_edits: EditSet,

    /// The remote record the merge ran against.
    remote: Record,

    /// Decisions recorded so far.
    decisions: BTreeMap<FieldName, Resolution>,
}

impl Conflict {
    #[must_use]
    pub fn new(
        remote: &Record,
        fields: Vec<ConflictingField>,
        local_edits: EditSet,
        raised_at: DateTime<Utc>,
    ) -> Self {
        Self {
            record_id: remote.id.clone(),
            title: remote.title.clone(),
            fields,
            raised_at,
            local_edits,
            remote: remote.clone(),
            decisions: BTreeMap::new(),
        }
    }

    /// Record a decision for one conflicting field, removing it from the
    /// undecided set. Returns `false` when the field was not in conflict.
    pub fn resolve(&mut self, field: FieldName, resolution: Resolution) -> bool {
        let before = self.fields.len();
        self.fields.retain(|f| f.field != field);
        if self.fields.len() == before {
            return false;
        }
        self.decisions.insert(field, resolution);
        true
    }

    /// All fields decided?
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.fields.is_empty()
    }

    /// Decisions recorded so far.
    #[must_use]
    pub const fn decisions(&self) -> &BTreeMap<FieldName, Resolution> {
        &self.decisions
    }

    /// Convert a fully resolved conflict back into an edit set plus the base
    /// snapshot to re-queue it against.
    ///
    /// Fields decided `TakeRemote` are rewritten to the remote's typed value;
    /// everything else keeps the original local edit. The new base is the
    /// remote record the conflict was raised against: a remote still at that
    /// state lets the decisions land cleanly on the next pass, while a remote
    /// change landing between resolution and sync diverges from it and is
    /// detected as a fresh conflict.
    #[must_use]
    pub fn into_resolution(self) -> (EditSet, Record) {
        let mut edits = self.local_edits;
        for (field, resolution) in &self.decisions {
            if *resolution != Resolution::TakeRemote {
                continue;
            }
            match field {
                FieldName::Title => edits.title = Some(self.remote.title.clone()),
                FieldName::Description => {
                    edits.description = Some(self.remote.description.clone());
                }
                FieldName::Status => edits.status = Some(self.remote.status),
                FieldName::Priority => edits.priority = Some(self.remote.priority),
                FieldName::Assignee => edits.assignee = Some(self.remote.assignee.clone()),
            }
        }
        (edits, self.remote)
    }
}
