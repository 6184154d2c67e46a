//! Newline-delimited JSON codec for the record file.
//!
//! One JSON object per non-blank line, UTF-8, no array wrapper. A line that
//! fails to decode is skipped, never fatal: a single corrupt line must not
//! take the whole store offline. Skips are counted and reported so callers
//! can surface the possible data loss.

use crate::model::Record;
use tracing::warn;

/// A line the parser could not decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number in the input.
    pub line: usize,
    /// Decode failure description.
    pub reason: String,
}

/// Result of parsing a record file: the decoded records plus every line the
/// parser had to skip.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub records: Vec<Record>,
    pub skipped: Vec<SkippedLine>,
}

impl ParseOutcome {
    /// Find a record by identity.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }
}

/// Parse a newline-delimited record file.
///
/// Blank lines are ignored. Invalid UTF-8 or undecodable JSON on a line
/// skips that line only; the call itself never fails.
#[must_use]
pub fn parse(bytes: &[u8]) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();

    for (idx, raw) in bytes.split(|b| *b == b'\n').enumerate() {
        let line_no = idx + 1;
        let Ok(text) = std::str::from_utf8(raw) else {
            warn!(line = line_no, "skipping non-UTF-8 record line");
            outcome.skipped.push(SkippedLine {
                line: line_no,
                reason: "invalid UTF-8".to_string(),
            });
            continue;
        };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        match serde_json::from_str::<Record>(text) {
            Ok(record) => outcome.records.push(record),
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping undecodable record line");
                outcome.skipped.push(SkippedLine {
                    line: line_no,
                    reason: e.to_string(),
                });
            }
        }
    }

    outcome
}

/// Serialize records to the newline-delimited wire form.
///
/// Output order matches the input sequence; sorting and filtering are the
/// caller's responsibility. Timestamps are written in the fixed
/// second-precision `Z` form.
///
/// # Errors
///
/// Returns a JSON error if a record fails to serialize (does not happen for
/// records built through this crate's types).
pub fn serialize(records: &[Record]) -> crate::error::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(records.len() * 256);
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.push(b'\n');
    }
    Ok(out)
}
