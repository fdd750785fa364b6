//! Aggregate outcome of one conversion run.

use std::path::PathBuf;

use serde::Serialize;

/// A record that was located but not emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    /// Record path, relative to the extracted container root when possible.
    pub path: PathBuf,
    /// Human-readable reason.
    pub reason: String,
}

/// Accumulator for a conversion run.
///
/// Passed explicitly through the pipeline and only mutated by the thread that
/// emits messages, so it needs no synchronization.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionResult {
    /// Number of candidate records found in the container.
    pub located: usize,
    /// Number of message files written.
    pub emitted: usize,
    /// Number of emitted records recovered by the heuristic parser.
    pub heuristic: usize,
    /// Total bytes written to message files.
    pub bytes_written: u64,
    /// Paths of the written message files, in sequence order.
    pub outputs: Vec<PathBuf>,
    /// Records that were skipped, with the reason.
    pub failures: Vec<RecordFailure>,
}

impl ExtractionResult {
    /// Record a successfully written message file.
    pub fn record_emitted(&mut self, path: PathBuf, bytes: u64, heuristic: bool) {
        self.emitted += 1;
        self.bytes_written += bytes;
        if heuristic {
            self.heuristic += 1;
        }
        self.outputs.push(path);
    }

    /// Record a skipped record.
    pub fn record_failure(&mut self, path: impl Into<PathBuf>, reason: impl ToString) {
        self.failures.push(RecordFailure {
            path: path.into(),
            reason: reason.to_string(),
        });
    }

    /// `true` if no candidate record was found at all.
    pub fn is_empty(&self) -> bool {
        self.located == 0
    }
}
