//! Metrics describing the evolution of a learning run.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BpeError, Result};

/// Reason a learning run terminated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// The configured number of symbols was learned.
    BudgetReached,
    /// The best remaining pair fell below the minimum frequency.
    BelowMinFrequency,
    /// No adjacent pairs remained in the vocabulary.
    NoPairs,
}

/// One accepted merge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeRecord {
    /// Rank of the merge in the output table.
    pub rank: usize,
    /// Left symbol.
    pub left: String,
    /// Right symbol.
    pub right: String,
    /// Pair frequency at the time it was selected.
    pub frequency: i64,
    /// Whether the merge was forced rather than selected.
    pub forced: bool,
}

impl MergeRecord {
    pub(crate) fn new(rank: usize, left: &str, right: &str, frequency: i64, forced: bool) -> Self {
        Self {
            rank,
            left: left.to_string(),
            right: right.to_string(),
            frequency,
            forced,
        }
    }
}

/// Aggregate metrics produced by a learning run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearningMetrics {
    /// Accepted merges in rank order.
    pub merges: Vec<MergeRecord>,
    /// Number of forced merges at the head of the table.
    pub forced: usize,
    /// Total duration of the run.
    pub total_duration: Duration,
    /// Reason learning terminated.
    pub stop_reason: StopReason,
}

impl LearningMetrics {
    /// Creates an empty metrics container with pre-allocated capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            merges: Vec::with_capacity(capacity),
            forced: 0,
            total_duration: Duration::ZERO,
            stop_reason: StopReason::BudgetReached,
        }
    }

    /// Serialises the metrics as pretty JSON to `path`.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|err| BpeError::io(err, Some(path.to_path_buf())))
    }
}
