// ============================================================
// Layer 3 — Encoded Example and Checkpoint
// ============================================================

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One tokenised sentence with its per-position arrays.
///
/// `word_ids`, `labels` and (when present) `head_positions` all have
/// the length of `input_ids`. Labels equal to the run's ignore index are
/// excluded from loss and accuracy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedExample {
    pub task_id:        usize,
    pub input_ids:      Vec<u32>,
    /// Subword position → originating word, `None` for special tokens
    pub word_ids:       Vec<Option<usize>>,
    pub labels:         Vec<i64>,
    /// Subword position → position of its syntactic head token
    pub head_positions: Option<Vec<i64>>,
}

impl EncodedExample {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Number of positions that carry a gold label.
    pub fn scored_positions(&self, ignore_index: i64) -> usize {
        self.labels.iter().filter(|&&l| l != ignore_index).count()
    }
}

/// A saved snapshot of all model parameters plus its dev macro accuracy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub path:           PathBuf,
    pub macro_accuracy: f64,
}

impl Checkpoint {
    pub fn new(path: impl Into<PathBuf>, macro_accuracy: f64) -> Self {
        Self { path: path.into(), macro_accuracy }
    }
}
