// ============================================================
// Layer 3 — Task Registry Types
// ============================================================
// A Task is one sequence-labelling objective (NER, POS, ...)
// sharing the encoder with the others. It owns its label
// vocabulary and its three pre-tokenised partitions, and is
// immutable once built. Tasks never own model parameters;
// those live in the matching head of the MultiTaskModel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::example::EncodedExample;

// ─── TaskDef ──────────────────────────────────────────────────────────────────
/// Where a task's files live, relative to the configured data directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
    pub name:       String,
    pub dir:        String,
    pub train_file: String,
    pub dev_file:   String,
    pub test_file:  String,
    #[serde(default)]
    pub dual_mode:  bool,
}

impl TaskDef {
    pub fn new(
        name:       impl Into<String>,
        dir:        impl Into<String>,
        train_file: impl Into<String>,
        dev_file:   impl Into<String>,
        test_file:  impl Into<String>,
    ) -> Self {
        Self {
            name:       name.into(),
            dir:        dir.into(),
            train_file: train_file.into(),
            dev_file:   dev_file.into(),
            test_file:  test_file.into(),
            dual_mode:  false,
        }
    }

    /// Mark the task as pairing each token with its syntactic head.
    pub fn dual(mut self) -> Self {
        self.dual_mode = true;
        self
    }

    pub fn train_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.dir).join(&self.train_file)
    }

    pub fn dev_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.dir).join(&self.dev_file)
    }

    pub fn test_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.dir).join(&self.test_file)
    }
}

// ─── LabelVocab ───────────────────────────────────────────────────────────────
/// Bidirectional mapping between string labels and dense indices.
/// Index order is the order the labels were given in.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVocab {
    labels:   Vec<String>,
    by_label: HashMap<String, usize>,
}

impl LabelVocab {
    pub fn new(labels: Vec<String>) -> Self {
        let by_label = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();
        Self { labels, by_label }
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.by_label.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

// ─── Task ─────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct Task {
    pub task_id:   usize,
    pub name:      String,
    pub dual_mode: bool,
    pub labels:    LabelVocab,
    pub train:     Vec<EncodedExample>,
    pub dev:       Vec<EncodedExample>,
    pub test:      Vec<EncodedExample>,
}

impl Task {
    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }
}
