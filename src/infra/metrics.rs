// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends run metrics to CSV files in the model directory:
//
//   metrics.csv             one row per training epoch
//   checkpoint_scores.csv   one row per evaluated checkpoint
//
// Example metrics.csv:
//   epoch,step,train_loss,batches
//   1,5210,0.913402,5210
//   2,10420,0.402117,5210
//
// Files are created with a header on first use and appended
// to afterwards, so repeated runs accumulate rows.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

use crate::domain::Checkpoint;

pub const EPOCH_CSV: &str = "metrics.csv";
pub const SCORES_CSV: &str = "checkpoint_scores.csv";

/// One row of metrics for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:      usize,
    /// Optimiser steps taken so far
    pub step:       usize,
    /// Mean routed loss over the epoch's batches
    pub train_loss: f64,
    pub batches:    usize,
}

impl EpochMetrics {
    pub fn new(epoch: usize, step: usize, train_loss: f64, batches: usize) -> Self {
        Self { epoch, step, train_loss, batches }
    }
}

/// Appends rows to one CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    fn open(dir: &Path, file: &str, header: &str) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join(file);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{header}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }
        Ok(Self { csv_path })
    }

    pub fn epochs(dir: &Path) -> Result<Self> {
        Self::open(dir, EPOCH_CSV, "epoch,step,train_loss,batches")
    }

    pub fn checkpoint_scores(dir: &Path) -> Result<Self> {
        Self::open(dir, SCORES_CSV, "checkpoint,macro_accuracy")
    }

    fn append(&self, row: &str) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;
        writeln!(f, "{row}")?;
        Ok(())
    }

    pub fn log_epoch(&self, m: &EpochMetrics) -> Result<()> {
        self.append(&format!("{},{},{:.6},{}", m.epoch, m.step, m.train_loss, m.batches))?;
        tracing::debug!("Logged epoch {}: train_loss={:.4}", m.epoch, m.train_loss);
        Ok(())
    }

    pub fn log_score(&self, ckpt: &Checkpoint) -> Result<()> {
        let name = ckpt
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| ckpt.path.display().to_string());
        self.append(&format!("{},{:.6}", name, ckpt.macro_accuracy))
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_written_once_and_rows_appended() {
        let tmp = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::epochs(tmp.path()).unwrap();
        logger.log_epoch(&EpochMetrics::new(1, 10, 0.5, 10)).unwrap();

        let again = MetricsLogger::epochs(tmp.path()).unwrap();
        again.log_epoch(&EpochMetrics::new(2, 20, 0.25, 10)).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(text, "epoch,step,train_loss,batches\n1,10,0.500000,10\n2,20,0.250000,10\n");
    }

    #[test]
    fn test_score_rows_use_directory_name() {
        let tmp = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::checkpoint_scores(tmp.path()).unwrap();
        logger.log_score(&Checkpoint::new(tmp.path().join("checkpoint-7"), 0.875)).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        assert!(text.ends_with("checkpoint-7,0.875000\n"));
    }
}
