// ============================================================
// Layer 2 — AverageUseCase
// ============================================================
// Merges the best checkpoints of a run:
//
//   Step 1: Score every checkpoint            (ml/evaluator)
//   Step 2: Rank, keep the top k              (ml/averager)
//   Step 3: Average their float parameters    (ml/averager)
//   Step 4: Save to <model_dir>/avg           (infra/checkpoint)
//   Step 5: Export to <model_dir>/avg_export  (infra/export)
//   Step 6: Re-score the averaged model       (ml/evaluator)

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::application::evaluate_use_case::EvalBackend;
use crate::application::tasks::load_workspace;
use crate::domain::traits::SubwordTokenizer;
use crate::domain::{Checkpoint, RunConfig};
use crate::infra::checkpoint::CheckpointStore;
use crate::infra::export::{CpuBackend, ExportWriter};
use crate::ml::averager::{average_checkpoints, select_top_k};
use crate::ml::evaluator::{evaluate_checkpoints, evaluate_model};
use crate::ml::model::MultiTaskModel;

#[derive(Debug, Clone)]
pub struct AverageReport {
    pub selected:       Vec<Checkpoint>,
    pub averaged_dir:   PathBuf,
    pub export_dir:     PathBuf,
    pub macro_accuracy: f64,
}

pub struct AverageUseCase {
    config: RunConfig,
}

impl AverageUseCase {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<AverageReport> {
        let cfg = &self.config;
        let (tokenizer, tasks) = load_workspace(cfg)?;
        let pad_token_id = tokenizer.pad_token_id();
        let store  = CheckpointStore::new(&cfg.model_dir);
        let device = burn::backend::wgpu::WgpuDevice::default();

        // ── Step 1 + 2: Score and rank ────────────────────────────────────────
        let scored   = evaluate_checkpoints::<EvalBackend>(&store, cfg, &tasks, pad_token_id, &device)?;
        let selected = select_top_k(&scored, cfg.top_k)?;

        // ── Step 3: Average ───────────────────────────────────────────────────
        let merged = average_checkpoints(&selected, |ckpt| {
            let fresh = MultiTaskModel::<EvalBackend>::new(cfg, &tasks, &device);
            CheckpointStore::load_strict(fresh, &ckpt.path, &device)
        })?;

        // ── Step 4: Save ──────────────────────────────────────────────────────
        let averaged_dir = Path::new(&cfg.model_dir).join(&cfg.averaged_dir);
        CheckpointStore::save_model(&merged, &averaged_dir)?;
        tracing::info!("Averaged model saved to '{}'", averaged_dir.display());

        // ── Step 5: Export ────────────────────────────────────────────────────
        let export_dir = Path::new(&cfg.model_dir).join(&cfg.export_dir);
        let skeleton   = MultiTaskModel::<CpuBackend>::new(cfg, &tasks, &Default::default());
        ExportWriter::new(&tasks, &cfg.transformer_name).export(&merged, skeleton, &export_dir)?;

        // ── Step 6: Re-evaluate ───────────────────────────────────────────────
        let macro_accuracy = evaluate_model(merged, &tasks, cfg.ignore_index, pad_token_id, &device)?;
        tracing::info!("Dev macro accuracy for the averaged model: {:.4}", macro_accuracy);

        Ok(AverageReport { selected, averaged_dir, export_dir, macro_accuracy })
    }
}
