// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run:
//
//   Step 1: Load tokenizer and tasks      (Layer 6 / Layer 4)
//   Step 2: Save run config               (Layer 6 - infra)
//   Step 3: Run the joint training loop   (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::Result;

use crate::application::tasks::load_workspace;
use crate::domain::traits::SubwordTokenizer;
use crate::domain::RunConfig;
use crate::infra::checkpoint::CheckpointStore;
use crate::ml::trainer::{run_training, TrainingSummary};

pub struct TrainUseCase {
    config: RunConfig,
}

impl TrainUseCase {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainingSummary> {
        let cfg = &self.config;

        // ── Step 1: Tokenizer + tasks ─────────────────────────────────────────
        let (tokenizer, tasks) = load_workspace(cfg)?;
        tracing::info!("Loaded {} tasks ({} dual)", tasks.len(), cfg.dual_task_count());

        // ── Step 2: Save config so later commands rebuild the same model ─────
        let store = CheckpointStore::new(&cfg.model_dir);
        store.save_config(cfg)?;

        // ── Step 3: Train ─────────────────────────────────────────────────────
        run_training(cfg, &tasks, tokenizer.pad_token_id(), &store)
    }
}
