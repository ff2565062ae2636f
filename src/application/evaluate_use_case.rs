// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Scores every checkpoint of a run on the dev partitions and
// reports them in discovery order.

use anyhow::Result;

use crate::application::tasks::load_workspace;
use crate::domain::traits::SubwordTokenizer;
use crate::domain::{Checkpoint, RunConfig};
use crate::infra::checkpoint::CheckpointStore;
use crate::ml::evaluator::evaluate_checkpoints;

pub type EvalBackend = burn::backend::Wgpu;

pub struct EvaluateUseCase {
    config: RunConfig,
}

impl EvaluateUseCase {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<Vec<Checkpoint>> {
        let cfg = &self.config;
        let (tokenizer, tasks) = load_workspace(cfg)?;
        let store  = CheckpointStore::new(&cfg.model_dir);
        let device = burn::backend::wgpu::WgpuDevice::default();

        evaluate_checkpoints::<EvalBackend>(&store, cfg, &tasks, tokenizer.pad_token_id(), &device)
    }
}
