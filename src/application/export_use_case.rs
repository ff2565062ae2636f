// ============================================================
// Layer 2 — ExportUseCase
// ============================================================
// Exports one saved model directory (by default the averaged
// model) into the flat layout read downstream.

use anyhow::Result;
use std::path::PathBuf;

use crate::application::evaluate_use_case::EvalBackend;
use crate::application::tasks::load_workspace;
use crate::domain::RunConfig;
use crate::infra::checkpoint::CheckpointStore;
use crate::infra::export::{CpuBackend, ExportWriter};
use crate::ml::model::MultiTaskModel;

pub struct ExportUseCase {
    config: RunConfig,
    source: PathBuf,
    target: PathBuf,
}

impl ExportUseCase {
    pub fn new(config: RunConfig, source: PathBuf, target: PathBuf) -> Self {
        Self { config, source, target }
    }

    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;
        let (_, tasks) = load_workspace(cfg)?;
        let device = burn::backend::wgpu::WgpuDevice::default();

        let model = CheckpointStore::load_strict(
            MultiTaskModel::<EvalBackend>::new(cfg, &tasks, &device),
            &self.source,
            &device,
        )?;
        model.summarize_heads();

        let skeleton = MultiTaskModel::<CpuBackend>::new(cfg, &tasks, &Default::default());
        ExportWriter::new(&tasks, &cfg.transformer_name).export(&model, skeleton, &self.target)
    }
}
