// ============================================================
// Layer 6 — Checkpoint Store
// ============================================================
// Saves and restores the full model (shared encoder + every
// head) as one opaque blob keyed by parameter name.
//
// Layout under the model directory:
//   <model_dir>/
//     run_config.json          ← architecture + task list
//     checkpoint-<step>/
//       model.mpk              ← full-precision named record
//     avg/
//       model.mpk
//
// NamedMpkFileRecorder<FullPrecisionSettings> keeps f32 weights,
// so a reload is bit-identical to what was saved.
//
// Two load contracts:
//   load_strict   — the path must be a model directory, else error
//   load_lenient  — a non-model path leaves the given (freshly
//                   initialised) parameters untouched

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};

use crate::domain::{MtlError, RunConfig};
use crate::ml::averager::float_tensors;
use crate::ml::model::MultiTaskModel;

/// Blob name inside a model directory; the recorder appends `.mpk`.
pub const MODEL_BLOB: &str = "model";
pub const RUN_CONFIG_FILE: &str = "run_config.json";
pub const CHECKPOINT_PREFIX: &str = "checkpoint-";

type BlobRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

pub struct CheckpointStore {
    /// The run's model directory
    root: PathBuf,
}

impl CheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn checkpoint_dir(&self, step: usize) -> PathBuf {
        self.root.join(format!("{CHECKPOINT_PREFIX}{step}"))
    }

    pub fn blob_path(dir: &Path) -> PathBuf {
        dir.join(format!("{MODEL_BLOB}.mpk"))
    }

    pub fn is_model_dir(dir: &Path) -> bool {
        Self::blob_path(dir).is_file()
    }

    /// Serialise every parameter of `model` into `dir`, creating it.
    pub fn save_model<B: Backend>(model: &MultiTaskModel<B>, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create model directory '{}'", dir.display()))?;

        BlobRecorder::new()
            .record(model.clone().into_record(), dir.join(MODEL_BLOB))
            .with_context(|| format!("Failed to save model to '{}'", dir.display()))?;

        tracing::debug!("Saved model to '{}'", dir.display());
        Ok(())
    }

    /// Load `dir` into `model`. Fails when `dir` is not a model
    /// directory or when any float parameter changes shape.
    pub fn load_strict<B: Backend>(
        model:  MultiTaskModel<B>,
        dir:    &Path,
        device: &B::Device,
    ) -> Result<MultiTaskModel<B>> {
        if !Self::is_model_dir(dir) {
            return Err(MtlError::NotAModelDirectory { path: dir.to_path_buf() }.into());
        }

        let expected: Vec<Vec<usize>> = float_tensors(&model).into_iter().map(|t| t.shape).collect();

        let record = BlobRecorder::new()
            .load(dir.join(MODEL_BLOB), device)
            .with_context(|| format!("Cannot load model from '{}'", dir.display()))?;
        let model = model.load_record(record);

        let found: Vec<Vec<usize>> = float_tensors(&model).into_iter().map(|t| t.shape).collect();
        if let Some(index) = (0..expected.len().max(found.len())).find(|&i| expected.get(i) != found.get(i)) {
            return Err(MtlError::ParameterMismatch {
                index,
                expected: expected.get(index).cloned().unwrap_or_default(),
                found:    found.get(index).cloned().unwrap_or_default(),
            })
            .with_context(|| format!("'{}' does not match the configured tasks", dir.display()));
        }

        tracing::debug!("Loaded model from '{}'", dir.display());
        Ok(model)
    }

    /// Like `load_strict`, but a path that is not a model directory
    /// returns `model` unchanged. The flag says whether weights were read.
    pub fn load_lenient<B: Backend>(
        model:  MultiTaskModel<B>,
        dir:    &Path,
        device: &B::Device,
    ) -> Result<(MultiTaskModel<B>, bool)> {
        if !Self::is_model_dir(dir) {
            tracing::debug!("'{}' is not a model directory; keeping fresh parameters", dir.display());
            return Ok((model, false));
        }
        Ok((Self::load_strict(model, dir, device)?, true))
    }

    /// Checkpoint directories under the root, sorted by step number
    /// (then by name for anything not named `checkpoint-<step>`).
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("Cannot list model directory '{}'", self.root.display()))?;

        let mut dirs = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() && Self::is_model_dir(&path) {
                dirs.push(path);
            }
        }
        dirs.sort_by_key(|p| {
            let name = p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let step = name.strip_prefix(CHECKPOINT_PREFIX).and_then(|s| s.parse::<usize>().ok());
            (step.is_none(), step, name)
        });
        Ok(dirs)
    }

    pub fn save_config(&self, cfg: &RunConfig) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Cannot create model directory '{}'", self.root.display()))?;
        let path = self.root.join(RUN_CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved run config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<RunConfig> {
        let path = self.root.join(RUN_CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot read '{}'. Has 'train' been run for this model?", path.display())
        })?;
        serde_json::from_str(&json).with_context(|| format!("Invalid run config '{}'", path.display()))
    }
}
