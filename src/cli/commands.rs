// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the four subcommands and their flags:
//
//   train     joint training, one checkpoint per epoch
//   evaluate  dev macro accuracy of every checkpoint
//   average   top-k checkpoint averaging + export
//   export    flat export of one saved model
//
// Every command starts from a RunConfig: the --config JSON
// file if given, otherwise the run_config.json saved in the
// model directory (not for train), otherwise the defaults.
// Flags then override individual fields.
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

use crate::domain::RunConfig;
use crate::infra::checkpoint::CheckpointStore;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the shared encoder and all task heads
    Train(TrainArgs),

    /// Score every checkpoint of a run on the dev sets
    Evaluate(EvaluateArgs),

    /// Average the best checkpoints and export the result
    Average(AverageArgs),

    /// Export a saved model directory
    Export(ExportArgs),
}

/// Flags shared by every command.
#[derive(Args, Debug, Default)]
pub struct CommonArgs {
    /// JSON run configuration; flags below override its fields
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding the run's checkpoints and exports
    #[arg(long)]
    pub model_dir: Option<String>,

    /// Directory the task files are resolved against
    #[arg(long)]
    pub data_dir: Option<String>,

    /// HuggingFace tokenizer.json
    #[arg(long)]
    pub tokenizer: Option<String>,

    /// Transformer name recorded in exports; also names the
    /// default model directory
    #[arg(long)]
    pub transformer_name: Option<String>,
}

impl CommonArgs {
    /// Resolve the run configuration. `use_saved` lets a model
    /// directory's run_config.json serve as the base.
    pub fn resolve(&self, use_saved: bool) -> Result<RunConfig> {
        let mut cfg = match &self.config {
            Some(path) => read_config(path)?,
            None => RunConfig::default(),
        };

        if let Some(name) = &self.transformer_name {
            cfg.transformer_name = name.clone();
            cfg.model_dir = RunConfig::model_name_for(name);
        }
        if let Some(dir) = &self.model_dir {
            cfg.model_dir = dir.clone();
        }

        if use_saved && self.config.is_none() {
            let store = CheckpointStore::new(&cfg.model_dir);
            if store.root().join(crate::infra::checkpoint::RUN_CONFIG_FILE).is_file() {
                let model_dir = cfg.model_dir.clone();
                cfg = store.load_config()?;
                cfg.model_dir = model_dir;
                tracing::info!("Using the run config saved in '{}'", cfg.model_dir);
            }
        }

        if let Some(dir) = &self.data_dir {
            cfg.data_dir = dir.clone();
        }
        if let Some(path) = &self.tokenizer {
            cfg.tokenizer_path = path.clone();
        }
        if let Some(name) = &self.transformer_name {
            cfg.transformer_name = name.clone();
        }
        Ok(cfg)
    }
}

fn read_config(path: &Path) -> Result<RunConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read config '{}'", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid config '{}'", path.display()))
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Number of passes over the mixed training set
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Examples per batch (tasks are mixed within a batch)
    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long)]
    pub learning_rate: Option<f64>,

    #[arg(long)]
    pub weight_decay: Option<f64>,

    /// Seed for initialisation and shuffling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Start from the weights in this model directory, if it is one
    #[arg(long)]
    pub init_from: Option<String>,
}

impl TrainArgs {
    pub fn into_config(self) -> Result<RunConfig> {
        let mut cfg = self.common.resolve(false)?;
        if let Some(v) = self.epochs        { cfg.epochs = v; }
        if let Some(v) = self.batch_size    { cfg.batch_size = v; }
        if let Some(v) = self.learning_rate { cfg.learning_rate = v; }
        if let Some(v) = self.weight_decay  { cfg.weight_decay = v; }
        if let Some(v) = self.seed          { cfg.seed = v; }
        if self.init_from.is_some()         { cfg.init_from = self.init_from; }
        Ok(cfg)
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct AverageArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// How many of the best checkpoints to average
    #[arg(long)]
    pub top_k: Option<usize>,
}

impl AverageArgs {
    pub fn into_config(self) -> Result<RunConfig> {
        let mut cfg = self.common.resolve(true)?;
        if let Some(k) = self.top_k {
            cfg.top_k = k;
        }
        Ok(cfg)
    }
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Model directory to export [default: <model_dir>/avg]
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Destination directory [default: <model_dir>/avg_export]
    #[arg(long)]
    pub out: Option<PathBuf>,
}

impl ExportArgs {
    /// The resolved config plus source and destination directories.
    pub fn resolve(self) -> Result<(RunConfig, PathBuf, PathBuf)> {
        let cfg = self.common.resolve(true)?;
        let root = Path::new(&cfg.model_dir);
        let source = self.source.unwrap_or_else(|| root.join(&cfg.averaged_dir));
        let out    = self.out.unwrap_or_else(|| root.join(&cfg.export_dir));
        Ok((cfg, source, out))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_transformer_name_sets_model_dir() {
        let common = CommonArgs {
            transformer_name: Some("google/electra-small".into()),
            ..CommonArgs::default()
        };
        let cfg = common.resolve(false).unwrap();
        assert_eq!(cfg.model_dir, "google-electra-small-mtl");
        assert_eq!(cfg.transformer_name, "google/electra-small");
    }

    #[test]
    fn test_flags_override_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("run.json");
        std::fs::write(&path, r#"{ "epochs": 3, "batch_size": 16 }"#).unwrap();

        let cli = Cli::try_parse_from([
            "mtl-tagger", "train", "--config", path.to_str().unwrap(), "--epochs", "7",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = args.into_config().unwrap();
        assert_eq!(cfg.epochs, 7);
        assert_eq!(cfg.batch_size, 16);
    }

    #[test]
    fn test_saved_run_config_is_the_base_for_average() {
        let tmp = tempfile::tempdir().unwrap();
        let model_dir = tmp.path().join("model");
        let mut saved = RunConfig::default();
        saved.hidden_size = 64;
        CheckpointStore::new(&model_dir).save_config(&saved).unwrap();

        let cli = Cli::try_parse_from([
            "mtl-tagger", "average", "--model-dir", model_dir.to_str().unwrap(), "--top-k", "2",
        ])
        .unwrap();
        let Commands::Average(args) = cli.command else { panic!("expected average") };
        let cfg = args.into_config().unwrap();
        assert_eq!(cfg.hidden_size, 64);
        assert_eq!(cfg.top_k, 2);
        assert_eq!(cfg.model_dir, model_dir.to_string_lossy());
    }

    #[test]
    fn test_export_defaults_to_averaged_model() {
        let cli = Cli::try_parse_from(["mtl-tagger", "export", "--model-dir", "/nonexistent/run"]).unwrap();
        let Commands::Export(args) = cli.command else { panic!("expected export") };
        let (_, source, out) = args.resolve().unwrap();
        assert_eq!(source, PathBuf::from("/nonexistent/run/avg"));
        assert_eq!(out, PathBuf::from("/nonexistent/run/avg_export"));
    }
}
