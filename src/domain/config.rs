// ============================================================
// Layer 3 — Run Configuration
// ============================================================
// One value object holding every knob of a run: where the data
// lives, the encoder architecture, the training schedule and the
// averaging settings. It is built once by the CLI layer and
// passed by reference to whatever needs it.
//
// Serialisable so the training run can store it next to its
// checkpoints and later commands can rebuild the same model.

use serde::{Deserialize, Serialize};

use crate::domain::task::TaskDef;

/// Label value meaning "exclude this position from loss and accuracy".
pub const DEFAULT_IGNORE_INDEX: i64 = -100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory the task definitions are resolved against
    pub data_dir: String,
    /// Directory holding checkpoints, the averaged model and exports
    pub model_dir: String,
    /// Name recorded next to the exported encoder
    pub transformer_name: String,
    /// HuggingFace tokenizer.json used to split words into subwords
    pub tokenizer_path: String,
    /// Model directory to start training from; fresh weights if it
    /// is not a model directory
    pub init_from: Option<String>,

    pub seed: u64,
    pub ignore_index: i64,

    // ── training schedule ──
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,

    // ── shared encoder ──
    pub vocab_size: usize,
    pub max_position_embeddings: usize,
    pub type_vocab_size: usize,
    pub hidden_size: usize,
    pub num_heads: usize,
    pub num_layers: usize,
    pub intermediate_size: usize,
    pub hidden_dropout: f64,

    // ── averaging ──
    pub top_k: usize,
    /// Sub-directory of model_dir receiving the averaged checkpoint
    pub averaged_dir: String,
    /// Sub-directory of model_dir receiving the averaged export
    pub export_dir: String,

    pub tasks: Vec<TaskDef>,
}

impl RunConfig {
    /// The directory name used for a transformer's multi-task model,
    /// e.g. `google/electra-small` → `google-electra-small-mtl`.
    pub fn model_name_for(transformer_name: &str) -> String {
        format!("{}-mtl", transformer_name.replace('/', "-"))
    }

    pub fn dual_task_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.dual_mode).count()
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        let transformer_name = "roberta-base".to_string();
        Self {
            data_dir:                "data".to_string(),
            model_dir:               Self::model_name_for(&transformer_name),
            transformer_name,
            tokenizer_path:          "tokenizer.json".to_string(),
            init_from:               None,
            seed:                    1234,
            ignore_index:            DEFAULT_IGNORE_INDEX,
            epochs:                  20,
            batch_size:              2,
            learning_rate:           5e-5,
            weight_decay:            0.01,
            vocab_size:              50265,
            max_position_embeddings: 514,
            type_vocab_size:         2,
            hidden_size:             256,
            num_heads:               4,
            num_layers:              4,
            intermediate_size:       1024,
            hidden_dropout:          0.1,
            top_k:                   5,
            averaged_dir:            "avg".to_string(),
            export_dir:              "avg_export".to_string(),
            tasks:                   default_tasks(),
        }
    }
}

/// The five CoNLL-style tasks of the standard setup.
fn default_tasks() -> Vec<TaskDef> {
    vec![
        TaskDef::new("NER",        "conll-ner", "train.txt",    "dev.txt",    "test.txt"),
        TaskDef::new("POS",        "pos",       "train.txt",    "dev.txt",    "test.txt"),
        // this corpus has no dev partition
        TaskDef::new("Chunking",   "chunking",  "train.txt",    "test.txt",   "test.txt"),
        TaskDef::new("Deps Head",  "deps-wsj",  "train.heads",  "dev.heads",  "test.heads"),
        TaskDef::new("Deps Label", "deps-wsj",  "train.labels", "dev.labels", "test.labels").dual(),
    ]
}
