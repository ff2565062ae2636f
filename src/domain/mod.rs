// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, enums and traits that define the core
// concepts of the multi-task tagger:
//
//   config.rs  — RunConfig, the one configuration value object
//   task.rs    — TaskDef, Task and its LabelVocab
//   example.rs — EncodedExample, one tokenised sentence
//   error.rs   — MtlError, the typed failures of the core
//   traits.rs  — collaborator seams (tokenizer, tagger)
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

pub mod config;
pub mod error;
pub mod example;
pub mod task;
pub mod traits;

pub use config::RunConfig;
pub use error::MtlError;
pub use example::{Checkpoint, EncodedExample};
pub use task::{LabelVocab, Task, TaskDef};
