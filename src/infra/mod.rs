// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File-system and third-party concerns used by several layers:
//
//   checkpoint.rs      — full-precision model blobs, checkpoint
//                        discovery, run_config.json
//
//   export.rs          — flat per-task head export plus the
//                        encoder graph seam
//
//   tokenizer_store.rs — HuggingFace tokenizer behind the
//                        SubwordTokenizer trait
//
//   metrics.rs         — epoch and checkpoint-score CSV logs
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving, loading and discovery
pub mod checkpoint;

/// Flat-file export of a trained model
pub mod export;

/// Tokenizer loading
pub mod tokenizer_store;

/// CSV metrics logger
pub mod metrics;
