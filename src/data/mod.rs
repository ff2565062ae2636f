// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the raw task files and tensor batches:
//
//   column files
//       │
//       ▼
//   reader    → sentences of (word, label, head?)
//       │
//       ▼
//   align     → subword ids + aligned labels / head positions
//       │
//       ▼
//   dataset   → Burn Dataset over EncodedExamples
//       │
//       ▼
//   batcher   → padded MixedBatch with per-example task ids
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// CoNLL-style column file parsing
pub mod reader;

/// Label and head-position alignment onto subword tokens
pub mod align;

/// Implements Burn's Dataset trait for encoded examples
pub mod dataset;

/// Implements Burn's Batcher trait for mixed-task batches
pub mod batcher;
