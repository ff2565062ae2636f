// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one command (train, evaluate, average, export).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Loading the configured tasks
pub mod tasks;

// Joint multi-task training
pub mod train_use_case;

// Scoring every checkpoint of a run
pub mod evaluate_use_case;

// Top-k checkpoint averaging + export
pub mod average_use_case;

// Flat export of a saved model
pub mod export_use_case;
