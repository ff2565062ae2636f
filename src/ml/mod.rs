// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model code, generic over a Burn Backend:
//
//   encoder.rs    — shared transformer encoder (token, position and
//                   token-type embeddings + pre-built encoder blocks)
//   head.rs       — per-task token classifier and masked loss
//   router.rs     — splits a mixed batch into per-task sub-batches
//   model.rs      — encoder + heads, one routed forward pass
//   trainer.rs    — joint training loop, checkpoint per epoch
//   evaluator.rs  — per-task and macro dev accuracy
//   averager.rs   — top-k selection and parameter averaging
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need

pub mod encoder;

pub mod head;

pub mod router;

/// Multi-task model composing the encoder, router and heads
pub mod model;

pub mod trainer;

pub mod evaluator;

/// Checkpoint ranking and float-parameter averaging
pub mod averager;
