// ============================================================
// Layer 5 — Checkpoint Averager
// ============================================================
// Merges the top-k checkpoints into one model whose float
// parameters are the elementwise mean of theirs:
//
//   main      = load(top[0])
//   for each satellite in top[1..k]:
//       main.float += satellite.float      (same visit order)
//   main.float /= k                        (only when k > 1)
//
// Integer parameters (e.g. the encoder's position id buffer)
// are never touched; they come from top[0] unchanged.
//
// `main` is the only mutable accumulator. Satellites are
// loaded one at a time, read through a visitor and dropped.

use anyhow::Result;
use burn::{
    module::{Module, ModuleMapper, ModuleVisitor, ParamId},
    prelude::*,
};

use crate::domain::{Checkpoint, MtlError};
use crate::ml::model::MultiTaskModel;

// ─── Top-k selection ──────────────────────────────────────────────────────────
/// Best `k` checkpoints by macro accuracy, descending. The sort is
/// stable so ties keep discovery order. A `k` larger than the number
/// of checkpoints is clamped with a warning.
pub fn select_top_k(checkpoints: &[Checkpoint], k: usize) -> Result<Vec<Checkpoint>, MtlError> {
    if k == 0 {
        return Err(MtlError::InvalidTopK { k });
    }
    if checkpoints.is_empty() {
        return Err(MtlError::NoCheckpoints);
    }

    let mut ranked = checkpoints.to_vec();
    ranked.sort_by(|a, b| b.macro_accuracy.total_cmp(&a.macro_accuracy));

    if k > ranked.len() {
        tracing::warn!(
            "Asked to average the top {} checkpoints but only {} exist; averaging {}",
            k, ranked.len(), ranked.len(),
        );
    }
    ranked.truncate(k);

    for (rank, ckpt) in ranked.iter().enumerate() {
        tracing::info!("Top {}: {} ({:.4})", rank + 1, ckpt.path.display(), ckpt.macro_accuracy);
    }
    Ok(ranked)
}

// ─── Averaging ────────────────────────────────────────────────────────────────
/// Average the float parameters of `selected` (already ranked, best
/// first). `load` builds a fully headed model from one checkpoint.
pub fn average_checkpoints<B, L>(selected: &[Checkpoint], mut load: L) -> Result<MultiTaskModel<B>>
where
    B: Backend,
    L: FnMut(&Checkpoint) -> Result<MultiTaskModel<B>>,
{
    let (first, rest) = selected.split_first().ok_or(MtlError::NoCheckpoints)?;

    tracing::info!("Loading main model from {}", first.path.display());
    let mut main = load(first)?;

    for ckpt in rest {
        tracing::info!("Adding satellite {}", ckpt.path.display());
        let satellite = load(ckpt)?;
        main = accumulate(main, &satellite)?;
    }

    if selected.len() > 1 {
        main = main.map(&mut DivideFloats { divisor: selected.len() as f64 });
    }
    Ok(main)
}

/// `main += satellite` over every float parameter, in visit order.
pub fn accumulate<B: Backend>(main: MultiTaskModel<B>, satellite: &MultiTaskModel<B>) -> Result<MultiTaskModel<B>, MtlError> {
    let addends = float_tensors(satellite);
    let expected = addends.len();

    let mut adder = AddFloats { addends: addends.into_iter(), index: 0, error: None };
    let main = main.map(&mut adder);

    if let Some(err) = adder.error {
        return Err(err);
    }
    if adder.index != expected {
        return Err(MtlError::ParameterMismatch {
            index:    adder.index,
            expected: vec![expected],
            found:    vec![adder.index],
        });
    }
    Ok(main)
}

// ─── Parameter views ──────────────────────────────────────────────────────────
/// Float parameters of a module in visit order.
pub fn float_tensors<B: Backend>(module: &MultiTaskModel<B>) -> Vec<TensorData> {
    let mut collector = ParamCollector::default();
    module.visit(&mut collector);
    collector.floats
}

/// Integer parameters of a module in visit order.
pub fn int_tensors<B: Backend>(module: &MultiTaskModel<B>) -> Vec<TensorData> {
    let mut collector = ParamCollector::default();
    module.visit(&mut collector);
    collector.ints
}

#[derive(Default)]
struct ParamCollector {
    floats: Vec<TensorData>,
    ints:   Vec<TensorData>,
}

impl<B: Backend> ModuleVisitor<B> for ParamCollector {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.floats.push(tensor.to_data());
    }

    fn visit_int<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D, Int>) {
        self.ints.push(tensor.to_data());
    }
}

struct AddFloats {
    addends: std::vec::IntoIter<TensorData>,
    index:   usize,
    error:   Option<MtlError>,
}

impl<B: Backend> ModuleMapper<B> for AddFloats {
    fn map_float<const D: usize>(&mut self, _id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        let index = self.index;
        self.index += 1;
        if self.error.is_some() {
            return tensor;
        }

        let expected = tensor.dims().to_vec();
        match self.addends.next() {
            Some(addend) if addend.shape == expected => {
                let addend = Tensor::<B, D>::from_data(addend, &tensor.device());
                tensor + addend
            }
            Some(addend) => {
                self.error = Some(MtlError::ParameterMismatch { index, expected, found: addend.shape });
                tensor
            }
            None => {
                self.error = Some(MtlError::ParameterMismatch { index, expected, found: vec![] });
                tensor
            }
        }
    }
}

struct DivideFloats {
    divisor: f64,
}

impl<B: Backend> ModuleMapper<B> for DivideFloats {
    fn map_float<const D: usize>(&mut self, _id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        tensor.div_scalar(self.divisor)
    }
}
