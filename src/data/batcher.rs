// ============================================================
// Layer 4 — Mixed Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<EncodedExample>
// (possibly from several tasks) into one MixedBatch.
//
// Sequences have different lengths, so every position-indexed
// field is right-padded to the longest example in the batch:
//
//   input_ids       ← tokenizer pad id
//   attention_mask  ← 0
//   token_type_ids  ← 0
//   labels          ← ignore index (never scored)
//   head_positions  ← 0            (a valid gather index)
//
// task_ids stays one entry per example and drives the
// per-task routing inside the model.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::EncodedExample;

// ─── MixedBatch ───────────────────────────────────────────────────────────────
/// A padded batch of examples from any mix of tasks.
/// All 2-D tensors are [batch_size, seq_len].
#[derive(Debug, Clone)]
pub struct MixedBatch<B: Backend> {
    pub input_ids:      Tensor<B, 2, Int>,
    /// 1 = real token, 0 = padding
    pub attention_mask: Tensor<B, 2, Int>,
    pub token_type_ids: Option<Tensor<B, 2, Int>>,
    pub head_positions: Tensor<B, 2, Int>,
    /// Absent at pure inference time
    pub labels:         Option<Tensor<B, 2, Int>>,
    /// [batch_size] — owning task of each example
    pub task_ids:       Tensor<B, 1, Int>,
}

impl<B: Backend> MixedBatch<B> {
    pub fn seq_len(&self) -> usize {
        self.input_ids.dims()[1]
    }

    /// Drop the gold labels so the forward pass computes no loss.
    pub fn without_labels(mut self) -> Self {
        self.labels = None;
        self
    }
}

// ─── MixedBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct MixedBatcher<B: Backend> {
    pub device:       B::Device,
    pub pad_token_id: u32,
    pub ignore_index: i64,
}

impl<B: Backend> MixedBatcher<B> {
    pub fn new(device: B::Device, pad_token_id: u32, ignore_index: i64) -> Self {
        Self { device, pad_token_id, ignore_index }
    }

    /// A batch holding exactly one example.
    pub fn single(&self, example: &EncodedExample) -> MixedBatch<B> {
        self.batch(vec![example.clone()])
    }

    fn int_matrix(&self, flat: Vec<i32>, batch_size: usize, seq_len: usize) -> Tensor<B, 2, Int> {
        Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len])
    }
}

/// Copy `values` and right-pad them with `fill` up to `len`.
fn padded<T: Copy>(values: &[T], len: usize, fill: T) -> impl Iterator<Item = T> + '_ {
    values
        .iter()
        .copied()
        .chain(std::iter::repeat(fill))
        .take(len)
}

impl<B: Backend> Batcher<EncodedExample, MixedBatch<B>> for MixedBatcher<B> {
    fn batch(&self, items: Vec<EncodedExample>) -> MixedBatch<B> {
        let batch_size = items.len();
        let seq_len    = items.iter().map(EncodedExample::len).max().unwrap_or(0);

        let input_flat: Vec<i32> = items
            .iter()
            .flat_map(|ex| padded(&ex.input_ids, seq_len, self.pad_token_id))
            .map(|id| id as i32)
            .collect();

        let mask_flat: Vec<i32> = items
            .iter()
            .flat_map(|ex| (0..seq_len).map(move |i| (i < ex.len()) as i32))
            .collect();

        let label_flat: Vec<i32> = items
            .iter()
            .flat_map(|ex| padded(&ex.labels, seq_len, self.ignore_index))
            .map(|l| l as i32)
            .collect();

        // tasks without a head column get all-zero head positions
        let head_flat: Vec<i32> = items
            .iter()
            .flat_map(|ex| {
                let heads = ex.head_positions.as_deref().unwrap_or(&[]);
                padded(heads, seq_len, 0)
            })
            .map(|h| h as i32)
            .collect();

        let task_flat: Vec<i32> = items.iter().map(|ex| ex.task_id as i32).collect();

        MixedBatch {
            input_ids:      self.int_matrix(input_flat, batch_size, seq_len),
            attention_mask: self.int_matrix(mask_flat, batch_size, seq_len),
            token_type_ids: Some(self.int_matrix(vec![0; batch_size * seq_len], batch_size, seq_len)),
            head_positions: self.int_matrix(head_flat, batch_size, seq_len),
            labels:         Some(self.int_matrix(label_flat, batch_size, seq_len)),
            task_ids:       Tensor::<B, 1, Int>::from_ints(task_flat.as_slice(), &self.device),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn example(task_id: usize, len: usize, heads: bool) -> EncodedExample {
        EncodedExample {
            task_id,
            input_ids:      (0..len as u32).map(|i| i + 5).collect(),
            word_ids:       (0..len).map(Some).collect(),
            labels:         vec![1; len],
            head_positions: heads.then(|| vec![2; len]),
        }
    }

    fn ints(t: Tensor<TestBackend, 2, Int>) -> Vec<i64> {
        t.into_data().iter::<i64>().collect()
    }

    #[test]
    fn test_pads_every_positional_field_to_longest() {
        let batcher = MixedBatcher::<TestBackend>::new(Default::default(), 1, -100);
        let batch = batcher.batch(vec![example(0, 3, false), example(4, 2, true)]);

        assert_eq!(batch.input_ids.dims(), [2, 3]);
        assert_eq!(batch.attention_mask.dims(), [2, 3]);
        assert_eq!(batch.head_positions.dims(), [2, 3]);

        assert_eq!(ints(batch.input_ids), vec![5, 6, 7, 5, 6, 1]);
        assert_eq!(ints(batch.attention_mask), vec![1, 1, 1, 1, 1, 0]);
        assert_eq!(ints(batch.labels.unwrap()), vec![1, 1, 1, 1, 1, -100]);
        assert_eq!(ints(batch.head_positions), vec![0, 0, 0, 2, 2, 0]);
    }

    #[test]
    fn test_task_ids_are_one_per_example() {
        let batcher = MixedBatcher::<TestBackend>::new(Default::default(), 1, -100);
        let batch = batcher.batch(vec![example(3, 2, false), example(0, 2, false), example(3, 1, false)]);
        let ids: Vec<i64> = batch.task_ids.into_data().iter::<i64>().collect();
        assert_eq!(ids, vec![3, 0, 3]);
        assert!(batch.labels.is_some());
    }

    #[test]
    fn test_without_labels_drops_gold() {
        let batcher = MixedBatcher::<TestBackend>::new(Default::default(), 1, -100);
        let batch = batcher.single(&example(0, 4, false)).without_labels();
        assert!(batch.labels.is_none());
        assert_eq!(batch.input_ids.dims()[0], 1);
        assert_eq!(batch.seq_len(), 4);
    }
}
