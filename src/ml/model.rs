// ============================================================
// Layer 5 — Multi-Task Model
// ============================================================
// The shared encoder plus one TaskHead per task. One forward
// pass over a mixed batch:
//
//   1. run the encoder ONCE over the whole batch
//   2. split the hidden states by task id (ml/router.rs)
//   3. send each sub-batch to its own head
//   4. loss = unweighted mean of the per-task losses
//
// Logits are only returned outside training mode. Heads have
// different label counts, so a multi-task batch has no single
// logits tensor; evaluation feeds one task per batch and reads
// the logits of the (only) routed task.

use burn::prelude::*;

use crate::data::batcher::{MixedBatch, MixedBatcher};
use crate::domain::traits::TokenTagger;
use crate::domain::{EncodedExample, MtlError, RunConfig, Task};
use crate::ml::encoder::{EncoderConfig, SharedEncoder};
use crate::ml::head::{TaskHead, TaskHeadConfig};
use crate::ml::router;

#[derive(Module, Debug)]
pub struct MultiTaskModel<B: Backend> {
    pub encoder:       SharedEncoder<B>,
    pub heads:         Vec<TaskHead<B>>,
    pub training_mode: bool,
}

pub struct MultiTaskOutput<B: Backend> {
    /// Mean of the per-task losses, present when the batch had labels
    pub loss:   Option<Tensor<B, 1>>,
    /// [batch, seq_len, num_labels] of the last routed task, eval mode only
    pub logits: Option<Tensor<B, 3>>,
}

impl<B: Backend> MultiTaskModel<B> {
    /// Encoder from `cfg` with freshly initialised heads for `tasks`.
    pub fn new(cfg: &RunConfig, tasks: &[Task], device: &B::Device) -> Self {
        let encoder = EncoderConfig::from_run(cfg).init(device);
        let heads = tasks
            .iter()
            .map(|t| TaskHeadConfig::for_task(t, cfg.hidden_size, cfg.ignore_index, cfg.hidden_dropout))
            .collect::<Vec<_>>();
        Self::from_parts(encoder, &heads, device)
    }

    pub fn from_parts(encoder: SharedEncoder<B>, heads: &[TaskHeadConfig], device: &B::Device) -> Self {
        Self {
            encoder,
            heads: Vec::new(),
            training_mode: true,
        }
        .add_heads(heads, device)
    }

    /// Attach newly initialised heads. Existing heads for the same task
    /// ids are replaced.
    pub fn add_heads(mut self, heads: &[TaskHeadConfig], device: &B::Device) -> Self {
        for cfg in heads {
            self.heads.retain(|h| h.task_id != cfg.task_id);
            self.heads.push(cfg.init(device));
        }
        self.heads.sort_by_key(|h| h.task_id);
        self
    }

    pub fn with_training_mode(mut self, training_mode: bool) -> Self {
        self.training_mode = training_mode;
        self
    }

    pub fn head(&self, task_id: usize) -> Result<&TaskHead<B>, MtlError> {
        self.heads
            .iter()
            .find(|h| h.task_id == task_id)
            .ok_or(MtlError::UnknownTaskId { task_id })
    }

    pub fn summarize_heads(&self) {
        tracing::info!("Found {} heads", self.heads.len());
        for head in &self.heads {
            tracing::info!(
                "Task {} with {} labels, input width {}, dual={}",
                head.task_id, head.num_labels, head.input_width(), head.dual_mode,
            );
        }
    }

    pub fn forward(&self, batch: MixedBatch<B>) -> Result<MultiTaskOutput<B>, MtlError> {
        let seq_len = batch.seq_len();
        if seq_len > self.encoder.max_positions {
            return Err(MtlError::SequenceTooLong { len: seq_len, max: self.encoder.max_positions });
        }

        // every task id must have a head before any work is done
        for task_id in router::task_ids_of(&batch) {
            self.head(task_id)?;
        }

        let hidden = self.encoder.forward(
            batch.input_ids.clone(),
            Some(batch.attention_mask.clone()),
            batch.token_type_ids.clone(),
        );

        let mut logits = None;
        let mut losses = Vec::new();
        for sub in router::route(hidden, &batch) {
            let out = self.head(sub.task_id)?.forward(sub.hidden, sub.head_positions, sub.labels);
            if let Some(loss) = out.loss {
                losses.push(loss);
            }
            logits = Some(out.logits);
        }

        let loss = (!losses.is_empty()).then(|| Tensor::cat(losses, 0).mean());
        Ok(MultiTaskOutput {
            loss,
            logits: if self.training_mode { None } else { logits },
        })
    }
}

// ─── Single-example tagging ───────────────────────────────────────────────────
/// Runs a model one example at a time in inference mode.
pub struct ModelTagger<'a, B: Backend> {
    model:   &'a MultiTaskModel<B>,
    batcher: MixedBatcher<B>,
}

impl<'a, B: Backend> ModelTagger<'a, B> {
    /// `model` must already be in evaluation mode (`with_training_mode(false)`).
    pub fn new(model: &'a MultiTaskModel<B>, batcher: MixedBatcher<B>) -> Self {
        Self { model, batcher }
    }
}

impl<B: Backend> TokenTagger for ModelTagger<'_, B> {
    fn predict(&self, example: &EncodedExample) -> anyhow::Result<Vec<usize>> {
        let batch  = self.batcher.single(example).without_labels();
        let output = self.model.forward(batch)?;
        let logits = output
            .logits
            .ok_or_else(|| anyhow::anyhow!("model is in training mode; no logits to tag with"))?;

        let [_, seq_len, _] = logits.dims();
        let predicted = logits
            .argmax(2)
            .reshape([seq_len])
            .into_data()
            .iter::<i64>()
            .map(|label| label as usize)
            .collect();
        Ok(predicted)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::LabelVocab;
    use crate::ml::encoder::tests::tiny_config;
    use burn::backend::NdArray;
    use burn::data::dataloader::batcher::Batcher;

    type TestBackend = NdArray;

    pub(crate) fn tiny_heads() -> Vec<TaskHeadConfig> {
        vec![
            TaskHeadConfig::new(0, 8, 3, false, -100).with_dropout(0.0),
            TaskHeadConfig::new(1, 8, 5, true, -100).with_dropout(0.0),
        ]
    }

    pub(crate) fn tiny_model(device: &<TestBackend as Backend>::Device) -> MultiTaskModel<TestBackend> {
        MultiTaskModel::from_parts(tiny_config().init(device), &tiny_heads(), device)
    }

    pub(crate) fn example(task_id: usize, labels: Vec<i64>) -> EncodedExample {
        let len = labels.len();
        EncodedExample {
            task_id,
            input_ids:      (0..len as u32).map(|i| 3 + i).collect(),
            word_ids:       (0..len).map(Some).collect(),
            labels,
            head_positions: Some((0..len as i64).map(|i| i.saturating_sub(1).max(0)).collect()),
        }
    }

    #[test]
    fn test_mixed_batch_gives_single_loss() {
        let device = Default::default();
        let model = tiny_model(&device);
        let batcher = MixedBatcher::<TestBackend>::new(device, 1, -100);
        let batch = batcher.batch(vec![
            example(1, vec![-100, 4, 0, -100]),
            example(0, vec![-100, 2, -100]),
            example(1, vec![-100, 1, 3, -100]),
        ]);

        let out = model.forward(batch).unwrap();
        assert!(out.logits.is_none(), "training mode must not materialise logits");
        let loss: f32 = out.loss.unwrap().into_scalar();
        assert!(loss.is_finite() && loss > 0.0);
    }

    #[test]
    fn test_loss_is_unweighted_mean_of_task_losses() {
        let device = Default::default();
        let model = tiny_model(&device).with_training_mode(false);
        let batcher = MixedBatcher::<TestBackend>::new(device, 1, -100);

        let a1 = example(0, vec![-100, 2, 1]);
        let a2 = example(0, vec![-100, 0, 0]);
        let b  = example(1, vec![-100, 4, 3]);

        let loss_of = |items: Vec<EncodedExample>| -> f32 {
            model.forward(batcher.batch(items)).unwrap().loss.unwrap().into_scalar()
        };
        let task_0 = loss_of(vec![a1.clone(), a2.clone()]);
        let task_1 = loss_of(vec![b.clone()]);
        let mixed  = loss_of(vec![a1, b, a2]);

        assert!((mixed - (task_0 + task_1) / 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_eval_mode_returns_logits_of_routed_task() {
        let device = Default::default();
        let model = tiny_model(&device).with_training_mode(false);
        let batcher = MixedBatcher::<TestBackend>::new(device, 1, -100);

        let out = model.forward(batcher.batch(vec![example(1, vec![-100, 0, 1, 2])])).unwrap();
        assert_eq!(out.logits.unwrap().dims(), [1, 4, 5]);
    }

    #[test]
    fn test_unknown_task_id_is_rejected() {
        let device = Default::default();
        let model = tiny_model(&device);
        let batcher = MixedBatcher::<TestBackend>::new(device, 1, -100);

        let err = model.forward(batcher.batch(vec![example(9, vec![-100, 0])])).err().unwrap();
        assert!(matches!(err, MtlError::UnknownTaskId { task_id: 9 }));
    }

    #[test]
    fn test_too_long_sequence_is_rejected() {
        let device = Default::default();
        let model = tiny_model(&device);
        let batcher = MixedBatcher::<TestBackend>::new(device, 1, -100);

        let err = model.forward(batcher.batch(vec![example(0, vec![0; 20])])).err().unwrap();
        assert!(matches!(err, MtlError::SequenceTooLong { len: 20, max: 16 }));
    }

    #[test]
    fn test_tagger_predicts_one_label_per_position() {
        let device = Default::default();
        let model = tiny_model(&device).with_training_mode(false);
        let tagger = ModelTagger::new(&model, MixedBatcher::new(device, 1, -100));

        let predicted = tagger.predict(&example(0, vec![-100, 1, 2, -100, 0])).unwrap();
        assert_eq!(predicted.len(), 5);
        assert!(predicted.iter().all(|&p| p < 3));
    }

    #[test]
    fn test_new_builds_one_head_per_task() {
        let device = Default::default();
        let mut cfg = RunConfig::default();
        cfg.vocab_size = 32;
        cfg.max_position_embeddings = 16;
        cfg.hidden_size = 8;
        cfg.num_heads = 2;
        cfg.num_layers = 1;
        cfg.intermediate_size = 16;

        let task = |task_id, dual_mode, n: usize| Task {
            task_id,
            name: format!("t{task_id}"),
            dual_mode,
            labels: LabelVocab::new((0..n).map(|i| format!("L{i}")).collect()),
            train: vec![], dev: vec![], test: vec![],
        };
        let model = MultiTaskModel::<TestBackend>::new(&cfg, &[task(0, false, 3), task(1, true, 7)], &device);

        assert_eq!(model.heads.len(), 2);
        assert_eq!(model.head(1).unwrap().num_labels, 7);
        assert_eq!(model.head(1).unwrap().input_width(), 16);
        assert_eq!(model.head(0).unwrap().input_width(), 8);
    }
}
