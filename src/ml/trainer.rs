// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Joint training of the shared encoder and every task head on
// one mixed stream of all tasks' training examples.
//
//   - Training uses TrainBackend (Autodiff<Wgpu>) for gradients
//   - The mixed set is shuffled with the run seed each epoch
//   - Each batch goes through MultiTaskModel::forward, which
//     routes examples to their heads and averages task losses
//   - AdamW with the configured weight decay
//   - After every epoch the model (valid copy, no autodiff) is
//     saved to <model_dir>/checkpoint-<step>
//
// Reference: Burn Book §5, Loshchilov & Hutter (2019) AdamW

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::path::{Path, PathBuf};

use crate::data::{batcher::MixedBatcher, dataset::TaskDataset};
use crate::domain::{RunConfig, Task};
use crate::infra::checkpoint::CheckpointStore;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::model::MultiTaskModel;

pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub steps:       usize,
    pub checkpoints: Vec<PathBuf>,
    pub final_loss:  f64,
}

pub fn run_training(
    cfg:          &RunConfig,
    tasks:        &[Task],
    pad_token_id: u32,
    store:        &CheckpointStore,
) -> Result<TrainingSummary> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    train_loop::<TrainBackend>(cfg, tasks, pad_token_id, store, device)
}

pub fn train_loop<B: AutodiffBackend>(
    cfg:          &RunConfig,
    tasks:        &[Task],
    pad_token_id: u32,
    store:        &CheckpointStore,
    device:       B::Device,
) -> Result<TrainingSummary> {
    B::seed(cfg.seed);

    // ── Build model ───────────────────────────────────────────────────────────
    let mut model = MultiTaskModel::<B>::new(cfg, tasks, &device);
    if let Some(init) = &cfg.init_from {
        let (loaded, found) = CheckpointStore::load_lenient(model, Path::new(init), &device)?;
        if found {
            tracing::info!("Starting from the weights in '{}'", init);
        } else {
            tracing::warn!("'{}' is not a model directory; starting from fresh weights", init);
        }
        model = loaded;
    }
    model.summarize_heads();

    // ── AdamW optimiser ───────────────────────────────────────────────────────
    let mut optim = AdamWConfig::new()
        .with_weight_decay(cfg.weight_decay as f32)
        .init();

    // ── Mixed training data ───────────────────────────────────────────────────
    let train_set = TaskDataset::mixed_train(tasks);
    tracing::info!(
        "Training on {} examples from {} tasks, batch size {}",
        train_set.example_count(), tasks.len(), cfg.batch_size,
    );

    let batcher = MixedBatcher::<B>::new(device.clone(), pad_token_id, cfg.ignore_index);
    let loader = DataLoaderBuilder::new(batcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train_set);

    let metrics = MetricsLogger::epochs(store.root())?;
    let mut step = 0usize;
    let mut checkpoints = Vec::with_capacity(cfg.epochs);
    let mut final_loss = f64::NAN;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {
        let mut loss_sum = 0.0f64;
        let mut batches  = 0usize;

        for batch in loader.iter() {
            let Some(loss) = model.forward(batch)?.loss else {
                continue;
            };

            loss_sum += loss.clone().into_scalar().elem::<f64>();
            batches  += 1;
            step     += 1;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.learning_rate, model, grads);
        }

        final_loss = if batches > 0 { loss_sum / batches as f64 } else { f64::NAN };
        tracing::info!("Epoch {:>3}/{} | step {} | train_loss={:.4}", epoch, cfg.epochs, step, final_loss);
        metrics.log_epoch(&EpochMetrics::new(epoch, step, final_loss, batches))?;

        let dir = store.checkpoint_dir(step);
        CheckpointStore::save_model(&model.valid(), &dir)?;
        tracing::info!("Checkpoint saved to '{}'", dir.display());
        checkpoints.push(dir);
    }

    tracing::info!("Training complete after {} steps", step);
    Ok(TrainingSummary { steps: step, checkpoints, final_loss })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EncodedExample, LabelVocab};
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn tiny_run(model_dir: &str) -> RunConfig {
        RunConfig {
            model_dir:               model_dir.to_string(),
            epochs:                  2,
            batch_size:              2,
            learning_rate:           1e-3,
            vocab_size:              32,
            max_position_embeddings: 16,
            hidden_size:             8,
            num_heads:               2,
            num_layers:              1,
            intermediate_size:       16,
            ..RunConfig::default()
        }
    }

    fn task(task_id: usize, dual_mode: bool) -> Task {
        let ex = |labels: Vec<i64>| EncodedExample {
            task_id,
            input_ids:      vec![0, 7, 9, 2][..labels.len()].to_vec(),
            word_ids:       (0..labels.len()).map(Some).collect(),
            head_positions: dual_mode.then(|| vec![0; labels.len()]),
            labels,
        };
        Task {
            task_id,
            name:      format!("task{task_id}"),
            dual_mode,
            labels:    LabelVocab::new(vec!["A".into(), "B".into()]),
            train:     vec![ex(vec![-100, 0, 1, -100]), ex(vec![-100, 1, -100])],
            dev:       vec![],
            test:      vec![],
        }
    }

    #[test]
    fn test_one_checkpoint_per_epoch() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = tiny_run(&tmp.path().to_string_lossy());
        let store = CheckpointStore::new(tmp.path());
        let tasks = vec![task(0, false), task(1, true)];

        let summary = train_loop::<TestBackend>(&cfg, &tasks, 1, &store, Default::default()).unwrap();

        // 4 examples, batch size 2 → 2 steps per epoch
        assert_eq!(summary.steps, 4);
        assert!(summary.final_loss.is_finite());
        let found = store.discover().unwrap();
        assert_eq!(found, summary.checkpoints);
        assert!(found[1].ends_with("checkpoint-4"));
        assert!(tmp.path().join(crate::infra::metrics::EPOCH_CSV).is_file());
    }

    #[test]
    fn test_missing_init_directory_falls_back_to_fresh_weights() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = tiny_run(&tmp.path().to_string_lossy());
        cfg.epochs = 1;
        cfg.init_from = Some(tmp.path().join("nothing-here").to_string_lossy().into_owned());
        let store = CheckpointStore::new(tmp.path());

        let summary = train_loop::<TestBackend>(&cfg, &[task(0, false)], 1, &store, Default::default()).unwrap();
        assert_eq!(summary.checkpoints.len(), 1);
    }
}
