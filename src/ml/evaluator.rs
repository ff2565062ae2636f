// ============================================================
// Layer 5 — Checkpoint Evaluator
// ============================================================
// Scores a model on every task's dev partition:
//
//   task accuracy  = correct / total over ALL dev examples,
//                    skipping positions labelled ignore_index
//   macro accuracy = unweighted mean of the task accuracies
//
// Examples are tagged one at a time (batch of one), so the
// score does not depend on batch routing or padding.
//
// evaluate_checkpoints() runs this over every checkpoint
// directory of a run and records the scores.

use anyhow::{Context, Result};
use burn::prelude::*;

use crate::data::batcher::MixedBatcher;
use crate::domain::traits::TokenTagger;
use crate::domain::{Checkpoint, MtlError, RunConfig, Task};
use crate::infra::checkpoint::CheckpointStore;
use crate::infra::metrics::MetricsLogger;
use crate::ml::model::{ModelTagger, MultiTaskModel};

/// Token accuracy of `tagger` on the dev partition of `task`.
pub fn task_accuracy(tagger: &dyn TokenTagger, task: &Task, ignore_index: i64) -> Result<f64> {
    let mut correct = 0usize;
    let mut total   = 0usize;

    for (i, example) in task.dev.iter().enumerate() {
        let predicted = tagger.predict(example)?;
        if predicted.len() != example.len() {
            anyhow::bail!(
                "task '{}', dev example {}: {} predictions for {} positions",
                task.name, i, predicted.len(), example.len(),
            );
        }

        for (&guess, &gold) in predicted.iter().zip(&example.labels) {
            if gold == ignore_index {
                continue;
            }
            total += 1;
            if guess as i64 == gold {
                correct += 1;
            }
        }
    }

    if total == 0 {
        return Err(MtlError::EmptyEvaluation { what: task.name.clone() }.into());
    }

    let accuracy = correct as f64 / total as f64;
    tracing::info!("Accuracy for task {}: {:.4} ({}/{})", task.name, accuracy, correct, total);
    Ok(accuracy)
}

/// Mean of the per-task accuracies; every task counts equally.
pub fn macro_accuracy(tagger: &dyn TokenTagger, tasks: &[Task], ignore_index: i64) -> Result<f64> {
    if tasks.is_empty() {
        return Err(MtlError::EmptyEvaluation { what: "task list".to_string() }.into());
    }

    let mut sum = 0.0;
    for task in tasks {
        sum += task_accuracy(tagger, task, ignore_index)?;
    }
    let macro_acc = sum / tasks.len() as f64;
    tracing::info!("Macro accuracy: {:.4}", macro_acc);
    Ok(macro_acc)
}

/// Macro accuracy of a model. Puts the model in evaluation mode.
pub fn evaluate_model<B: Backend>(
    model:        MultiTaskModel<B>,
    tasks:        &[Task],
    ignore_index: i64,
    pad_token_id: u32,
    device:       &B::Device,
) -> Result<f64> {
    let model  = model.with_training_mode(false);
    let tagger = ModelTagger::new(&model, MixedBatcher::new(device.clone(), pad_token_id, ignore_index));
    macro_accuracy(&tagger, tasks, ignore_index)
}

/// Load and score every checkpoint of the run in `store`, in
/// discovery order. Scores are appended to `checkpoint_scores.csv`.
pub fn evaluate_checkpoints<B: Backend>(
    store:        &CheckpointStore,
    cfg:          &RunConfig,
    tasks:        &[Task],
    pad_token_id: u32,
    device:       &B::Device,
) -> Result<Vec<Checkpoint>> {
    let dirs = store.discover()?;
    if dirs.is_empty() {
        tracing::warn!("No checkpoints found under '{}'", store.root().display());
        return Ok(Vec::new());
    }

    let scores = MetricsLogger::checkpoint_scores(store.root())?;
    let mut checkpoints: Vec<Checkpoint> = Vec::with_capacity(dirs.len());
    let mut best: Option<usize> = None;

    for dir in dirs {
        tracing::info!("Evaluating checkpoint '{}'", dir.display());
        let model = CheckpointStore::load_strict(MultiTaskModel::<B>::new(cfg, tasks, device), &dir, device)?;
        let macro_acc = evaluate_model(model, tasks, cfg.ignore_index, pad_token_id, device)
            .with_context(|| format!("Cannot evaluate checkpoint '{}'", dir.display()))?;

        let ckpt = Checkpoint::new(dir, macro_acc);
        scores.log_score(&ckpt)?;
        checkpoints.push(ckpt);

        let current = checkpoints.len() - 1;
        if best.map_or(true, |b| macro_acc > checkpoints[b].macro_accuracy) {
            best = Some(current);
        }
        if let Some(b) = best {
            tracing::info!(
                "Best so far: '{}' with macro accuracy {:.4}",
                checkpoints[b].path.display(), checkpoints[b].macro_accuracy,
            );
        }
    }
    Ok(checkpoints)
}
