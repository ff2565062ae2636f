// ============================================================
// Layer 2 — Task Set Builder
// ============================================================
// Turns the configured task definitions into loaded Tasks:
//
//   Step 1: label vocabulary from the train file    (data/reader)
//   Step 2: read train / dev / test sentences       (data/reader)
//   Step 3: tokenise + align every sentence         (data/align)
//
// task_id is the task's position in the configured list.

use anyhow::{Context, Result};
use std::path::Path;

use crate::data::{align::encode_sentence, reader};
use crate::domain::traits::SubwordTokenizer;
use crate::domain::{EncodedExample, LabelVocab, RunConfig, Task, TaskDef};
use crate::infra::tokenizer_store::{HfTokenizer, TokenizerStore};

impl Task {
    /// Load and encode all three partitions of `def`.
    pub fn load(
        task_id:   usize,
        def:       &TaskDef,
        data_dir:  &Path,
        tokenizer: &dyn SubwordTokenizer,
        cfg:       &RunConfig,
    ) -> Result<Self> {
        let train_path = def.train_path(data_dir);
        let labels = LabelVocab::new(reader::read_label_set(&train_path)?);
        tracing::info!("Task {} ({}): {} labels", task_id, def.name, labels.len());

        let encode = |path: &Path| -> Result<Vec<EncodedExample>> {
            let sentences = reader::read_sentences(path)?;
            let mut examples = Vec::with_capacity(sentences.len());
            for (i, sentence) in sentences.iter().enumerate() {
                if def.dual_mode && sentence.heads.is_none() {
                    anyhow::bail!("'{}': sentence {} has no head column", path.display(), i);
                }
                let example = encode_sentence(task_id, &def.name, sentence, &labels, tokenizer, cfg.ignore_index)
                    .with_context(|| format!("'{}': cannot encode sentence {}", path.display(), i))?;
                examples.push(example);
            }
            Ok(examples)
        };

        let train = encode(&train_path)?;
        let dev   = encode(&def.dev_path(data_dir))?;
        let test  = encode(&def.test_path(data_dir))?;
        let scored_dev: usize = dev.iter().map(|e| e.scored_positions(cfg.ignore_index)).sum();
        tracing::info!(
            "Task {} ({}): {} train, {} dev ({} scored positions), {} test sentences",
            task_id, def.name, train.len(), dev.len(), scored_dev, test.len(),
        );

        Ok(Task {
            task_id,
            name: def.name.clone(),
            dual_mode: def.dual_mode,
            labels,
            train,
            dev,
            test,
        })
    }
}

/// Every configured task, in configuration order.
pub fn build_tasks(cfg: &RunConfig, tokenizer: &dyn SubwordTokenizer) -> Result<Vec<Task>> {
    let data_dir = Path::new(&cfg.data_dir);
    cfg.tasks
        .iter()
        .enumerate()
        .map(|(task_id, def)| Task::load(task_id, def, data_dir, tokenizer, cfg))
        .collect()
}

/// Load the configured tokenizer and every task with it.
pub fn load_workspace(cfg: &RunConfig) -> Result<(HfTokenizer, Vec<Task>)> {
    let tokenizer = TokenizerStore::new(&cfg.tokenizer_path).load()?;
    let tasks = build_tasks(cfg, &tokenizer)?;
    Ok((tokenizer, tasks))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::align::tests::SplittingTokenizer;
    use std::fs;

    fn write(dir: &Path, name: &str, text: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), text).unwrap();
    }

    #[test]
    fn test_tasks_get_positional_ids_and_sorted_labels() {
        let tmp = tempfile::tempdir().unwrap();
        let pos = tmp.path().join("pos");
        write(&pos, "train.txt", "the DT\ndog NN\n\na DT\ncat NN\nsat VBD\n");
        write(&pos, "dev.txt",   "the DT\ndog NN\n");
        write(&pos, "test.txt",  "");
        let deps = tmp.path().join("deps");
        write(&deps, "train.labels", "the det 1\ndog root -1\n");
        write(&deps, "dev.labels",   "the det 1\ndog root -1\n");
        write(&deps, "test.labels",  "");

        let cfg = RunConfig {
            data_dir: tmp.path().to_string_lossy().into_owned(),
            tasks: vec![
                TaskDef::new("POS", "pos", "train.txt", "dev.txt", "test.txt"),
                TaskDef::new("Deps Label", "deps", "train.labels", "dev.labels", "test.labels").dual(),
            ],
            ..RunConfig::default()
        };

        let tasks = build_tasks(&cfg, &SplittingTokenizer).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!((tasks[0].task_id, tasks[1].task_id), (0, 1));
        assert_eq!(tasks[0].labels.iter().collect::<Vec<_>>(), ["DT", "NN", "VBD"]);
        assert_eq!(tasks[0].train.len(), 2);
        assert!(tasks[0].test.is_empty());

        // <s> the dog </s>: DT at 1, NN at 2
        assert_eq!(tasks[0].dev[0].labels, vec![-100, 0, 1, -100]);
        assert!(tasks[0].dev[0].head_positions.is_none());

        // "the" → head word 1 (token 2); "dog" is root → itself
        assert!(tasks[1].dual_mode);
        assert_eq!(tasks[1].dev[0].head_positions, Some(vec![0, 2, 2, 0]));
        assert!(tasks[1].dev.iter().all(|ex| ex.task_id == 1));
    }

    #[test]
    fn test_dual_task_requires_head_column() {
        let tmp = tempfile::tempdir().unwrap();
        let deps = tmp.path().join("deps");
        for f in ["train", "dev", "test"] {
            write(&deps, f, "the det\ndog root\n");
        }
        let cfg = RunConfig {
            data_dir: tmp.path().to_string_lossy().into_owned(),
            tasks: vec![TaskDef::new("Deps Label", "deps", "train", "dev", "test").dual()],
            ..RunConfig::default()
        };
        assert!(build_tasks(&cfg, &SplittingTokenizer).is_err());
    }

    #[test]
    fn test_unknown_dev_label_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let ner = tmp.path().join("ner");
        write(&ner, "train", "Paris B-LOC\n");
        write(&ner, "dev",   "Bob B-PER\n");
        write(&ner, "test",  "");
        let cfg = RunConfig {
            data_dir: tmp.path().to_string_lossy().into_owned(),
            tasks: vec![TaskDef::new("NER", "ner", "train", "dev", "test")],
            ..RunConfig::default()
        };

        let err = build_tasks(&cfg, &SplittingTokenizer).unwrap_err();
        assert!(err.chain().any(|e| e.to_string().contains("B-PER")));
    }
}
