//! Typed failures of the multi-task core.
//!
//! Every variant is fatal for the operation that raised it. Nothing in the
//! core substitutes a default value for a missing label, head or score.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MtlError {
    /// A word-level label is absent from the task's vocabulary.
    #[error("cannot find index for label '{label}' in task '{task}'")]
    UnknownLabel { task: String, label: String },

    /// A batch carries a task id for which the model has no head.
    #[error("unknown task id {task_id}: the model has no head for it")]
    UnknownTaskId { task_id: usize },

    /// Accuracy was requested over zero scored positions.
    #[error("no scored positions while evaluating '{what}'; the dev set is empty or fully excluded")]
    EmptyEvaluation { what: String },

    #[error("sequence of {len} tokens exceeds the encoder's {max} positions")]
    SequenceTooLong { len: usize, max: usize },

    #[error("no checkpoints to select from")]
    NoCheckpoints,

    #[error("top-k must be at least 1, got {k}")]
    InvalidTopK { k: usize },

    /// Two models that should share an architecture disagree on a parameter.
    #[error("parameter #{index} mismatch: expected shape {expected:?}, found {found:?}")]
    ParameterMismatch {
        index: usize,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("'{}' is not a model directory", path.display())]
    NotAModelDirectory { path: PathBuf },

    #[error("tokenization failed: {message}")]
    Tokenization { message: String },

    #[error("{}:{line}: {message}", path.display())]
    MalformedLine {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("word {word} points at head word {head}, which is outside the sentence")]
    HeadOutOfRange { word: usize, head: i64 },
}
