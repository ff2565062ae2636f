// ============================================================
// Layer 3 — Core Traits (Collaborator Seams)
// ============================================================
// The core consumes two collaborators it does not implement
// itself:
//
//   SubwordTokenizer — splits pre-tokenised words into subword
//                      ids and reports which word each subword
//                      came from
//   TokenTagger      — anything that predicts one label index
//                      per token position for an example
//
// The production tokenizer wraps a HuggingFace tokenizer
// (infra/tokenizer_store.rs); the production tagger is the
// MultiTaskModel (ml/model.rs). Tests plug in small fakes.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use crate::domain::error::MtlError;
use crate::domain::example::EncodedExample;

// ─── SubwordTokenizer ─────────────────────────────────────────────────────────
/// Output of tokenising one sentence.
/// `word_ids[i]` is the word that produced token `i`, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Tokenization {
    pub token_ids: Vec<u32>,
    pub word_ids:  Vec<Option<usize>>,
}

pub trait SubwordTokenizer {
    /// Tokenise a sentence that is already split into words,
    /// including the model's special tokens.
    fn tokenize(&self, words: &[String]) -> Result<Tokenization, MtlError>;

    /// Id used to pad input ids up to the batch length.
    fn pad_token_id(&self) -> u32;
}

// ─── TokenTagger ──────────────────────────────────────────────────────────────
pub trait TokenTagger {
    /// Predict a label index for every position of `example`.
    /// The result has exactly `example.len()` entries.
    fn predict(&self, example: &EncodedExample) -> anyhow::Result<Vec<usize>>;
}
