// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads a HuggingFace tokenizer.json and adapts it to the
// SubwordTokenizer seam the data layer consumes.
//
// Sentences arrive already split into words, so they are
// encoded as pre-tokenised input with special tokens added;
// the encoding's word ids give the subword → word alignment.
//
// The pad id comes from the tokenizer's padding params when
// present, otherwise from the first known pad token spelling.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokenizers::Tokenizer;

use crate::domain::traits::{SubwordTokenizer, Tokenization};
use crate::domain::MtlError;

const PAD_TOKENS: [&str; 2] = ["<pad>", "[PAD]"];

pub struct TokenizerStore {
    path: PathBuf,
}

impl TokenizerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<HfTokenizer> {
        let tokenizer = Tokenizer::from_file(&self.path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", self.path.display(), e))?;
        let tokenizer = HfTokenizer::new(tokenizer)
            .with_context(|| format!("Tokenizer '{}' has no pad token", self.path.display()))?;

        tracing::info!(
            "Loaded tokenizer '{}' (vocab {}, pad id {})",
            self.path.display(),
            tokenizer.inner.get_vocab_size(true),
            tokenizer.pad_id,
        );
        Ok(tokenizer)
    }
}

pub struct HfTokenizer {
    inner:  Tokenizer,
    pad_id: u32,
}

impl HfTokenizer {
    pub fn new(inner: Tokenizer) -> Result<Self> {
        let pad_id = inner
            .get_padding()
            .map(|p| p.pad_id)
            .or_else(|| PAD_TOKENS.iter().find_map(|t| inner.token_to_id(t)))
            .ok_or_else(|| anyhow::anyhow!("none of {:?} is in the vocabulary", PAD_TOKENS))?;
        Ok(Self { inner, pad_id })
    }
}

impl SubwordTokenizer for HfTokenizer {
    fn tokenize(&self, words: &[String]) -> Result<Tokenization, MtlError> {
        let encoding = self
            .inner
            .encode(words, true)
            .map_err(|e| MtlError::Tokenization { message: e.to_string() })?;

        Ok(Tokenization {
            token_ids: encoding.get_ids().to_vec(),
            word_ids:  encoding.get_word_ids().iter().map(|w| w.map(|w| w as usize)).collect(),
        })
    }

    fn pad_token_id(&self) -> u32 {
        self.pad_id
    }
}
