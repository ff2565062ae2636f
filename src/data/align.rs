// ============================================================
// Layer 4 — Word → Subword Alignment
// ============================================================
// The tokenizer may split one word into several subwords and
// adds special tokens ([CLS], [SEP], <s>, ...) that belong to
// no word. Word-level annotations are moved onto the FIRST
// subword of each word:
//
//   words:     The   dog   barks
//   tokens:    <s>  The  dog  bark  ##s  </s>
//   word_ids:  None  0    1    2     2   None
//   labels:    ign   DT   NN   VBZ  ign  ign
//
// Head positions are translated from word indices to the
// position of the head word's first subword.

use std::collections::HashMap;

use crate::data::reader::Sentence;
use crate::domain::traits::SubwordTokenizer;
use crate::domain::{EncodedExample, LabelVocab, MtlError};

/// Put each word's label index on its first subword and `ignore_index`
/// everywhere else. An unknown label is an error.
pub fn align_labels(
    word_ids:     &[Option<usize>],
    labels:       &[String],
    vocab:        &LabelVocab,
    task:         &str,
    ignore_index: i64,
) -> Result<Vec<i64>, MtlError> {
    let mut out = Vec::with_capacity(word_ids.len());
    let mut previous: Option<usize> = None;

    for &word_id in word_ids {
        match word_id {
            Some(w) if Some(w) != previous => {
                let label = labels.get(w).ok_or_else(|| MtlError::Tokenization {
                    message: format!("token points at word {w}, sentence has {}", labels.len()),
                })?;
                let index = vocab.index_of(label).ok_or_else(|| MtlError::UnknownLabel {
                    task:  task.to_string(),
                    label: label.clone(),
                })?;
                out.push(index as i64);
            }
            _ => out.push(ignore_index),
        }
        previous = word_id;
    }

    Ok(out)
}

/// Translate word-level heads (-1 = root) into token positions.
///
/// The first subword of a root word points at itself, so a dual-mode head
/// pairs its embedding with itself. Special and continuation tokens get 0;
/// they carry no label, so the value is never scored.
pub fn align_head_positions(
    word_ids:   &[Option<usize>],
    word_heads: &[i64],
) -> Result<Vec<i64>, MtlError> {
    let mut first_token: HashMap<usize, usize> = HashMap::new();
    let mut previous: Option<usize> = None;
    for (pos, &word_id) in word_ids.iter().enumerate() {
        if let Some(w) = word_id {
            if Some(w) != previous {
                first_token.insert(w, pos);
            }
        }
        previous = word_id;
    }

    let mut out = Vec::with_capacity(word_ids.len());
    let mut previous: Option<usize> = None;
    for (pos, &word_id) in word_ids.iter().enumerate() {
        match word_id {
            Some(w) if Some(w) != previous => {
                let head = *word_heads.get(w).ok_or_else(|| MtlError::Tokenization {
                    message: format!("token points at word {w}, sentence has {} heads", word_heads.len()),
                })?;
                if head == -1 {
                    out.push(pos as i64);
                } else {
                    let target = usize::try_from(head)
                        .ok()
                        .and_then(|h| first_token.get(&h))
                        .ok_or(MtlError::HeadOutOfRange { word: w, head })?;
                    out.push(*target as i64);
                }
            }
            _ => out.push(0),
        }
        previous = word_id;
    }

    Ok(out)
}

/// Tokenise one sentence and align its annotations.
pub fn encode_sentence(
    task_id:      usize,
    task:         &str,
    sentence:     &Sentence,
    vocab:        &LabelVocab,
    tokenizer:    &dyn SubwordTokenizer,
    ignore_index: i64,
) -> Result<EncodedExample, MtlError> {
    let tok = tokenizer.tokenize(&sentence.words)?;
    if tok.word_ids.len() != tok.token_ids.len() {
        return Err(MtlError::Tokenization {
            message: format!(
                "{} token ids but {} word ids",
                tok.token_ids.len(),
                tok.word_ids.len()
            ),
        });
    }

    let labels = align_labels(&tok.word_ids, &sentence.labels, vocab, task, ignore_index)?;
    let head_positions = match &sentence.heads {
        Some(heads) => Some(align_head_positions(&tok.word_ids, heads)?),
        None => None,
    };

    Ok(EncodedExample {
        task_id,
        input_ids: tok.token_ids,
        word_ids:  tok.word_ids,
        labels,
        head_positions,
    })
}
