// ============================================================
// Layer 4 — Column File Reader
// ============================================================
// Reads the CoNLL-style task files: one token per line,
// whitespace-separated columns, a blank line between sentences.
//
//   column 1 — the word
//   column 2 — its label
//   column 3 — optional absolute head position (-1 = root)
//
// Example (dependency labels):
//   The   det    1
//   dog   nsubj  2
//   barks root  -1
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::MtlError;

/// One sentence of a column file.
#[derive(Debug, Clone, PartialEq)]
pub struct Sentence {
    pub words:  Vec<String>,
    pub labels: Vec<String>,
    /// Present only for three-column files
    pub heads:  Option<Vec<i64>>,
}

/// Collect the label column of a file into a sorted, deduplicated vocabulary.
pub fn read_label_set(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read label file '{}'", path.display()))?;

    let mut labels = BTreeSet::new();
    for (lineno, line) in text.lines().enumerate() {
        let cols: Vec<&str> = line.split_whitespace().collect();
        match cols.as_slice() {
            [] => {}
            [_, label, ..] => {
                labels.insert(label.to_string());
            }
            [_] => return Err(missing_label(path, lineno).into()),
        }
    }

    let labels: Vec<String> = labels.into_iter().collect();
    tracing::debug!("{} labels in '{}'", labels.len(), path.display());
    Ok(labels)
}

/// Read a file into sentences.
pub fn read_sentences(path: &Path) -> Result<Vec<Sentence>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read task file '{}'", path.display()))?;
    Ok(parse_sentences(&text, path)?)
}

/// Parse column text into sentences; `path` is only used in errors.
pub fn parse_sentences(text: &str, path: &Path) -> Result<Vec<Sentence>, MtlError> {
    let mut sentences = Vec::new();
    let mut words  = Vec::new();
    let mut labels = Vec::new();
    let mut heads  = Vec::new();
    let mut last_line = 0;

    for (lineno, line) in text.lines().enumerate() {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.is_empty() {
            flush(&mut sentences, &mut words, &mut labels, &mut heads)
                .map_err(|message| malformed(path, last_line, message))?;
            continue;
        }
        last_line = lineno + 1;
        if cols.len() < 2 {
            return Err(missing_label(path, lineno));
        }

        words.push(cols[0].to_string());
        labels.push(cols[1].to_string());
        if let Some(head) = cols.get(2) {
            let head = head.parse::<i64>().map_err(|_| MtlError::MalformedLine {
                path:    path.to_path_buf(),
                line:    lineno + 1,
                message: format!("head position '{head}' is not an integer"),
            })?;
            heads.push(head);
        }
    }
    // files do not always end with a blank line
    flush(&mut sentences, &mut words, &mut labels, &mut heads)
        .map_err(|message| malformed(path, last_line, message))?;

    Ok(sentences)
}

fn flush(
    sentences: &mut Vec<Sentence>,
    words:     &mut Vec<String>,
    labels:    &mut Vec<String>,
    heads:     &mut Vec<i64>,
) -> Result<(), String> {
    if words.is_empty() {
        return Ok(());
    }
    let heads = std::mem::take(heads);
    // a sentence has a head on every line or on none
    if !heads.is_empty() && heads.len() != words.len() {
        let message = format!(
            "sentence mixes two- and three-column lines ({} heads for {} words)",
            heads.len(), words.len(),
        );
        words.clear();
        labels.clear();
        return Err(message);
    }
    sentences.push(Sentence {
        words:  std::mem::take(words),
        labels: std::mem::take(labels),
        heads:  (!heads.is_empty()).then_some(heads),
    });
    Ok(())
}

fn malformed(path: &Path, line: usize, message: String) -> MtlError {
    MtlError::MalformedLine { path: path.to_path_buf(), line, message }
}

fn missing_label(path: &Path, lineno: usize) -> MtlError {
    malformed(path, lineno + 1, "expected at least a word and a label".to_string())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_column_sentences() {
        let text = "The DT\ndog NN\n\nIt PRP\nran VBD\n\n";
        let s = parse_sentences(text, Path::new("pos.txt")).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].words, vec!["The", "dog"]);
        assert_eq!(s[1].labels, vec!["PRP", "VBD"]);
        assert!(s[0].heads.is_none());
    }

    #[test]
    fn test_three_column_sentence_keeps_heads() {
        let text = "The det 1\ndog nsubj 2\nbarks root -1\n";
        let s = parse_sentences(text, Path::new("deps.labels")).unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].heads, Some(vec![1, 2, -1]));
    }

    #[test]
    fn test_repeated_blank_lines_do_not_make_empty_sentences() {
        let text = "\n\nA DT\n\n\n\nB NN\n";
        let s = parse_sentences(text, Path::new("x")).unwrap();
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_single_column_line_is_rejected() {
        let err = parse_sentences("The DT\ndog\n", Path::new("bad.txt")).unwrap_err();
        assert!(matches!(err, MtlError::MalformedLine { line: 2, .. }));
    }

    #[test]
    fn test_non_integer_head_is_rejected() {
        let err = parse_sentences("The det x\n", Path::new("bad.heads")).unwrap_err();
        assert!(matches!(err, MtlError::MalformedLine { line: 1, .. }));
    }

    #[test]
    fn test_sentence_mixing_column_counts_is_rejected() {
        let err = parse_sentences("a X 1\nb Y\nc Z -1\n", Path::new("mixed.heads")).unwrap_err();
        assert!(matches!(err, MtlError::MalformedLine { line: 3, .. }));

        let err = parse_sentences("a X 1\nb Y\n\nc Z -1\n", Path::new("mixed.heads")).unwrap_err();
        assert!(matches!(err, MtlError::MalformedLine { line: 2, .. }));
    }

    #[test]
    fn test_label_set_is_sorted_and_unique() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.txt");
        fs::write(&path, "a NN\nb DT\n\nc NN\nd VB\n").unwrap();
        let labels = read_label_set(&path).unwrap();
        assert_eq!(labels, vec!["DT", "NN", "VB"]);
    }
}
