//! Corpus loading, category filtering, label mapping, and the train/val split.
//!
//! Records come from a JSONL snapshot of the source dataset: one object per
//! line with a `text` field and a `label_text` category name. Downloading the
//! snapshot itself is outside this crate; any process that can produce the
//! two-field JSONL layout can feed the pipeline.

use serde::Deserialize;
use std::path::Path;

use crate::{Error, Result};

/// One raw input item of the source dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct Record {
    /// Document body.
    pub text: String,
    /// Category name, e.g. `rec.sport.baseball`.
    pub label_text: String,
}

/// A record after label mapping: text plus a binary class index.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    /// Document body.
    pub text: String,
    /// 0 for the first configured category, 1 for the second.
    pub label: usize,
}

/// Per-class counts over a filtered corpus.
///
/// The split below is unstratified, so printing these counts is what makes
/// class imbalance visible before training starts.
#[derive(Debug, Clone)]
pub struct CorpusStats {
    /// Total examples.
    pub total: usize,
    /// Examples per class index.
    pub class_counts: Vec<usize>,
    /// Average document length in characters.
    pub avg_text_len: usize,
}

/// Load dataset records from a JSONL snapshot.
///
/// Blank lines are skipped; a malformed line is a hard error.
///
/// # Errors
/// Returns an error if the file cannot be read or a line fails to parse.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Io(format!("Corpus snapshot not found: {}: {e}", path.display())))?;

    let mut records = Vec::new();
    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: Record = serde_json::from_str(line).map_err(|e| {
            Error::Serialization(format!("Invalid JSONL at line {}: {e}", line_num + 1))
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Keep only records belonging to the two configured categories and map them
/// to binary labels: `categories[0]` becomes 0, `categories[1]` becomes 1.
///
/// If neither category occurs, the result is simply empty; the caller sees
/// an empty corpus, not an error.
#[must_use]
pub fn filter_and_label(records: &[Record], categories: &[&str; 2]) -> Vec<Example> {
    records
        .iter()
        .filter_map(|r| {
            let label = categories.iter().position(|c| *c == r.label_text)?;
            Some(Example {
                text: r.text.clone(),
                label,
            })
        })
        .collect()
}

/// Compute per-class counts and average text length.
#[must_use]
pub fn corpus_stats(examples: &[Example], num_classes: usize) -> CorpusStats {
    let mut class_counts = vec![0usize; num_classes];
    let mut total_len = 0usize;

    for e in examples {
        if e.label < num_classes {
            class_counts[e.label] += 1;
        }
        total_len += e.text.len();
    }

    CorpusStats {
        total: examples.len(),
        class_counts,
        avg_text_len: if examples.is_empty() {
            0
        } else {
            total_len / examples.len()
        },
    }
}

/// Split examples into disjoint train/validation sets.
///
/// Indices are shuffled with a Fisher-Yates pass driven by an LCG PRNG, so
/// membership is bit-stable for a given seed across platforms and library
/// versions. The validation set takes `ceil(len * val_ratio)` examples; the
/// remainder trains. Unstratified: class balance across the cut is whatever
/// the shuffle produces.
#[must_use]
pub fn split_examples(
    examples: &[Example],
    val_ratio: f32,
    seed: u64,
) -> (Vec<Example>, Vec<Example>) {
    if examples.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let mut indices: Vec<usize> = (0..examples.len()).collect();
    let mut rng_state = seed;
    for i in (1..indices.len()).rev() {
        rng_state = rng_state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        let j = (rng_state >> 33) as usize % (i + 1);
        indices.swap(i, j);
    }

    let val_count = ((examples.len() as f32) * val_ratio).ceil() as usize;
    let val_count = val_count.min(examples.len().saturating_sub(1)).max(1);

    let val: Vec<Example> = indices[..val_count]
        .iter()
        .map(|&i| examples[i].clone())
        .collect();
    let train: Vec<Example> = indices[val_count..]
        .iter()
        .map(|&i| examples[i].clone())
        .collect();

    (train, val)
}
