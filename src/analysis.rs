//! Word-frequency analysis over the silver dataset.
//!
//! Reads every `description` from the silver parquet file, tokenizes on
//! whitespace, and counts tokens longer than [`MIN_TOKEN_CHARS`]
//! characters. Ranking is by count descending, ties broken by the word
//! ascending, so output is deterministic for a given dataset.
//!
//! Tokens are compared exactly as they appear: no lowercasing, no
//! punctuation stripping. "Governo" and "governo," are distinct words.

use std::collections::HashMap;

use itertools::Itertools;
use tracing::{info, instrument};

use crate::config::LakePaths;
use crate::error::Result;
use crate::store::parquet;

/// Tokens must be strictly longer than this many characters to count.
/// Length is measured in `char`s, not bytes, so accented words the
/// dataset is full of are not over-counted.
pub const MIN_TOKEN_CHARS: usize = 4;

/// One ranked word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordCount {
    pub word: String,
    pub count: u64,
}

/// Rank the words of every silver `description`, most frequent first.
#[instrument(level = "info", skip_all)]
pub async fn word_frequencies(paths: &LakePaths) -> Result<Vec<WordCount>> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    let mut rows = 0usize;
    for batch in parquet::read_batches(&paths.silver_file())? {
        for row in parquet::batch_to_silver_rows(&batch)? {
            rows += 1;
            if let Some(description) = &row.description {
                count_tokens(description, &mut counts);
            }
        }
    }
    info!(rows, distinct_words = counts.len(), "word frequencies computed");

    let ranked = counts
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
        .map(|(word, count)| WordCount { word, count })
        .collect();
    Ok(ranked)
}

fn count_tokens(text: &str, counts: &mut HashMap<String, u64>) {
    for token in text.split_whitespace() {
        if token.chars().count() > MIN_TOKEN_CHARS {
            *counts.entry(token.to_string()).or_insert(0) += 1;
        }
    }
}
