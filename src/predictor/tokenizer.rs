//! Word-index tokenizer and fixed-length sequence padding

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Characters replaced by a separator before splitting into words
const FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// Padding token, never assigned to a word
pub const PAD_TOKEN: u32 = 0;

/// Tokenizer state as exported at training time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordTokenizer {
    /// Only words with an index below this bound are kept
    #[serde(default)]
    pub num_words: Option<usize>,
    /// Token substituted for unknown words, if the vocabulary has one
    #[serde(default)]
    pub oov_token: Option<String>,
    pub word_index: HashMap<String, u32>,
}

impl WordTokenizer {
    pub fn new(word_index: HashMap<String, u32>, num_words: Option<usize>) -> Self {
        Self {
            num_words,
            oov_token: None,
            word_index,
        }
    }

    /// Highest index the tokenizer can emit
    pub fn max_index(&self) -> u32 {
        let max_word = self.word_index.values().copied().max().unwrap_or(PAD_TOKEN);
        match self.num_words {
            Some(limit) => max_word.min(limit.saturating_sub(1) as u32),
            None => max_word,
        }
    }

    fn oov_index(&self) -> Option<u32> {
        self.oov_token
            .as_ref()
            .and_then(|token| self.word_index.get(token))
            .copied()
    }

    fn in_vocabulary(&self, index: u32) -> bool {
        self.num_words.map_or(true, |limit| (index as usize) < limit)
    }

    /// Convert one text into its sequence of word indices
    pub fn text_to_sequence(&self, text: &str) -> Vec<u32> {
        let oov = self.oov_index();
        split_words(text)
            .filter_map(|word| match self.word_index.get(word) {
                Some(&index) if self.in_vocabulary(index) => Some(index),
                _ => oov,
            })
            .collect()
    }

    pub fn texts_to_sequences<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Vec<u32>> {
        texts
            .iter()
            .map(|text| self.text_to_sequence(text.as_ref()))
            .collect()
    }
}

fn split_words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c == ' ' || FILTERS.contains(c))
        .filter(|word| !word.is_empty())
}

/// Pad or truncate every sequence to `max_len`.
///
/// Short sequences are left-padded with [`PAD_TOKEN`]; long ones keep their
/// last `max_len` tokens.
pub fn pad_sequences(sequences: &[Vec<u32>], max_len: usize) -> Array2<u32> {
    let mut padded = Array2::from_elem((sequences.len(), max_len), PAD_TOKEN);

    for (row, sequence) in sequences.iter().enumerate() {
        let kept = &sequence[sequence.len().saturating_sub(max_len)..];
        let offset = max_len - kept.len();
        for (column, &token) in kept.iter().enumerate() {
            padded[[row, offset + column]] = token;
        }
    }

    padded
}
