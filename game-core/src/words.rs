use std::collections::HashSet;

use anyhow::{Result, anyhow};
use rand::seq::SliceRandom;

/// Word source and dictionary for one word length.
///
/// The same list backs both concerns: membership checks for guess validation
/// and target-word selection. Daily selection is deterministic in the day
/// index so every daily room on a given day plays the same word.
pub struct WordList {
    words: Vec<String>,
    lookup: HashSet<String>,
    word_length: usize,
}

impl WordList {
    /// Parse a newline-delimited word list, keeping only words of
    /// `word_length`. Blank lines and `#` comments are skipped.
    pub fn from_list(raw: &str, word_length: usize) -> Self {
        let mut words: Vec<String> = raw
            .lines()
            .map(|line| line.trim().to_lowercase())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter(|word| word.len() == word_length && word.chars().all(|c| c.is_ascii_alphabetic()))
            .collect();

        words.sort();
        words.dedup();
        let lookup = words.iter().cloned().collect();

        Self {
            words,
            lookup,
            word_length,
        }
    }

    pub fn word_length(&self) -> usize {
        self.word_length
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Dictionary membership check used for guess validation.
    pub fn contains(&self, word: &str) -> bool {
        self.lookup.contains(&word.trim().to_lowercase())
    }

    /// The word for a given day index. Stable across processes as long as the
    /// list contents are stable.
    pub fn daily_word(&self, day_index: u32) -> Result<String> {
        if self.words.is_empty() {
            return Err(anyhow!("word list is empty"));
        }
        Ok(self.words[day_index as usize % self.words.len()].clone())
    }

    pub fn random_word(&self) -> Result<String> {
        self.words
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| anyhow!("word list is empty"))
    }

    /// Days since the Unix epoch, UTC. Used to key daily words.
    pub fn today_index() -> u32 {
        (chrono::Utc::now().timestamp() / 86_400) as u32
    }
}
