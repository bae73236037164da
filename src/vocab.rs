//! Character Vocabulary
//!
//! The network reads and writes characters, but all of its arithmetic is on
//! integer indices. The vocabulary is the bidirectional mapping between the
//! two, built once from the training corpus.
//!
//! ## How the Vocabulary is Built
//!
//! 1. **Collect distinct characters**: every Unicode scalar value seen in the corpus
//! 2. **Sort them**: gives a fixed, reproducible index assignment
//! 3. **Number them**: index `i` is the `i`-th smallest character
//!
//! ```text
//! Corpus: "the cat"
//! Distinct, sorted: [' ', 'a', 'c', 'e', 'h', 't']
//! char_to_index:    {' ':0, 'a':1, 'c':2, 'e':3, 'h':4, 't':5}
//! encode("cat") = [2, 1, 5]
//! ```
//!
//! The order only affects which index a character gets, never what the model
//! can learn. Sorting just makes two runs on the same corpus agree.

use crate::error::{CharRnnError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Bidirectional character ↔ index mapping
///
/// `char_to_index` and `index_to_char` are inverse, total and injective over
/// exactly the characters of the corpus the vocabulary was built from.
/// Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<char>", into = "Vec<char>")]
pub struct CharVocab {
    /// Index → character
    chars: Vec<char>,
    /// Character → index
    index: HashMap<char, usize>,
}

impl CharVocab {
    /// Build the vocabulary of `text`
    ///
    /// # Errors
    ///
    /// Returns [`CharRnnError::EmptyCorpus`] if `text` is empty, since a
    /// zero-size vocabulary cannot parameterize a softmax.
    ///
    /// # Example
    ///
    /// ```rust
    /// use char_rnn::CharVocab;
    ///
    /// let vocab = CharVocab::build("abab").unwrap();
    /// assert_eq!(vocab.vocab_size(), 2);
    /// assert_eq!(vocab.char_to_index('a'), Some(0));
    /// assert_eq!(vocab.index_to_char(1), Some('b'));
    /// ```
    pub fn build(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(CharRnnError::EmptyCorpus);
        }
        let distinct: BTreeSet<char> = text.chars().collect();
        Ok(Self::from_distinct(distinct.into_iter().collect()))
    }

    fn from_distinct(chars: Vec<char>) -> Self {
        let index = chars.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        Self { chars, index }
    }

    /// Number of distinct characters
    pub fn vocab_size(&self) -> usize {
        self.chars.len()
    }

    pub fn char_to_index(&self, c: char) -> Option<usize> {
        self.index.get(&c).copied()
    }

    pub fn index_to_char(&self, i: usize) -> Option<char> {
        self.chars.get(i).copied()
    }

    /// Encode text into indices
    ///
    /// # Errors
    ///
    /// [`CharRnnError::UnknownCharacter`] on the first character outside
    /// the vocabulary.
    pub fn encode(&self, text: &str) -> Result<Vec<usize>> {
        text.chars()
            .map(|c| {
                self.char_to_index(c)
                    .ok_or(CharRnnError::UnknownCharacter(c))
            })
            .collect()
    }

    /// Decode indices back into text
    ///
    /// # Panics
    ///
    /// If any index is `>= vocab_size()`. Indices produced by [`encode`]
    /// or by sampling are always in range.
    ///
    /// [`encode`]: CharVocab::encode
    pub fn decode(&self, ids: &[usize]) -> String {
        ids.iter()
            .map(|&i| match self.index_to_char(i) {
                Some(c) => c,
                None => panic!(
                    "index {} outside vocabulary of size {}",
                    i,
                    self.vocab_size()
                ),
            })
            .collect()
    }

    /// Characters in index order
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// Save the vocabulary as JSON (a list of characters in index order)
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a vocabulary saved by [`CharVocab::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Summary statistics for display
    pub fn stats(&self) -> VocabStats {
        VocabStats {
            vocab_size: self.chars.len(),
            alphabetic: self.chars.iter().filter(|c| c.is_alphabetic()).count(),
            whitespace: self.chars.iter().filter(|c| c.is_whitespace()).count(),
            non_ascii: self.chars.iter().filter(|c| !c.is_ascii()).count(),
        }
    }
}

impl TryFrom<Vec<char>> for CharVocab {
    type Error = CharRnnError;

    /// Rebuild a vocabulary from its characters in index order
    ///
    /// A repeated character would map two indices to one character, so it is
    /// rejected as [`CharRnnError::InvalidCheckpoint`].
    fn try_from(chars: Vec<char>) -> Result<Self> {
        let vocab = Self::from_distinct(chars);
        if vocab.index.len() != vocab.chars.len() {
            let mut seen = HashSet::new();
            let dup = vocab.chars.iter().find(|c| !seen.insert(**c));
            return Err(CharRnnError::InvalidCheckpoint(format!(
                "duplicate character {:?} in vocabulary",
                dup.copied().unwrap_or_default()
            )));
        }
        Ok(vocab)
    }
}

impl From<CharVocab> for Vec<char> {
    fn from(vocab: CharVocab) -> Self {
        vocab.chars
    }
}

/// Vocabulary composition, for the training banner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VocabStats {
    pub vocab_size: usize,
    pub alphabetic: usize,
    pub whitespace: usize,
    pub non_ascii: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_empty_fails() {
        assert!(matches!(CharVocab::build(""), Err(CharRnnError::EmptyCorpus)));
    }

    #[test]
    fn test_abab_indices() {
        let vocab = CharVocab::build("abab").unwrap();
        assert_eq!(vocab.vocab_size(), 2);
        assert_eq!(vocab.encode("abab").unwrap(), vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_char_index_roundtrip_covers_corpus() {
        let corpus = "The cat sat on the mat.\nLe chat était là, 日本語!";
        let vocab = CharVocab::build(corpus).unwrap();

        for c in corpus.chars() {
            let i = vocab.char_to_index(c).unwrap();
            assert!(i < vocab.vocab_size());
            assert_eq!(vocab.index_to_char(i), Some(c));
        }

        let distinct: BTreeSet<char> = corpus.chars().collect();
        assert_eq!(vocab.vocab_size(), distinct.len());
        assert_eq!(vocab.index.len(), vocab.vocab_size());
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let corpus = "hello world\n\ttabs";
        let vocab = CharVocab::build(corpus).unwrap();
        let ids = vocab.encode(corpus).unwrap();
        assert_eq!(vocab.decode(&ids), corpus);
    }

    #[test]
    fn test_unknown_character() {
        let vocab = CharVocab::build("abc").unwrap();
        assert!(matches!(
            vocab.encode("abz"),
            Err(CharRnnError::UnknownCharacter('z'))
        ));
    }

    #[test]
    #[should_panic(expected = "outside vocabulary")]
    fn test_decode_out_of_range_panics() {
        let vocab = CharVocab::build("ab").unwrap();
        vocab.decode(&[0, 7, 1]);
    }

    #[test]
    fn test_duplicate_characters_rejected() {
        assert!(serde_json::from_str::<CharVocab>(r#"["a","a","b"]"#).is_err());
        match CharVocab::try_from(vec!['a', 'b', 'a']) {
            Err(CharRnnError::InvalidCheckpoint(msg)) => assert!(msg.contains("'a'")),
            other => panic!("expected InvalidCheckpoint, got {:?}", other),
        }
        assert_eq!(
            CharVocab::try_from(vec!['b', 'a']).unwrap().char_to_index('a'),
            Some(1)
        );
    }

    #[test]
    fn test_json_roundtrip() {
        let vocab = CharVocab::build("a cat, \"quoted\"\n").unwrap();
        let json = serde_json::to_string(&vocab).unwrap();
        let restored: CharVocab = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, vocab);
        assert_eq!(restored.char_to_index('c'), vocab.char_to_index('c'));
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.json");
        let vocab = CharVocab::build("meow").unwrap();
        vocab.save(&path).unwrap();
        assert_eq!(CharVocab::load(&path).unwrap(), vocab);
    }

    #[test]
    fn test_stats() {
        let vocab = CharVocab::build("ab c\né").unwrap();
        let stats = vocab.stats();
        assert_eq!(stats.vocab_size, 6);
        assert_eq!(stats.alphabetic, 4);
        assert_eq!(stats.whitespace, 2);
        assert_eq!(stats.non_ascii, 1);
    }
}
