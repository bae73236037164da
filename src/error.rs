//! Error types
//!
//! Configuration problems (empty corpus, bad hyperparameters) and persistence
//! failures are reported through [`CharRnnError`]. Shape mismatches inside the
//! forward/backward pass are contract violations and panic instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CharRnnError {
    #[error("Corpus is empty: cannot build a vocabulary")]
    EmptyCorpus,

    #[error("Invalid hyperparameter `{name}`: {value} (must be positive)")]
    InvalidHyperparameter { name: &'static str, value: String },

    #[error("Corpus too short: {len} characters, need at least {required} for one window")]
    CorpusTooShort { len: usize, required: usize },

    #[error("Character {0:?} is not in the vocabulary")]
    UnknownCharacter(char),

    #[error("Invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CharRnnError>;

impl CharRnnError {
    pub(crate) fn invalid(name: &'static str, value: impl ToString) -> Self {
        Self::InvalidHyperparameter {
            name,
            value: value.to_string(),
        }
    }
}
