//! char-rnn: A Character-Level Vanilla RNN
//!
//! A minimal recurrent language model implemented from scratch in Rust. It
//! reads a text one character at a time, learns to predict the next one with
//! truncated backpropagation through time and Adagrad, and generates text by
//! greedily feeding its own predictions back in.
//!
//! # Modules
//!
//! - [`tensor`] - Flat `f32` tensors and matrix-vector kernels
//! - [`vocab`] - Character ↔ index vocabulary
//! - [`model`] - The five RNN parameters and their initialization
//! - [`rnn`] - Forward/backward pass over a window, and greedy sampling
//! - [`gradients`] - Element-wise gradient clipping
//! - [`optimizer`] - Adagrad
//! - [`train`] - The training loop and the hidden-size sweep
//! - [`score`] - Edit distance between samples and the corpus
//! - [`training_logger`] - CSV and console logging of sampling checkpoints
//! - [`checkpoint`] - Binary save/load of a trained model
//!
//! # Example
//!
//! ```rust,no_run
//! use char_rnn::{Trainer, TrainingConfig};
//!
//! let text = std::fs::read_to_string("cat.txt")?;
//! let mut trainer = Trainer::new(&text, TrainingConfig::default())?;
//! let report = trainer.train()?;
//!
//! if let Some(sample) = report.last_sample {
//!     println!("{} (score {})", sample.text, sample.score);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod checkpoint;
pub mod error;
pub mod gradients;
pub mod model;
pub mod optimizer;
pub mod rnn;
pub mod score;
pub mod tensor;
pub mod train;
pub mod training_logger;
pub mod vocab;

// Re-export main types for convenience
pub use checkpoint::{Checkpoint, CheckpointMetadata};
pub use error::{CharRnnError, Result};
pub use model::{ParameterSet, RnnConfig};
pub use optimizer::{adagrad_update, Adagrad};
pub use rnn::{evaluate, sample, RnnGradients, WindowResult};
pub use tensor::Tensor;
pub use train::{
    sweep_hidden_sizes, SampleRecord, SweepReport, Trainer, TrainingConfig, TrainingReport,
    WindowCursor,
};
pub use training_logger::TrainingLogger;
pub use vocab::{CharVocab, VocabStats};
