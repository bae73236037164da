//! Training Loop
//!
//! Truncated BPTT over the corpus, one window of `seq_length` characters at a
//! time, with Adagrad updates after every window.
//!
//! ## How Windows Are Generated
//!
//! A cursor `p` sweeps the corpus left to right in steps of `seq_length`.
//! Windows do not overlap; targets are the inputs shifted by one:
//!
//! ```text
//! Corpus: "the cat sat" (len 11), seq_length 4
//!
//! p = 0:  input "the "  target "he c"
//! p = 4:  input "cat "  target "at s"
//! p = 8:  8 + 4 + 1 >= 11  → epoch boundary, back to p = 0
//! ```
//!
//! The boundary test `p + seq_length + 1 >= len` also fires when exactly one
//! full window would still fit, so the last few characters of the corpus can
//! go untrained every epoch.
//!
//! ## The Two Transitions
//!
//! Each iteration of [`Trainer::train`] is:
//!
//! 1. **`begin_epoch`** (only when [`epoch_start_due`]): zero the hidden state,
//!    rewind `p`, sample and score the model every `sample_every` epochs, then
//!    bump the epoch counter.
//! 2. **`step`**: evaluate the window at `p` with the carried hidden state,
//!    update the smoothed loss, apply Adagrad, advance `p`.
//!
//! The loop runs while `epoch < num_epochs` and the epoch counter is bumped at
//! the *start* of an epoch, so the final epoch trains a single window.
//!
//! ## Example
//!
//! ```rust,no_run
//! use char_rnn::{Trainer, TrainingConfig};
//!
//! let text = std::fs::read_to_string("cat.txt")?;
//! let config = TrainingConfig {
//!     hidden_size: 100,
//!     seq_length: 25,
//!     num_epochs: 100,
//!     learning_rate: 0.1,
//!     ..TrainingConfig::default()
//! };
//!
//! let mut trainer = Trainer::new(&text, config)?;
//! let report = trainer.train()?;
//! println!("best score: {:?}", report.best_score);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::checkpoint::{Checkpoint, CheckpointMetadata};
use crate::error::{CharRnnError, Result};
use crate::model::ParameterSet;
use crate::optimizer::{adagrad_update, Adagrad};
use crate::rnn::{evaluate, sample};
use crate::score::edit_distance;
use crate::training_logger::{print_checkpoint, TrainingLogger};
use crate::vocab::CharVocab;
use std::ops::Range;

/// Smoothed loss decay per window
const LOSS_SMOOTHING: f32 = 0.999;
/// Weight of the newest window's loss; not `1.0 - LOSS_SMOOTHING`, which
/// rounds to 0.000999987 in f32
const LOSS_WEIGHT: f32 = 0.001;

/// Training hyperparameters
///
/// The first four are the model's hyperparameters; the rest control
/// reproducibility and how often the model is sampled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrainingConfig {
    /// Hidden units
    pub hidden_size: usize,
    /// Characters per window (BPTT truncation length)
    pub seq_length: usize,
    /// Epochs to start before stopping
    pub num_epochs: usize,
    /// Adagrad learning rate
    pub learning_rate: f32,
    /// Seed for weight initialization
    pub seed: u64,
    /// Sample and score the model every N epochs
    pub sample_every: usize,
    /// Characters generated per sample
    pub sample_length: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            hidden_size: 100,
            seq_length: 25,
            num_epochs: 100,
            learning_rate: 0.1,
            seed: 42,
            sample_every: 10,
            sample_length: 100,
        }
    }
}

impl TrainingConfig {
    /// Create a tiny configuration for quick experiments
    ///
    /// Small enough to train to convergence on a sentence in well under a
    /// second.
    pub fn tiny() -> Self {
        Self {
            hidden_size: 16,
            seq_length: 5,
            num_epochs: 50,
            learning_rate: 0.1,
            ..Self::default()
        }
    }

    /// Check every hyperparameter
    ///
    /// # Errors
    ///
    /// [`CharRnnError::InvalidHyperparameter`] naming the first field that is
    /// zero (or, for the learning rate, non-positive or non-finite).
    pub fn validate(&self) -> Result<()> {
        let counts = [
            ("hidden_size", self.hidden_size),
            ("seq_length", self.seq_length),
            ("num_epochs", self.num_epochs),
            ("sample_every", self.sample_every),
            ("sample_length", self.sample_length),
        ];
        if let Some(&(name, value)) = counts.iter().find(|(_, v)| *v == 0) {
            return Err(CharRnnError::invalid(name, value));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(CharRnnError::invalid("learning_rate", self.learning_rate));
        }
        Ok(())
    }
}

/// True when the next iteration must start a new epoch
///
/// Either nothing has been trained yet, or the window at `p` would reach the
/// last character of the corpus.
pub fn epoch_start_due(p: usize, n: usize, seq_length: usize, corpus_len: usize) -> bool {
    n == 0 || p + seq_length + 1 >= corpus_len
}

/// Position of the training loop in the corpus
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowCursor {
    /// Start of the next window
    pub p: usize,
    /// Windows trained so far
    pub n: usize,
    /// Epochs started so far
    pub epoch: usize,
    seq_length: usize,
    corpus_len: usize,
}

impl WindowCursor {
    pub fn new(seq_length: usize, corpus_len: usize) -> Self {
        Self {
            p: 0,
            n: 0,
            epoch: 0,
            seq_length,
            corpus_len,
        }
    }

    pub fn epoch_start_due(&self) -> bool {
        epoch_start_due(self.p, self.n, self.seq_length, self.corpus_len)
    }

    /// Rewind to the start of the corpus and bump the epoch counter
    ///
    /// Returns the epoch counter *before* the bump, which is what decides
    /// whether this boundary samples the model.
    pub fn begin_epoch(&mut self) -> usize {
        self.p = 0;
        let completed = self.epoch;
        self.epoch += 1;
        completed
    }

    /// Input and target ranges of the window at `p`
    pub fn window(&self) -> (Range<usize>, Range<usize>) {
        (
            self.p..self.p + self.seq_length,
            self.p + 1..self.p + self.seq_length + 1,
        )
    }

    /// Move past the current window
    pub fn advance(&mut self) {
        self.p += self.seq_length;
        self.n += 1;
    }
}

/// One sample-and-score checkpoint
#[derive(Clone, Debug, PartialEq)]
pub struct SampleRecord {
    pub epoch: usize,
    pub iteration: usize,
    pub smooth_loss: f32,
    pub text: String,
    pub score: usize,
}

/// Outcome of a training run
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingReport {
    pub hidden_size: usize,
    /// Lowest edit distance over all checkpoints, `None` if none ran
    pub best_score: Option<usize>,
    pub smooth_loss: f32,
    pub iterations: usize,
    pub epochs: usize,
    pub last_sample: Option<SampleRecord>,
}

/// Owns everything a training run touches
///
/// The corpus, vocabulary, parameters, Adagrad state, hidden state and cursor
/// live here and are threaded explicitly into [`evaluate`] and [`sample`].
pub struct Trainer {
    config: TrainingConfig,
    text: String,
    vocab: CharVocab,
    data: Vec<usize>,
    params: ParameterSet,
    optimizer: Adagrad,
    hidden: Vec<f32>,
    cursor: WindowCursor,
    smooth_loss: f32,
    best_score: Option<usize>,
    /// First input of the most recent window: the sampling seed
    last_seed: Option<usize>,
    last_sample: Option<SampleRecord>,
    logger: Option<TrainingLogger>,
}

impl Trainer {
    /// Validate the configuration, build the vocabulary and initialize the
    /// model
    ///
    /// # Errors
    ///
    /// - [`CharRnnError::InvalidHyperparameter`] from [`TrainingConfig::validate`]
    /// - [`CharRnnError::EmptyCorpus`] for empty text
    /// - [`CharRnnError::CorpusTooShort`] if the text cannot fill one window
    pub fn new(text: &str, config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        let vocab = CharVocab::build(text)?;
        let data = vocab.encode(text)?;

        let required = config.seq_length + 1;
        if data.len() < required {
            return Err(CharRnnError::CorpusTooShort {
                len: data.len(),
                required,
            });
        }

        let params = ParameterSet::initialize(config.hidden_size, vocab.vocab_size(), config.seed)?;
        let optimizer = Adagrad::new(&params);
        // Loss of a uniform prediction over the vocabulary
        let smooth_loss = (vocab.vocab_size() as f32).ln() * config.seq_length as f32;

        Ok(Self {
            cursor: WindowCursor::new(config.seq_length, data.len()),
            hidden: vec![0.0; config.hidden_size],
            config,
            text: text.to_string(),
            vocab,
            data,
            params,
            optimizer,
            smooth_loss,
            best_score: None,
            last_seed: None,
            last_sample: None,
            logger: None,
        })
    }

    /// Send checkpoints to `logger` instead of only the console
    pub fn with_logger(mut self, logger: TrainingLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Run until `num_epochs` epochs have been started
    pub fn train(&mut self) -> Result<TrainingReport> {
        while self.cursor.epoch < self.config.num_epochs {
            if self.cursor.epoch_start_due() {
                self.begin_epoch()?;
            }
            self.step();
        }

        match self.best_score {
            Some(best) => println!("best score: {}", best),
            None => println!("best score: n/a (no sampling checkpoint ran)"),
        }

        Ok(self.report())
    }

    /// Epoch-start transition
    ///
    /// Zeroes the hidden state and rewinds the cursor. Every `sample_every`
    /// epochs (never before the first) the model generates `sample_length`
    /// characters from the fresh hidden state, seeded with the first input of
    /// the last window trained, and the text is scored against the corpus.
    pub fn begin_epoch(&mut self) -> Result<()> {
        self.hidden.iter_mut().for_each(|h| *h = 0.0);
        let epoch = self.cursor.begin_epoch();

        if epoch > 0 && epoch % self.config.sample_every == 0 {
            if let Some(seed) = self.last_seed {
                self.run_checkpoint(epoch, seed)?;
            }
        }
        Ok(())
    }

    fn run_checkpoint(&mut self, epoch: usize, seed: usize) -> Result<()> {
        let ids = sample(&self.hidden, seed, self.config.sample_length, &self.params);
        let text = self.vocab.decode(&ids);
        let score = edit_distance(&self.text, &text);

        self.best_score = Some(self.best_score.map_or(score, |best| best.min(score)));

        match self.logger.as_mut() {
            Some(logger) => logger.log(
                epoch,
                self.cursor.n,
                self.smooth_loss,
                score,
                self.best_score,
                &text,
            )?,
            None => {
                println!("EPOCH {}", epoch);
                print_checkpoint(self.cursor.n, self.smooth_loss, score, &text);
            }
        }

        self.last_sample = Some(SampleRecord {
            epoch,
            iteration: self.cursor.n,
            smooth_loss: self.smooth_loss,
            text,
            score,
        });
        Ok(())
    }

    /// Step transition: train on the window at the cursor
    ///
    /// Returns the window's (unsmoothed) loss.
    ///
    /// # Panics
    ///
    /// Panics if the window at the cursor runs past the end of the corpus,
    /// which cannot happen when [`Trainer::begin_epoch`] runs whenever
    /// [`WindowCursor::epoch_start_due`] says so.
    pub fn step(&mut self) -> f32 {
        let (input_range, target_range) = self.cursor.window();
        let inputs = &self.data[input_range];
        let targets = &self.data[target_range];

        let result = evaluate(inputs, targets, &self.hidden, &self.params);
        self.last_seed = Some(inputs[0]);

        self.smooth_loss = self.smooth_loss * LOSS_SMOOTHING + result.loss * LOSS_WEIGHT;
        adagrad_update(
            &mut self.params,
            &result.grads,
            &mut self.optimizer,
            self.config.learning_rate,
        );
        self.hidden = result.h_last;
        self.cursor.advance();

        result.loss
    }

    pub fn report(&self) -> TrainingReport {
        TrainingReport {
            hidden_size: self.config.hidden_size,
            best_score: self.best_score,
            smooth_loss: self.smooth_loss,
            iterations: self.cursor.n,
            epochs: self.cursor.epoch,
            last_sample: self.last_sample.clone(),
        }
    }

    /// Snapshot of the parameters, Adagrad state and vocabulary
    pub fn to_checkpoint(&self) -> Checkpoint {
        Checkpoint {
            params: self.params.clone(),
            optimizer: self.optimizer.clone(),
            vocab: self.vocab.clone(),
            metadata: CheckpointMetadata {
                iterations: self.cursor.n,
                epochs: self.cursor.epoch,
                smooth_loss: self.smooth_loss,
                best_score: self.best_score,
            },
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn vocab(&self) -> &CharVocab {
        &self.vocab
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn optimizer(&self) -> &Adagrad {
        &self.optimizer
    }

    pub fn hidden(&self) -> &[f32] {
        &self.hidden
    }

    pub fn cursor(&self) -> &WindowCursor {
        &self.cursor
    }

    pub fn smooth_loss(&self) -> f32 {
        self.smooth_loss
    }

    pub fn best_score(&self) -> Option<usize> {
        self.best_score
    }
}

/// Result of [`sweep_hidden_sizes`]
#[derive(Clone, Debug, PartialEq)]
pub struct SweepReport {
    /// One report per hidden size, in the order tried
    pub reports: Vec<TrainingReport>,
    /// Hidden size with the lowest best score (first one on ties)
    pub best_hidden_size: Option<usize>,
    pub best_score: Option<usize>,
}

/// Train one fresh model per hidden size and keep the best
///
/// Every run uses `base` with only `hidden_size` replaced, so the seed and
/// the rest of the schedule are shared.
///
/// # Example
///
/// ```rust,no_run
/// use char_rnn::{sweep_hidden_sizes, TrainingConfig};
///
/// let text = std::fs::read_to_string("cat.txt")?;
/// let sweep = sweep_hidden_sizes(&text, TrainingConfig::default(), &[50, 100, 150])?;
/// println!("{:?} {:?}", sweep.best_score, sweep.best_hidden_size);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn sweep_hidden_sizes(
    text: &str,
    base: TrainingConfig,
    hidden_sizes: &[usize],
) -> Result<SweepReport> {
    let mut reports = Vec::with_capacity(hidden_sizes.len());
    let mut best: Option<(usize, usize)> = None;

    for &hidden_size in hidden_sizes {
        println!("--- hidden: {}", hidden_size);
        let config = TrainingConfig {
            hidden_size,
            ..base
        };
        let report = Trainer::new(text, config)?.train()?;

        if let Some(score) = report.best_score {
            let improves = match best {
                Some((_, best_score)) => score < best_score,
                None => true,
            };
            if improves {
                best = Some((hidden_size, score));
            }
        }
        reports.push(report);
    }

    Ok(SweepReport {
        reports,
        best_hidden_size: best.map(|(h, _)| h),
        best_score: best.map(|(_, s)| s),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(seq_length: usize, num_epochs: usize) -> TrainingConfig {
        TrainingConfig {
            hidden_size: 8,
            seq_length,
            num_epochs,
            learning_rate: 0.1,
            seed: 42,
            sample_every: 10,
            sample_length: 20,
        }
    }

    #[test]
    fn test_epoch_start_due() {
        assert!(epoch_start_due(0, 0, 5, 12));
        assert!(!epoch_start_due(5, 1, 5, 12));
        assert!(epoch_start_due(10, 2, 5, 12));
        // Exactly one window would still fit, but the boundary fires anyway
        assert!(epoch_start_due(6, 3, 5, 12));
    }

    #[test]
    fn test_cursor_window_starts() {
        let mut cursor = WindowCursor::new(5, 12);
        let mut starts = Vec::new();
        let mut boundaries = Vec::new();

        for _ in 0..6 {
            if cursor.epoch_start_due() {
                boundaries.push(cursor.n);
                cursor.begin_epoch();
            }
            starts.push(cursor.p);
            let (inputs, targets) = cursor.window();
            assert_eq!(inputs.len(), 5);
            assert_eq!(targets.len(), 5);
            assert!(targets.end <= 12);
            cursor.advance();
        }

        assert_eq!(starts, vec![0, 5, 0, 5, 0, 5]);
        assert_eq!(boundaries, vec![0, 2, 4]);
        assert_eq!(cursor.epoch, 3);
    }

    #[test]
    fn test_last_epoch_trains_one_window() {
        let text = "abcdefghijkl"; // len 12
        let mut trainer = Trainer::new(text, config(5, 3)).unwrap();
        let report = trainer.train().unwrap();

        // Epochs 1 and 2 train two windows each, epoch 3 only one
        assert_eq!(report.iterations, 5);
        assert_eq!(report.epochs, 3);
        assert_eq!(trainer.cursor().p, 5);
        assert_eq!(report.best_score, None);
        assert!(report.last_sample.is_none());
    }

    #[test]
    fn test_windows_valid() {
        let text = "the quick brown fox jumps over the lazy dog";
        let trainer = Trainer::new(text, config(7, 1)).unwrap();
        let mut cursor = WindowCursor::new(7, trainer.data.len());
        let vocab_size = trainer.vocab().vocab_size();

        for _ in 0..20 {
            if cursor.epoch_start_due() {
                cursor.begin_epoch();
            }
            let (inputs, targets) = cursor.window();
            let inputs = &trainer.data[inputs];
            let targets = &trainer.data[targets];
            assert_eq!(inputs.len(), 7);
            assert_eq!(targets.len(), 7);
            assert_eq!(&inputs[1..], &targets[..6]);
            assert!(inputs.iter().chain(targets).all(|&i| i < vocab_size));
            cursor.advance();
        }
    }

    #[test]
    fn test_checkpoints_and_best_score() {
        let text = "abcdefghijkl";
        let cfg = TrainingConfig {
            sample_every: 1,
            ..config(5, 4)
        };
        let mut trainer = Trainer::new(text, cfg).unwrap();
        let report = trainer.train().unwrap();

        // Checkpoints at epochs 1, 2 and 3
        let last = report.last_sample.unwrap();
        assert_eq!(last.epoch, 3);
        assert_eq!(last.text.chars().count(), 20);
        assert_eq!(last.score, edit_distance(text, &last.text));
        assert!(report.best_score.unwrap() <= last.score);
    }

    #[test]
    fn test_sample_seed_is_previous_window_start() {
        let text = "abcdefghijkl";
        let mut trainer = Trainer::new(text, config(5, 10)).unwrap();
        trainer.begin_epoch().unwrap();
        trainer.step();
        trainer.step();
        // Second window started at p = 5: 'f'
        assert_eq!(trainer.last_seed, trainer.vocab().char_to_index('f'));
        assert!(trainer.cursor().epoch_start_due());
    }

    #[test]
    fn test_hidden_reset_at_epoch_start() {
        let mut trainer = Trainer::new("abcdefghijkl", config(5, 10)).unwrap();
        trainer.begin_epoch().unwrap();
        trainer.step();
        assert!(trainer.hidden().iter().any(|&h| h != 0.0));
        trainer.begin_epoch().unwrap();
        assert!(trainer.hidden().iter().all(|&h| h == 0.0));
        assert_eq!(trainer.cursor().p, 0);
    }

    #[test]
    fn test_smooth_loss_seed() {
        let trainer = Trainer::new("abcd", config(2, 1)).unwrap();
        let expected = -(1.0f32 / 4.0).ln() * 2.0;
        assert!((trainer.smooth_loss() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_smooth_loss_update_weights() {
        let mut trainer = Trainer::new("abcdefgh", config(3, 1)).unwrap();
        let seed = trainer.smooth_loss();
        trainer.begin_epoch().unwrap();
        let loss = trainer.step();

        assert_eq!(trainer.smooth_loss(), seed * 0.999 + loss * 0.001);
        assert_ne!(0.001f32, 1.0 - 0.999f32);
    }

    #[test]
    fn test_loss_decreases_on_repetitive_corpus() {
        let text = "abc".repeat(20);
        let mut trainer = Trainer::new(&text, TrainingConfig::tiny()).unwrap();

        let data = trainer.vocab().encode(&text).unwrap();
        let h0 = vec![0.0; 16];
        let before = evaluate(&data[0..5], &data[1..6], &h0, trainer.params()).loss;

        trainer.train().unwrap();

        let after = evaluate(&data[0..5], &data[1..6], &h0, trainer.params()).loss;
        assert!(after < before * 0.5, "loss {} -> {}", before, after);
        assert!(trainer.smooth_loss() < before);
    }

    #[test]
    fn test_validate_rejects_each_field() {
        let base = TrainingConfig::default();
        assert!(base.validate().is_ok());

        let cases = [
            ("hidden_size", TrainingConfig { hidden_size: 0, ..base }),
            ("seq_length", TrainingConfig { seq_length: 0, ..base }),
            ("num_epochs", TrainingConfig { num_epochs: 0, ..base }),
            ("sample_every", TrainingConfig { sample_every: 0, ..base }),
            ("sample_length", TrainingConfig { sample_length: 0, ..base }),
            ("learning_rate", TrainingConfig { learning_rate: 0.0, ..base }),
            ("learning_rate", TrainingConfig { learning_rate: -0.1, ..base }),
            ("learning_rate", TrainingConfig { learning_rate: f32::NAN, ..base }),
        ];
        for (field, cfg) in cases {
            match cfg.validate() {
                Err(CharRnnError::InvalidHyperparameter { name, .. }) => assert_eq!(name, field),
                other => panic!("{}: expected InvalidHyperparameter, got {:?}", field, other),
            }
        }
    }

    #[test]
    fn test_corpus_too_short() {
        assert!(matches!(
            Trainer::new("abc", config(3, 1)),
            Err(CharRnnError::CorpusTooShort { len: 3, required: 4 })
        ));
        assert!(Trainer::new("abcd", config(3, 1)).is_ok());
        assert!(matches!(
            Trainer::new("", config(3, 1)),
            Err(CharRnnError::EmptyCorpus)
        ));
    }

    #[test]
    fn test_minimal_corpus_trains() {
        // len == seq_length + 1: every epoch is a single window
        let mut trainer = Trainer::new("abcd", config(3, 4)).unwrap();
        let report = trainer.train().unwrap();
        assert_eq!(report.iterations, 4);
    }

    #[test]
    fn test_sweep_picks_best() {
        let text = "abcabcabcabc";
        let base = TrainingConfig {
            sample_every: 2,
            sample_length: 12,
            ..config(3, 5)
        };
        let sweep = sweep_hidden_sizes(text, base, &[4, 8]).unwrap();
        assert_eq!(sweep.reports.len(), 2);
        assert_eq!(sweep.reports[0].hidden_size, 4);
        assert_eq!(sweep.reports[1].hidden_size, 8);

        let best = sweep.best_score.unwrap();
        let min = sweep.reports.iter().filter_map(|r| r.best_score).min().unwrap();
        assert_eq!(best, min);
        let winner = sweep.reports.iter().find(|r| r.best_score == Some(min)).unwrap();
        assert_eq!(sweep.best_hidden_size, Some(winner.hidden_size));
    }
}
