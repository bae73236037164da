//! Vanilla RNN Parameters
//!
//! The model is a single recurrent layer over one-hot characters:
//!
//! ```text
//! x[t]  one-hot [vocab_size]
//!   ↓ Wxh [hidden_size, vocab_size]
//! h[t] = tanh(Wxh · x[t] + Whh · h[t-1] + bh)      ← Whh [hidden_size, hidden_size]
//!   ↓ Why [vocab_size, hidden_size]
//! y[t] = Why · h[t] + by                            (logits)
//! p[t] = softmax(y[t])                              (next-character distribution)
//! ```
//!
//! ## Initialization
//!
//! Weight matrices are drawn from a standard normal distribution and scaled by
//! 0.01. Small weights keep `tanh` in its linear region and the initial
//! predictions close to uniform. Biases start at zero.
//!
//! ## Parameter Count
//!
//! ```text
//! total = H·V + H·H + V·H + H + V
//! ```
//!
//! With `H = 100` hidden units and a 30-character vocabulary that is 16,130
//! parameters.

use crate::error::{CharRnnError, Result};
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Scale applied to standard-normal weight samples
pub const INIT_SCALE: f32 = 0.01;

/// Model dimensions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RnnConfig {
    pub hidden_size: usize,
    pub vocab_size: usize,
}

impl RnnConfig {
    pub fn new(hidden_size: usize, vocab_size: usize) -> Result<Self> {
        if hidden_size == 0 {
            return Err(CharRnnError::invalid("hidden_size", hidden_size));
        }
        if vocab_size == 0 {
            return Err(CharRnnError::invalid("vocab_size", vocab_size));
        }
        Ok(Self {
            hidden_size,
            vocab_size,
        })
    }
}

/// The five trainable tensors of the RNN
///
/// All fields are public so the optimizer can update them in place.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSet {
    /// Input to hidden [hidden_size, vocab_size]
    pub wxh: Tensor,
    /// Hidden to hidden [hidden_size, hidden_size]
    pub whh: Tensor,
    /// Hidden to output [vocab_size, hidden_size]
    pub why: Tensor,
    /// Hidden bias [hidden_size]
    pub bh: Tensor,
    /// Output bias [vocab_size]
    pub by: Tensor,
}

impl ParameterSet {
    /// Randomly initialize a parameter set
    ///
    /// Each weight is `0.01 · N(0, 1)`, drawn from a `StdRng` seeded with
    /// `seed`, so the same seed always produces the same network. Biases are
    /// zero.
    ///
    /// # Errors
    ///
    /// [`CharRnnError::InvalidHyperparameter`] if either dimension is zero.
    ///
    /// # Example
    ///
    /// ```rust
    /// use char_rnn::ParameterSet;
    ///
    /// let params = ParameterSet::initialize(8, 4, 42).unwrap();
    /// assert_eq!(params.wxh.shape, vec![8, 4]);
    /// assert_eq!(params.why.shape, vec![4, 8]);
    /// assert!(params.bh.data.iter().all(|&b| b == 0.0));
    /// ```
    pub fn initialize(hidden_size: usize, vocab_size: usize, seed: u64) -> Result<Self> {
        let config = RnnConfig::new(hidden_size, vocab_size)?;
        let mut rng = StdRng::seed_from_u64(seed);

        let mut random_matrix = |rows: usize, cols: usize| -> Tensor {
            let data = (0..rows * cols)
                .map(|_| rng.sample::<f32, _>(StandardNormal) * INIT_SCALE)
                .collect();
            Tensor::new(data, vec![rows, cols])
        };

        let wxh = random_matrix(config.hidden_size, config.vocab_size);
        let whh = random_matrix(config.hidden_size, config.hidden_size);
        let why = random_matrix(config.vocab_size, config.hidden_size);

        Ok(Self {
            wxh,
            whh,
            why,
            bh: Tensor::zeros(vec![config.hidden_size]),
            by: Tensor::zeros(vec![config.vocab_size]),
        })
    }

    /// All-zero parameters: every prediction is the uniform distribution
    pub fn zeros(hidden_size: usize, vocab_size: usize) -> Self {
        Self {
            wxh: Tensor::zeros(vec![hidden_size, vocab_size]),
            whh: Tensor::zeros(vec![hidden_size, hidden_size]),
            why: Tensor::zeros(vec![vocab_size, hidden_size]),
            bh: Tensor::zeros(vec![hidden_size]),
            by: Tensor::zeros(vec![vocab_size]),
        }
    }

    pub fn hidden_size(&self) -> usize {
        self.bh.data.len()
    }

    pub fn vocab_size(&self) -> usize {
        self.by.data.len()
    }

    pub fn config(&self) -> RnnConfig {
        RnnConfig {
            hidden_size: self.hidden_size(),
            vocab_size: self.vocab_size(),
        }
    }

    /// Total number of trainable scalars
    pub fn num_parameters(&self) -> usize {
        self.tensors().iter().map(|t| t.data.len()).sum()
    }

    /// The five tensors in canonical order: Wxh, Whh, Why, bh, by
    pub fn tensors(&self) -> [&Tensor; 5] {
        [&self.wxh, &self.whh, &self.why, &self.bh, &self.by]
    }

    /// Mutable access in the same order as [`ParameterSet::tensors`]
    pub fn tensors_mut(&mut self) -> [&mut Tensor; 5] {
        [
            &mut self.wxh,
            &mut self.whh,
            &mut self.why,
            &mut self.bh,
            &mut self.by,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes() {
        let params = ParameterSet::initialize(5, 3, 1).unwrap();
        assert_eq!(params.wxh.shape, vec![5, 3]);
        assert_eq!(params.whh.shape, vec![5, 5]);
        assert_eq!(params.why.shape, vec![3, 5]);
        assert_eq!(params.bh.shape, vec![5]);
        assert_eq!(params.by.shape, vec![3]);
        assert_eq!(params.num_parameters(), 15 + 25 + 15 + 5 + 3);
    }

    #[test]
    fn test_initialization_is_small_and_seeded() {
        let a = ParameterSet::initialize(50, 20, 7).unwrap();
        let b = ParameterSet::initialize(50, 20, 7).unwrap();
        let c = ParameterSet::initialize(50, 20, 8).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.wxh, c.wxh);

        // 0.01 · N(0,1): 6 sigma is 0.06
        for t in [&a.wxh, &a.whh, &a.why] {
            assert!(t.max_abs() < 0.06);
            assert!(t.data.iter().any(|&w| w != 0.0));
        }
        assert!(a.bh.data.iter().chain(&a.by.data).all(|&b| b == 0.0));
    }

    #[test]
    fn test_initialization_statistics() {
        let params = ParameterSet::initialize(100, 100, 3).unwrap();
        let n = params.wxh.data.len() as f32;
        let mean = params.wxh.data.iter().sum::<f32>() / n;
        let var = params.wxh.data.iter().map(|w| (w - mean).powi(2)).sum::<f32>() / n;
        assert!(mean.abs() < 1e-3);
        assert!((var.sqrt() - INIT_SCALE).abs() < 1e-3);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(
            ParameterSet::initialize(0, 3, 1),
            Err(CharRnnError::InvalidHyperparameter { name: "hidden_size", .. })
        ));
        assert!(matches!(
            ParameterSet::initialize(3, 0, 1),
            Err(CharRnnError::InvalidHyperparameter { name: "vocab_size", .. })
        ));
    }
}
