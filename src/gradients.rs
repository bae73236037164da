//! Gradient Utilities
//!
//! Utilities for working with the RNN's gradients after a backward pass.
//!
//! ## Components
//!
//! - **Gradient Clipping**: Bound every gradient entry to `[-5, 5]`
//! - **Gradient Norm Computation**: Measure gradient magnitude for monitoring
//!
//! ## Why Clip Recurrent Gradients?
//!
//! Backpropagating through `T` steps multiplies the gradient by `Whhᵀ` (and a
//! tanh derivative) `T` times. When the largest singular value of `Whh`
//! exceeds one, that product grows exponentially with `T`: the exploding
//! gradient problem.
//!
//! Without clipping:
//! ```text
//! Window 1000: loss = 42.1
//! Window 1001: loss = 913.6  (gradient explosion!)
//! Window 1002: loss = NaN
//! ```
//!
//! ## Algorithm
//!
//! Clipping here is element-wise, not by global norm:
//!
//! ```text
//! for every gradient entry g:
//!     g = min(max(g, -5), 5)
//! ```
//!
//! Element-wise clipping changes the direction of the update when it fires,
//! but it is cheap, needs no global reduction, and is what Adagrad expects here:
//! the accumulator then grows by at most 25 per step.

use crate::rnn::RnnGradients;
use rayon::prelude::*;

/// Bound applied to every gradient entry
pub const CLIP_VALUE: f32 = 5.0;

/// Compute the L2 norm of all gradients
///
/// The square root of the sum of every squared gradient value across all
/// five tensors. Only used for monitoring; clipping is element-wise.
///
/// # Example
///
/// ```rust
/// # use char_rnn::{evaluate, ParameterSet};
/// # use char_rnn::gradients::compute_grad_norm;
/// let params = ParameterSet::initialize(8, 3, 1).unwrap();
/// let result = evaluate(&[0, 1, 2], &[1, 2, 0], &[0.0; 8], &params);
/// let norm = compute_grad_norm(&result.grads);
/// assert!(norm > 0.0);
/// ```
pub fn compute_grad_norm(grads: &RnnGradients) -> f32 {
    let sum_sq_parallel = |data: &Vec<f32>| -> f32 { data.par_iter().map(|&val| val * val).sum() };

    grads
        .tensors()
        .iter()
        .map(|t| sum_sq_parallel(&t.data))
        .sum::<f32>()
        .sqrt()
}

/// Clip every gradient entry into `[-max_value, max_value]` in place
///
/// # Arguments
///
/// * `grads` - Gradients to clip (modified in place)
/// * `max_value` - Largest allowed magnitude of a single entry
///
/// # Example
///
/// ```rust
/// # use char_rnn::{ParameterSet, RnnGradients};
/// # use char_rnn::gradients::clip_gradients;
/// let params = ParameterSet::zeros(2, 2);
/// let mut grads = RnnGradients::zeros_like(&params);
/// grads.by.data = vec![100.0, -7.5];
/// clip_gradients(&mut grads, 5.0);
/// assert_eq!(grads.by.data, vec![5.0, -5.0]);
/// ```
pub fn clip_gradients(grads: &mut RnnGradients, max_value: f32) {
    for tensor in grads.tensors_mut() {
        tensor.clamp_(-max_value, max_value);
    }
}
