//! Adagrad Optimizer Implementation
//!
//! Adagrad gives every parameter its own learning rate, shrinking it as that
//! parameter accumulates gradient.
//!
//! ## Algorithm
//!
//! For each parameter θ with gradient g and accumulator m (initially 0):
//!
//! ```text
//! m += g²
//! θ += -lr · g / √(m + ε)
//! ```
//!
//! where:
//! - lr = learning rate (0.1 is a good default for this model)
//! - ε = 1e-8 (numerical stability)
//!
//! The accumulator only ever grows, so the effective step size for a
//! parameter decays like `1/√(number of updates)`. Parameters that see rare
//! but large gradients (characters that appear seldom) keep larger steps
//! than parameters hit on every window.
//!
//! With gradients clipped to `[-5, 5]`, each accumulator grows by at most 25
//! per update.
//!
//! ## Example
//!
//! ```rust
//! use char_rnn::optimizer::{adagrad_update, Adagrad};
//! use char_rnn::{evaluate, ParameterSet};
//!
//! let mut params = ParameterSet::initialize(16, 4, 42).unwrap();
//! let mut optimizer = Adagrad::new(&params);
//!
//! for _ in 0..3 {
//!     let result = evaluate(&[0, 1, 2], &[1, 2, 3], &[0.0; 16], &params);
//!     adagrad_update(&mut params, &result.grads, &mut optimizer, 0.1);
//! }
//! assert_eq!(optimizer.step, 3);
//! ```
//!
//! ## References
//!
//! - Duchi, Hazan & Singer (2011): "Adaptive Subgradient Methods for Online
//!   Learning and Stochastic Optimization"

use crate::model::ParameterSet;
use crate::rnn::RnnGradients;
use crate::tensor::Tensor;
use rayon::prelude::*;

/// Tensors larger than this are updated in parallel
const PARALLEL_UPDATE_THRESHOLD: usize = 1000;

/// Added to the accumulator before the square root
pub const ADAGRAD_EPSILON: f32 = 1e-8;

/// Adagrad optimizer state
///
/// One squared-gradient accumulator per parameter tensor, in the same shape.
#[derive(Clone, Debug, PartialEq)]
pub struct Adagrad {
    pub mem_wxh: Tensor,
    pub mem_whh: Tensor,
    pub mem_why: Tensor,
    pub mem_bh: Tensor,
    pub mem_by: Tensor,

    pub epsilon: f32,
    /// Number of updates applied
    pub step: usize,
}

impl Adagrad {
    /// Create zeroed accumulators matching the shapes of `params`
    pub fn new(params: &ParameterSet) -> Self {
        Self {
            mem_wxh: Tensor::zeros_like(&params.wxh),
            mem_whh: Tensor::zeros_like(&params.whh),
            mem_why: Tensor::zeros_like(&params.why),
            mem_bh: Tensor::zeros_like(&params.bh),
            mem_by: Tensor::zeros_like(&params.by),
            epsilon: ADAGRAD_EPSILON,
            step: 0,
        }
    }

    /// Accumulators in canonical order: Wxh, Whh, Why, bh, by
    pub fn memories(&self) -> [&Tensor; 5] {
        [
            &self.mem_wxh,
            &self.mem_whh,
            &self.mem_why,
            &self.mem_bh,
            &self.mem_by,
        ]
    }
}

/// Apply one Adagrad step to every parameter
///
/// # Arguments
///
/// * `params` - Parameters to update (modified in place)
/// * `grads` - Clipped gradients from [`crate::rnn::evaluate`]
/// * `optimizer` - Accumulators (updated in place)
/// * `lr` - Learning rate
///
/// # Performance
///
/// Tensors with more than 1000 elements are updated with Rayon. Every
/// element is independent, so the result is the same either way.
pub fn adagrad_update(
    params: &mut ParameterSet,
    grads: &RnnGradients,
    optimizer: &mut Adagrad,
    lr: f32,
) {
    optimizer.step += 1;
    let epsilon = optimizer.epsilon;

    macro_rules! adagrad_update_param {
        ($param:expr, $grad:expr, $mem:expr) => {
            if $param.data.len() > PARALLEL_UPDATE_THRESHOLD {
                $param
                    .data
                    .par_iter_mut()
                    .zip($grad.data.par_iter())
                    .zip($mem.data.par_iter_mut())
                    .for_each(|((param_val, &grad_val), mem_val)| {
                        *mem_val += grad_val * grad_val;
                        *param_val += -lr * grad_val / (*mem_val + epsilon).sqrt();
                    });
            } else {
                for i in 0..$param.data.len() {
                    let g = $grad.data[i];
                    $mem.data[i] += g * g;
                    $param.data[i] += -lr * g / ($mem.data[i] + epsilon).sqrt();
                }
            }
        };
    }

    adagrad_update_param!(params.wxh, grads.wxh, optimizer.mem_wxh);
    adagrad_update_param!(params.whh, grads.whh, optimizer.mem_whh);
    adagrad_update_param!(params.why, grads.why, optimizer.mem_why);
    adagrad_update_param!(params.bh, grads.bh, optimizer.mem_bh);
    adagrad_update_param!(params.by, grads.by, optimizer.mem_by);
}
