//! Forward/Backward Pass and Sampling
//!
//! This module implements truncated backpropagation through time (BPTT) for
//! the vanilla RNN in [`crate::model`], plus greedy text generation that
//! reuses the same forward step.
//!
//! ## Forward Pass
//!
//! For each step `t` of a window, in order (each step needs `h[t-1]`):
//!
//! ```text
//! h[t] = tanh(Wxh · x[t] + Whh · h[t-1] + bh)
//! y[t] = Why · h[t] + by
//! p[t] = softmax(y[t])
//! loss += -ln p[t][target[t]]
//! ```
//!
//! Because `x[t]` is one-hot, `Wxh · x[t]` is just column `inputs[t]` of `Wxh`.
//!
//! ## Backward Pass
//!
//! Walking the window in reverse with a running `dh_next` (zero at the end):
//!
//! ```text
//! dy     = p[t] - onehot(target[t])
//! dWhy  += dy ⊗ h[t]          dby += dy
//! dh     = Whyᵀ · dy + dh_next
//! dh_raw = (1 - h[t]²) ⊙ dh
//! dbh   += dh_raw
//! dWxh  += dh_raw ⊗ x[t]      dWhh += dh_raw ⊗ h[t-1]
//! dh_next = Whhᵀ · dh_raw
//! ```
//!
//! The activations of every step are kept in a `Vec<StepCache>` indexed by
//! step; the window's initial hidden state is held separately and plays the
//! role of `h[-1]`.
//!
//! ## Clipping
//!
//! Every gradient entry is clipped to `[-5, 5]` before it is returned
//! (see [`crate::gradients::clip_gradients`]).

use crate::gradients::{clip_gradients, CLIP_VALUE};
use crate::model::ParameterSet;
use crate::tensor::{argmax, softmax, Tensor};

/// Activations of one time step, kept for the backward pass
#[derive(Clone, Debug)]
pub struct StepCache {
    /// Index of the one-hot input character
    pub input: usize,
    /// h[t]
    pub hidden: Vec<f32>,
    /// p[t] = softmax(y[t])
    pub probs: Vec<f32>,
}

/// Gradients for all five parameters, shaped like [`ParameterSet`]
#[derive(Clone, Debug, PartialEq)]
pub struct RnnGradients {
    pub wxh: Tensor,
    pub whh: Tensor,
    pub why: Tensor,
    pub bh: Tensor,
    pub by: Tensor,
}

impl RnnGradients {
    /// Zero gradients matching the shapes of `params`
    pub fn zeros_like(params: &ParameterSet) -> Self {
        Self {
            wxh: Tensor::zeros_like(&params.wxh),
            whh: Tensor::zeros_like(&params.whh),
            why: Tensor::zeros_like(&params.why),
            bh: Tensor::zeros_like(&params.bh),
            by: Tensor::zeros_like(&params.by),
        }
    }

    /// The five gradients in canonical order: Wxh, Whh, Why, bh, by
    pub fn tensors(&self) -> [&Tensor; 5] {
        [&self.wxh, &self.whh, &self.why, &self.bh, &self.by]
    }

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

/// Everything one forward/backward call produces
#[derive(Clone, Debug)]
pub struct WindowResult {
    /// Summed cross-entropy over the window (not averaged)
    pub loss: f32,
    /// Clipped gradients
    pub grads: RnnGradients,
    /// h[T-1], carried into the next window
    pub h_last: Vec<f32>,
}

/// One recurrent step: `tanh(Wxh[:, input] + Whh · h_prev + bh)`
fn hidden_step(params: &ParameterSet, input: usize, h_prev: &[f32]) -> Vec<f32> {
    let recurrent = params.whh.matvec(h_prev);
    params
        .wxh
        .column(input)
        .iter()
        .zip(&recurrent)
        .zip(&params.bh.data)
        .map(|((&x, &h), &b)| (x + h + b).tanh())
        .collect()
}

/// Unnormalized next-character scores: `Why · h + by`
fn output_logits(params: &ParameterSet, hidden: &[f32]) -> Vec<f32> {
    let mut logits = params.why.matvec(hidden);
    for (y, &b) in logits.iter_mut().zip(&params.by.data) {
        *y += b;
    }
    logits
}

/// `-ln softmax(logits)[target]`, computed in log space
fn cross_entropy(logits: &[f32], target: usize) -> f32 {
    let max_logit = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_sum: f32 = logits.iter().map(|&x| (x - max_logit).exp()).sum();
    -((logits[target] - max_logit) - exp_sum.ln())
}

/// Run the forward pass over a window
///
/// Returns the per-step activation records and the summed loss. Pass an
/// empty `targets` slice to skip the loss (it is then 0.0).
pub fn forward(
    params: &ParameterSet,
    inputs: &[usize],
    targets: &[usize],
    h_prev: &[f32],
) -> (Vec<StepCache>, f32) {
    let mut steps: Vec<StepCache> = Vec::with_capacity(inputs.len());
    let mut loss = 0.0;

    for (t, &input) in inputs.iter().enumerate() {
        let prev = steps.last().map_or(h_prev, |s| s.hidden.as_slice());
        let hidden = hidden_step(params, input, prev);
        let logits = output_logits(params, &hidden);

        if let Some(&target) = targets.get(t) {
            loss += cross_entropy(&logits, target);
        }

        steps.push(StepCache {
            input,
            hidden,
            probs: softmax(&logits),
        });
    }

    (steps, loss)
}

/// Loss and clipped gradients for one window
///
/// This is the whole training signal for a step of truncated BPTT: the loss
/// summed over `inputs.len()` predictions, the five clipped gradients, and the
/// last hidden state to seed the next window. `params` is only read.
///
/// # Panics
///
/// Panics on a contract violation: empty window, `inputs`/`targets` length
/// mismatch, an index outside the vocabulary, or `h_prev` of the wrong size.
///
/// # Example
///
/// ```rust
/// use char_rnn::{evaluate, ParameterSet};
///
/// // With all-zero weights every prediction is uniform over 2 characters
/// let params = ParameterSet::zeros(3, 2);
/// let result = evaluate(&[0, 1], &[1, 0], &[0.0; 3], &params);
/// assert!((result.loss - 2.0 * 2f32.ln()).abs() < 1e-5);
/// ```
pub fn evaluate(
    inputs: &[usize],
    targets: &[usize],
    h_prev: &[f32],
    params: &ParameterSet,
) -> WindowResult {
    let vocab_size = params.vocab_size();
    assert!(!inputs.is_empty(), "evaluate called with an empty window");
    assert_eq!(
        inputs.len(),
        targets.len(),
        "window length mismatch: {} inputs vs {} targets",
        inputs.len(),
        targets.len()
    );
    assert_eq!(
        h_prev.len(),
        params.hidden_size(),
        "hidden state has {} units, model has {}",
        h_prev.len(),
        params.hidden_size()
    );
    assert!(
        inputs.iter().chain(targets).all(|&i| i < vocab_size),
        "character index outside vocabulary of size {}",
        vocab_size
    );

    let (mut steps, loss) = forward(params, inputs, targets, h_prev);

    let mut grads = RnnGradients::zeros_like(params);
    let mut dh_next = vec![0.0; params.hidden_size()];

    for t in (0..steps.len()).rev() {
        let step = &steps[t];
        let prev_hidden = if t == 0 { h_prev } else { steps[t - 1].hidden.as_slice() };

        // Softmax + cross-entropy: dL/dy = p - onehot(target)
        let mut dy = step.probs.clone();
        dy[targets[t]] -= 1.0;

        grads.why.add_outer(&dy, &step.hidden);
        grads.by.accumulate(&dy);

        // Backprop into h, then through tanh
        let dh = params.why.matvec_transposed(&dy);
        let dh_raw: Vec<f32> = dh
            .iter()
            .zip(&dh_next)
            .zip(&step.hidden)
            .map(|((&d, &next), &h)| (1.0 - h * h) * (d + next))
            .collect();

        grads.bh.accumulate(&dh_raw);
        grads.wxh.add_to_column(step.input, &dh_raw);
        grads.whh.add_outer(&dh_raw, prev_hidden);

        dh_next = params.whh.matvec_transposed(&dh_raw);
    }

    clip_gradients(&mut grads, CLIP_VALUE);

    let h_last = steps
        .pop()
        .map_or_else(|| h_prev.to_vec(), |last| last.hidden);

    WindowResult {
        loss,
        grads,
        h_last,
    }
}

/// Generate `n` character indices by greedy decoding
///
/// Starting from the one-hot of `seed_index` and hidden state `h`, each step
/// runs the forward computation, picks the most probable next character
/// (arg-max, lowest index on ties) and feeds it back in. The hidden state
/// is carried across all `n` steps. Deterministic: the same arguments always
/// give the same output.
///
/// # Panics
///
/// Panics if `seed_index` is outside the vocabulary or `h` has the wrong size.
pub fn sample(h: &[f32], seed_index: usize, n: usize, params: &ParameterSet) -> Vec<usize> {
    assert!(
        seed_index < params.vocab_size(),
        "seed index {} outside vocabulary of size {}",
        seed_index,
        params.vocab_size()
    );
    assert_eq!(h.len(), params.hidden_size(), "hidden state size mismatch");

    let mut hidden = h.to_vec();
    let mut input = seed_index;
    let mut generated = Vec::with_capacity(n);

    for _ in 0..n {
        hidden = hidden_step(params, input, &hidden);
        let probs = softmax(&output_logits(params, &hidden));
        input = argmax(&probs);
        generated.push(input);
    }

    generated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32, tol: f32) {
        assert!((a - b).abs() <= tol, "{} != {} (tol={})", a, b, tol);
    }

    #[test]
    fn test_abab_zero_weights() {
        // corpus "abab", vocab {a:0, b:1}, seq_length 2
        let params = ParameterSet::zeros(4, 2);
        let result = evaluate(&[0, 1], &[1, 0], &[0.0; 4], &params);

        assert_close(result.loss, 2.0 * 2f32.ln(), 1e-5);

        // dy_0 = [0.5, -0.5], dy_1 = [-0.5, 0.5]
        assert_eq!(result.grads.by.data, vec![0.0, 0.0]);
        // h is zero everywhere, and Why = 0 blocks any signal into h
        for g in result.grads.tensors() {
            assert!(g.data.iter().all(|&x| x == 0.0), "{:?}", g);
        }
        assert_eq!(result.grads.wxh.shape, vec![4, 2]);
        assert_eq!(result.grads.whh.shape, vec![4, 4]);
        assert_eq!(result.h_last, vec![0.0; 4]);
    }

    #[test]
    fn test_uniform_loss_scales_with_window() {
        let params = ParameterSet::zeros(3, 5);
        let inputs = [0, 1, 2, 3, 4, 0, 1];
        let targets = [1, 2, 3, 4, 0, 1, 2];
        let result = evaluate(&inputs, &targets, &[0.0; 3], &params);
        assert_close(result.loss, 7.0 * 5f32.ln(), 1e-4);
    }

    #[test]
    fn test_evaluate_does_not_mutate_params() {
        let params = ParameterSet::initialize(6, 4, 11).unwrap();
        let before = params.clone();
        let _ = evaluate(&[0, 1, 2, 3], &[1, 2, 3, 0], &[0.1; 6], &params);
        assert_eq!(params, before);
    }

    #[test]
    fn test_loss_non_negative_and_hidden_bounded() {
        let params = ParameterSet::initialize(10, 6, 5).unwrap();
        let result = evaluate(&[0, 5, 2, 2, 1], &[5, 2, 2, 1, 3], &[0.0; 10], &params);
        assert!(result.loss >= 0.0);
        assert!(result.h_last.iter().all(|h| h.abs() < 1.0));
    }

    #[test]
    fn test_gradients_clipped_for_large_weights() {
        let mut params = ParameterSet::initialize(8, 4, 2).unwrap();
        for t in params.tensors_mut() {
            t.data.iter_mut().for_each(|w| *w *= 5_000.0);
        }
        params.bh.data.iter_mut().for_each(|b| *b = 30.0);
        params.by.data = vec![900.0, -900.0, 0.0, 50.0];

        let inputs = [0, 1, 2, 3, 0, 1, 2, 3];
        let targets = [1, 2, 3, 0, 1, 2, 3, 1];
        let result = evaluate(&inputs, &targets, &[0.5; 8], &params);

        for g in result.grads.tensors() {
            assert!(g.max_abs() <= CLIP_VALUE);
        }
        assert!(result.loss.is_finite());
    }

    /// Finite-difference check of the analytic gradients
    #[test]
    fn test_gradients_match_numerical() {
        let mut params = ParameterSet::initialize(5, 4, 9).unwrap();
        // Larger weights so the gradients are not vanishingly small
        for t in params.tensors_mut() {
            t.data.iter_mut().for_each(|w| *w *= 30.0);
        }
        let inputs = [0, 2, 1, 3];
        let targets = [2, 1, 3, 0];
        let h0 = vec![0.1, -0.2, 0.05, 0.0, 0.3];

        let analytic = evaluate(&inputs, &targets, &h0, &params).grads;

        let eps = 1e-2;
        for which in 0..5 {
            for idx in [0usize, 3] {
                let original = params.tensors()[which].data[idx];

                params.tensors_mut()[which].data[idx] = original + eps;
                let plus = forward(&params, &inputs, &targets, &h0).1;
                params.tensors_mut()[which].data[idx] = original - eps;
                let minus = forward(&params, &inputs, &targets, &h0).1;
                params.tensors_mut()[which].data[idx] = original;

                let numeric = (plus - minus) / (2.0 * eps);
                let got = analytic.tensors()[which].data[idx];
                assert_close(got, numeric, 2e-2);
            }
        }
    }

    #[test]
    fn test_h_last_threads_into_next_window() {
        let params = ParameterSet::initialize(6, 3, 4).unwrap();
        let h0 = vec![0.0; 6];

        let whole = forward(&params, &[0, 1, 2, 0], &[], &h0).0;
        let first = evaluate(&[0, 1], &[1, 2], &h0, &params);
        let second = forward(&params, &[2, 0], &[], &first.h_last).0;

        assert_eq!(first.h_last, whole[1].hidden);
        assert_eq!(second[1].hidden, whole[3].hidden);
    }

    #[test]
    fn test_sample_is_deterministic() {
        let params = ParameterSet::initialize(12, 7, 21).unwrap();
        let h = vec![0.0; 12];
        let a = sample(&h, 3, 50, &params);
        let b = sample(&h, 3, 50, &params);
        assert_eq!(a, b);
        assert_eq!(a.len(), 50);
        assert!(a.iter().all(|&i| i < 7));
    }

    #[test]
    fn test_sample_zero_length() {
        let params = ParameterSet::initialize(4, 3, 1).unwrap();
        assert!(sample(&[0.0; 4], 0, 0, &params).is_empty());
    }

    #[test]
    fn test_sample_follows_argmax() {
        // Bias the output layer so index 2 always wins
        let mut params = ParameterSet::zeros(3, 4);
        params.by.data = vec![0.0, 0.1, 1.0, 0.2];
        assert_eq!(sample(&[0.0; 3], 0, 5, &params), vec![2; 5]);
    }

    #[test]
    fn test_sample_matches_forward_on_its_own_output() {
        let params = ParameterSet::initialize(8, 5, 13).unwrap();
        let h = vec![0.0; 8];
        let out = sample(&h, 1, 6, &params);

        // Feeding [seed, out[0..5]] through forward reproduces each arg-max
        let mut inputs = vec![1];
        inputs.extend_from_slice(&out[..5]);
        let (steps, _) = forward(&params, &inputs, &[], &h);
        for (step, &expected) in steps.iter().zip(&out) {
            assert_eq!(argmax(&step.probs), expected);
        }
    }

    #[test]
    #[should_panic(expected = "window length mismatch")]
    fn test_mismatched_window_panics() {
        let params = ParameterSet::zeros(2, 2);
        evaluate(&[0, 1], &[1], &[0.0; 2], &params);
    }

    #[test]
    #[should_panic(expected = "outside vocabulary")]
    fn test_out_of_vocab_panics() {
        let params = ParameterSet::zeros(2, 2);
        evaluate(&[0, 2], &[1, 0], &[0.0; 2], &params);
    }
}
