//! Tensor Operations for the Recurrent Network
//!
//! A minimal tensor type holding the RNN's weights, biases, gradients and
//! Adagrad memory. Everything the network does reduces to a handful of
//! matrix-vector kernels, so that is all this module provides.
//!
//! ## Core Concepts
//!
//! - **Data**: Flat `Vec<f32>` storing all elements in row-major order
//! - **Shape**: `[rows, cols]` for matrices, `[len]` for vectors
//! - **Strides**: Step sizes for each dimension to compute flat indices
//!
//! ## Example
//!
//! ```rust
//! use char_rnn::Tensor;
//!
//! // A 2x3 matrix times a length-3 vector
//! let w = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
//! let y = w.matvec(&[1.0, 0.0, 1.0]);
//! assert_eq!(y, vec![4.0, 10.0]);
//!
//! // The transpose product never materializes Wᵀ
//! let z = w.matvec_transposed(&[1.0, 1.0]);
//! assert_eq!(z, vec![5.0, 7.0, 9.0]);
//! ```
//!
//! ## Parallelism
//!
//! Matrix-vector products split the *output* across Rayon workers once the
//! matrix is large enough. Each output element is still a sequential sum in
//! index order, so the parallel and serial paths produce bit-identical results.

use rayon::prelude::*;

/// Work threshold (rows × cols) above which kernels run on the Rayon pool
const PARALLEL_THRESHOLD: usize = 4_096;

/// A dense row-major array of `f32`
///
/// # Memory Layout
///
/// For shape `[2, 3]`, data is stored as: `[row0_col0, row0_col1, row0_col2, row1_col0, row1_col1, row1_col2]`
/// with strides `[3, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    /// Flat storage of all tensor elements
    pub data: Vec<f32>,
    /// Shape of the tensor (dimensions)
    pub shape: Vec<usize>,
    /// Strides for each dimension (computed from shape)
    pub strides: Vec<usize>,
}

impl Tensor {
    /// Create a new tensor with given data and shape
    ///
    /// # Panics
    ///
    /// Panics if the product of shape dimensions doesn't equal data length
    ///
    /// # Example
    ///
    /// ```rust
    /// # use char_rnn::Tensor;
    /// let tensor = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
    /// assert_eq!(tensor.shape, vec![2, 2]);
    /// ```
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
        let expected_size: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected_size,
            "Data length ({}) doesn't match shape {:?} (expected {})",
            data.len(),
            shape,
            expected_size
        );

        let strides = Self::compute_strides(&shape);
        Self {
            data,
            shape,
            strides,
        }
    }

    /// Create a tensor filled with zeros
    ///
    /// ```rust
    /// # use char_rnn::Tensor;
    /// let tensor = Tensor::zeros(vec![3, 4]);
    /// assert_eq!(tensor.data.len(), 12);
    /// assert!(tensor.data.iter().all(|&x| x == 0.0));
    /// ```
    pub fn zeros(shape: Vec<usize>) -> Self {
        let size: usize = shape.iter().product();
        Self::new(vec![0.0; size], shape)
    }

    /// Zero tensor with the same shape as `other`
    pub fn zeros_like(other: &Tensor) -> Self {
        Self::zeros(other.shape.clone())
    }

    /// For shape `[d0, d1]`, strides are `[d1, 1]`
    fn compute_strides(shape: &[usize]) -> Vec<usize> {
        let mut strides = vec![1; shape.len()];
        for i in (0..shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * shape[i + 1];
        }
        strides
    }

    /// Number of rows (first dimension)
    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    /// Number of columns; 1 for vectors
    pub fn cols(&self) -> usize {
        if self.shape.len() > 1 {
            self.shape[1]
        } else {
            1
        }
    }

    /// Matrix-vector product `W · x`
    ///
    /// For `W` of shape `[m, k]` and `x` of length `k`, returns a vector of
    /// length `m` with `y[i] = Σ_l W[i,l] · x[l]`.
    ///
    /// # Panics
    ///
    /// Panics if `x.len()` doesn't match the column count
    pub fn matvec(&self, x: &[f32]) -> Vec<f32> {
        let (m, k) = (self.rows(), self.cols());
        assert_eq!(
            x.len(),
            k,
            "matvec shape mismatch: [{}, {}] · [{}]",
            m,
            k,
            x.len()
        );

        let row_dot = |row: &[f32]| -> f32 { row.iter().zip(x).map(|(&w, &v)| w * v).sum() };

        if m * k >= PARALLEL_THRESHOLD {
            self.data.par_chunks(k).map(row_dot).collect()
        } else {
            self.data.chunks(k).map(row_dot).collect()
        }
    }

    /// Transposed matrix-vector product `Wᵀ · v`
    ///
    /// For `W` of shape `[m, k]` and `v` of length `m`, returns a vector of
    /// length `k` with `y[j] = Σ_i W[i,j] · v[i]`. This is what backprop
    /// needs (`Whyᵀ · dy`, `Whhᵀ · dh_raw`) and avoids building `Wᵀ`.
    ///
    /// # Panics
    ///
    /// Panics if `v.len()` doesn't match the row count
    pub fn matvec_transposed(&self, v: &[f32]) -> Vec<f32> {
        let (m, k) = (self.rows(), self.cols());
        assert_eq!(
            v.len(),
            m,
            "matvec_transposed shape mismatch: [{}, {}]ᵀ · [{}]",
            m,
            k,
            v.len()
        );

        let col_dot = |j: usize| -> f32 { (0..m).map(|i| self.data[i * k + j] * v[i]).sum() };

        if m * k >= PARALLEL_THRESHOLD {
            (0..k).into_par_iter().map(col_dot).collect()
        } else {
            (0..k).map(col_dot).collect()
        }
    }

    /// Copy of column `col` of a matrix
    ///
    /// `W · onehot(col)` is exactly this column, so the input projection of a
    /// one-hot character never touches the other `vocab_size - 1` columns.
    pub fn column(&self, col: usize) -> Vec<f32> {
        let k = self.cols();
        assert!(col < k, "column {} out of range for {:?}", col, self.shape);
        (0..self.rows()).map(|i| self.data[i * k + col]).collect()
    }

    /// In-place outer-product accumulation: `self += a ⊗ b`
    ///
    /// `self` must have shape `[a.len(), b.len()]`.
    pub fn add_outer(&mut self, a: &[f32], b: &[f32]) {
        let k = self.cols();
        assert_eq!(
            (self.rows(), k),
            (a.len(), b.len()),
            "add_outer shape mismatch: {:?} += [{}] ⊗ [{}]",
            self.shape,
            a.len(),
            b.len()
        );

        if a.len() * k >= PARALLEL_THRESHOLD {
            self.data
                .par_chunks_mut(k)
                .zip(a.par_iter())
                .for_each(|(row, &a_val)| Self::axpy_row(a_val, b, row));
        } else {
            for (row, &a_val) in self.data.chunks_mut(k).zip(a) {
                Self::axpy_row(a_val, b, row);
            }
        }
    }

    /// `self[:, col] += v`, the outer product with a one-hot vector
    pub fn add_to_column(&mut self, col: usize, v: &[f32]) {
        let k = self.cols();
        assert_eq!(v.len(), self.rows(), "add_to_column length mismatch");
        assert!(col < k, "column {} out of range for {:?}", col, self.shape);
        for (i, &val) in v.iter().enumerate() {
            self.data[i * k + col] += val;
        }
    }

    /// Element-wise in-place accumulation: `self += other`
    pub fn accumulate(&mut self, other: &[f32]) {
        assert_eq!(self.data.len(), other.len(), "accumulate length mismatch");
        for (x, &y) in self.data.iter_mut().zip(other) {
            *x += y;
        }
    }

    /// Clamp every element into `[lo, hi]` in place
    pub fn clamp_(&mut self, lo: f32, hi: f32) {
        if self.data.len() >= PARALLEL_THRESHOLD {
            self.data.par_iter_mut().for_each(|x| *x = x.clamp(lo, hi));
        } else {
            self.data.iter_mut().for_each(|x| *x = x.clamp(lo, hi));
        }
    }

    /// Largest absolute value (0.0 for an empty tensor)
    pub fn max_abs(&self) -> f32 {
        self.data.iter().fold(0.0f32, |m, &x| m.max(x.abs()))
    }

    /// Computes: row[j] += a_val * b[j] for all j
    /// Simple loop that LLVM can auto-vectorize
    #[inline(always)]
    fn axpy_row(a_val: f32, b: &[f32], row: &mut [f32]) {
        for (r, &b_val) in row.iter_mut().zip(b) {
            *r += a_val * b_val;
        }
    }
}

/// Numerically stable softmax of a logit vector
///
/// Subtracts the maximum logit before exponentiating so large logits never
/// overflow; the result is mathematically unchanged.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_values: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exp_values.iter().sum();
    exp_values.into_iter().map(|v| v / sum).collect()
}

/// Index of the largest element; ties resolve to the lowest index
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matvec_matches_manual() {
        let w = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
        assert_eq!(w.matvec(&[1.0, 2.0, 3.0]), vec![14.0, 32.0]);
    }

    #[test]
    fn test_matvec_transposed_matches_manual() {
        let w = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
        assert_eq!(w.matvec_transposed(&[1.0, 2.0]), vec![9.0, 12.0, 15.0]);
    }

    #[test]
    fn test_parallel_path_is_bit_identical() {
        // 100x100 crosses the parallel threshold
        let n = 100;
        let data: Vec<f32> = (0..n * n).map(|i| ((i % 17) as f32 - 8.0) * 0.013).collect();
        let w = Tensor::new(data.clone(), vec![n, n]);
        let x: Vec<f32> = (0..n).map(|i| (i as f32 * 0.7).sin()).collect();

        let parallel = w.matvec(&x);
        let serial: Vec<f32> = data
            .chunks(n)
            .map(|row| row.iter().zip(&x).map(|(&a, &b)| a * b).sum())
            .collect();
        assert_eq!(parallel, serial);
    }

    #[test]
    fn test_column_equals_onehot_product() {
        let w = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
        assert_eq!(w.column(1), w.matvec(&[0.0, 1.0, 0.0]));
    }

    #[test]
    fn test_add_outer_and_column() {
        let mut t = Tensor::zeros(vec![2, 3]);
        t.add_outer(&[1.0, 2.0], &[1.0, 0.0, -1.0]);
        assert_eq!(t.data, vec![1.0, 0.0, -1.0, 2.0, 0.0, -2.0]);

        t.add_to_column(2, &[1.0, 2.0]);
        assert_eq!(t.data, vec![1.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_clamp() {
        let mut t = Tensor::new(vec![-10.0, -1.0, 0.5, 7.0], vec![4]);
        t.clamp_(-5.0, 5.0);
        assert_eq!(t.data, vec![-5.0, -1.0, 0.5, 5.0]);
        assert_eq!(t.max_abs(), 5.0);
    }

    #[test]
    fn test_softmax_sums_to_one_and_is_stable() {
        let p = softmax(&[1000.0, 1000.0]);
        assert!((p[0] - 0.5).abs() < 1e-6);
        assert!((p.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_argmax_first_on_ties() {
        assert_eq!(argmax(&[0.25, 0.5, 0.5, 0.1]), 1);
        assert_eq!(argmax(&[0.5, 0.5]), 0);
    }
}
