//! Minimal gradient tape for the trainable head.
//!
//! The base encoder runs forward-only, so the tape carries exactly the ops
//! the training path exercises: a shared-buffer [`Tensor`] and [`matmul`]
//! with a recorded backward that accumulates gradients into its inputs.

use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

/// A backward operation recorded on the tape.
pub trait BackwardOp {
    /// Propagate the output gradient into the op's inputs.
    fn backward(&self);
}

struct TensorInner {
    data: RefCell<Array1<f32>>,
    grad: Rc<RefCell<Option<Array1<f32>>>>,
    requires_grad: RefCell<bool>,
    backward_op: RefCell<Option<Rc<dyn BackwardOp>>>,
}

/// A 1-D float buffer with an optional gradient.
///
/// Cloning is shallow: clones share data and gradient, so a parameter held
/// by a layer and the same parameter captured by a backward op stay in sync.
/// Matrices are stored flattened row-major; ops take explicit dimensions.
#[derive(Clone)]
pub struct Tensor {
    inner: Rc<TensorInner>,
}

impl Tensor {
    /// Create a tensor from an ndarray buffer.
    pub fn new(data: Array1<f32>, requires_grad: bool) -> Self {
        Self {
            inner: Rc::new(TensorInner {
                data: RefCell::new(data),
                grad: Rc::new(RefCell::new(None)),
                requires_grad: RefCell::new(requires_grad),
                backward_op: RefCell::new(None),
            }),
        }
    }

    /// Create a tensor from a `Vec<f32>`.
    pub fn from_vec(data: Vec<f32>, requires_grad: bool) -> Self {
        Self::new(Array1::from(data), requires_grad)
    }

    /// Zero-filled tensor of length `n`.
    pub fn zeros(n: usize, requires_grad: bool) -> Self {
        Self::new(Array1::zeros(n), requires_grad)
    }

    /// One-filled tensor of length `n`.
    pub fn ones(n: usize, requires_grad: bool) -> Self {
        Self::new(Array1::ones(n), requires_grad)
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.data.borrow().len()
    }

    /// Whether the tensor is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the underlying data.
    pub fn data(&self) -> std::cell::Ref<'_, Array1<f32>> {
        self.inner.data.borrow()
    }

    /// Mutably borrow the underlying data.
    pub fn data_mut(&self) -> std::cell::RefMut<'_, Array1<f32>> {
        self.inner.data.borrow_mut()
    }

    /// Copy of the current gradient, if one has been set or accumulated.
    #[must_use]
    pub fn grad(&self) -> Option<Array1<f32>> {
        self.inner.grad.borrow().clone()
    }

    /// Shared handle to the gradient slot (captured by backward ops).
    #[must_use]
    pub fn grad_cell(&self) -> Rc<RefCell<Option<Array1<f32>>>> {
        Rc::clone(&self.inner.grad)
    }

    /// Overwrite the gradient.
    pub fn set_grad(&self, grad: Array1<f32>) {
        *self.inner.grad.borrow_mut() = Some(grad);
    }

    /// Add into the gradient, initializing it if unset.
    pub fn accumulate_grad(&self, grad: Array1<f32>) {
        let mut slot = self.inner.grad.borrow_mut();
        match slot.as_mut() {
            Some(existing) => *existing += &grad,
            None => *slot = Some(grad),
        }
    }

    /// Clear the gradient.
    pub fn zero_grad(&self) {
        *self.inner.grad.borrow_mut() = None;
    }

    /// Whether this tensor participates in gradient computation.
    #[must_use]
    pub fn requires_grad(&self) -> bool {
        *self.inner.requires_grad.borrow()
    }

    /// Toggle gradient participation.
    pub fn set_requires_grad(&self, requires_grad: bool) {
        *self.inner.requires_grad.borrow_mut() = requires_grad;
    }

    /// The backward op that produced this tensor, if any.
    #[must_use]
    pub fn backward_op(&self) -> Option<Rc<dyn BackwardOp>> {
        self.inner.backward_op.borrow().clone()
    }

    /// Record the backward op that produced this tensor.
    pub fn set_backward_op(&self, op: Rc<dyn BackwardOp>) {
        *self.inner.backward_op.borrow_mut() = Some(op);
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("len", &self.len())
            .field("requires_grad", &self.requires_grad())
            .finish()
    }
}

/// Transpose a row-major `rows x cols` matrix.
#[must_use]
pub fn transpose(data: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = data[r * cols + c];
        }
    }
    out
}

/// Raw GEMM: `C = A @ B` with A `m x k`, B `k x n`, via trueno SIMD.
#[must_use]
pub fn matmul_compute(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    let mut c = vec![0.0f32; m * n];

    if trueno::blis::gemm(m, n, k, a, b, &mut c).is_err() {
        // SIMD path rejected the shape; recompute with the textbook loop.
        for i in 0..m {
            for j in 0..n {
                let mut sum = 0.0;
                for p in 0..k {
                    sum += a[i * k + p] * b[p * n + j];
                }
                c[i * n + j] = sum;
            }
        }
    }

    c
}

/// Matrix multiplication `C = A @ B` with recorded backward.
///
/// A is `m x k`, B is `k x n`, both flattened row-major. When either input
/// requires gradients the result carries a backward op computing
/// `grad_A = grad_C @ B^T` and `grad_B = A^T @ grad_C`.
pub fn matmul(a: &Tensor, b: &Tensor, m: usize, k: usize, n: usize) -> Tensor {
    assert_eq!(a.len(), m * k, "matmul: lhs is not {m}x{k}");
    assert_eq!(b.len(), k * n, "matmul: rhs is not {k}x{n}");

    let result_data = matmul_compute(
        a.data().as_slice().expect("contiguous lhs"),
        b.data().as_slice().expect("contiguous rhs"),
        m,
        k,
        n,
    );

    let requires_grad = a.requires_grad() || b.requires_grad();
    let result = Tensor::new(Array1::from(result_data), requires_grad);

    if requires_grad {
        result.set_backward_op(Rc::new(MatmulBackward {
            a: a.clone(),
            b: b.clone(),
            m,
            k,
            n,
            result_grad: result.grad_cell(),
        }));
    }

    result
}

struct MatmulBackward {
    a: Tensor,
    b: Tensor,
    m: usize,
    k: usize,
    n: usize,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for MatmulBackward {
    fn backward(&self) {
        let Some(grad_c) = self.result_grad.borrow().clone() else {
            return;
        };
        let grad_c = grad_c.as_slice().expect("contiguous output grad");

        if self.a.requires_grad() {
            // grad_A = grad_C (m x n) @ B^T (n x k)
            let b_data = self.b.data();
            let b_t = transpose(b_data.as_slice().expect("contiguous rhs"), self.k, self.n);
            let grad_a = matmul_compute(grad_c, &b_t, self.m, self.n, self.k);
            self.a.accumulate_grad(Array1::from(grad_a));
        }

        if self.b.requires_grad() {
            // grad_B = A^T (k x m) @ grad_C (m x n)
            let a_data = self.a.data();
            let a_t = transpose(a_data.as_slice().expect("contiguous lhs"), self.m, self.k);
            let grad_b = matmul_compute(&a_t, grad_c, self.k, self.m, self.n);
            self.b.accumulate_grad(Array1::from(grad_b));
        }

        if let Some(op) = self.a.backward_op() {
            op.backward();
        }
        if let Some(op) = self.b.backward_op() {
            op.backward();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matmul_known_result() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], false);
        let b = Tensor::from_vec(vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0], false);
        let c = matmul(&a, &b, 2, 3, 2);
        assert_eq!(
            c.data().as_slice().expect("contiguous"),
            &[58.0, 64.0, 139.0, 154.0]
        );
        assert!(!c.requires_grad());
    }

    #[test]
    fn matmul_backward_reaches_both_inputs() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], true);
        let b = Tensor::from_vec(vec![5.0, 6.0, 7.0, 8.0], true);
        let c = matmul(&a, &b, 2, 2, 2);
        assert!(c.requires_grad());

        c.set_grad(Array1::ones(4));
        c.backward_op().expect("backward op recorded").backward();

        let grad_a = a.grad().expect("lhs gradient");
        let grad_b = b.grad().expect("rhs gradient");
        // grad_A = ones @ B^T: each row sums B's columns.
        assert_eq!(grad_a.to_vec(), vec![11.0, 15.0, 11.0, 15.0]);
        // grad_B = A^T @ ones: each row sums A's rows.
        assert_eq!(grad_b.to_vec(), vec![4.0, 4.0, 6.0, 6.0]);
    }

    #[test]
    fn matmul_frozen_input_gets_no_grad() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], false);
        let b = Tensor::from_vec(vec![5.0, 6.0, 7.0, 8.0], true);
        let c = matmul(&a, &b, 2, 2, 2);

        c.set_grad(Array1::ones(4));
        c.backward_op().expect("backward op recorded").backward();

        assert!(a.grad().is_none());
        assert!(b.grad().is_some());
    }

    #[test]
    fn accumulate_grad_sums_across_calls() {
        let t = Tensor::zeros(3, true);
        t.accumulate_grad(Array1::from(vec![1.0, 2.0, 3.0]));
        t.accumulate_grad(Array1::from(vec![1.0, 1.0, 1.0]));
        assert_eq!(t.grad().expect("gradient set").to_vec(), vec![2.0, 3.0, 4.0]);
        t.zero_grad();
        assert!(t.grad().is_none());
    }

    #[test]
    fn clones_share_storage() {
        let t = Tensor::from_vec(vec![1.0, 2.0], true);
        let alias = t.clone();
        alias.data_mut()[0] = 9.0;
        assert_eq!(t.data()[0], 9.0);
    }

    #[test]
    fn transpose_round_trip() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let t = transpose(&data, 2, 3);
        assert_eq!(t, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        assert_eq!(transpose(&t, 3, 2), data);
    }

    #[test]
    #[should_panic(expected = "matmul: lhs is not")]
    fn matmul_shape_mismatch_panics() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0], false);
        let b = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], false);
        let _ = matmul(&a, &b, 2, 2, 2);
    }
}
