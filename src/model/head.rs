//! Classification head: masked mean pooling plus a linear projection.
//!
//! The head holds the pipeline's only trainable parameters. Pooling respects
//! the attention mask; with fixed-width padded encodings, averaging pad
//! positions into the pooled vector would drown short documents in padding.

use crate::autograd::matmul;
use crate::model::{seeded_uniform, xavier_scale};
use crate::Tensor;

/// Maps per-token hidden states to class logits.
pub struct ClassificationHead {
    /// Projection, `[hidden_size, num_classes]` flattened row-major.
    pub weight: Tensor,
    /// Bias, `[num_classes]`.
    pub bias: Tensor,
    hidden_size: usize,
    num_classes: usize,
}

impl ClassificationHead {
    /// Xavier-initialized head.
    ///
    /// Panics unless `hidden_size > 0` and `num_classes >= 2`.
    #[must_use]
    pub fn new(hidden_size: usize, num_classes: usize) -> Self {
        assert!(hidden_size > 0, "hidden_size must be > 0");
        assert!(num_classes >= 2, "num_classes must be >= 2");

        let scale = xavier_scale(hidden_size, num_classes);
        Self {
            weight: Tensor::from_vec(
                seeded_uniform(hidden_size * num_classes, scale, 42),
                true,
            ),
            bias: Tensor::zeros(num_classes, true),
            hidden_size,
            num_classes,
        }
    }

    /// Rebuild a head from saved tensors.
    ///
    /// Panics if the tensor lengths do not match the dimensions.
    #[must_use]
    pub fn from_tensors(
        weight: Tensor,
        bias: Tensor,
        hidden_size: usize,
        num_classes: usize,
    ) -> Self {
        assert_eq!(weight.len(), hidden_size * num_classes, "weight shape mismatch");
        assert_eq!(bias.len(), num_classes, "bias shape mismatch");
        weight.set_requires_grad(true);
        bias.set_requires_grad(true);
        Self {
            weight,
            bias,
            hidden_size,
            num_classes,
        }
    }

    /// Mean-pool hidden states over unmasked positions.
    ///
    /// `hidden` is `[seq_len * hidden_size]` flattened. A fully masked
    /// sequence (an all-padding encoding) pools to zeros.
    #[must_use]
    pub fn mean_pool(&self, hidden: &[f32], attention_mask: &[u8]) -> Tensor {
        let h = self.hidden_size;
        let seq_len = attention_mask.len();
        assert_eq!(hidden.len(), seq_len * h, "hidden is not {seq_len}x{h}");

        let mut pooled = vec![0.0f32; h];
        let mut count = 0usize;
        for (pos, &m) in attention_mask.iter().enumerate() {
            if m == 0 {
                continue;
            }
            count += 1;
            for (p, &v) in pooled.iter_mut().zip(hidden[pos * h..(pos + 1) * h].iter()) {
                *p += v;
            }
        }
        if count > 0 {
            let inv = 1.0 / count as f32;
            for p in &mut pooled {
                *p *= inv;
            }
        }

        Tensor::from_vec(pooled, false)
    }

    /// Project a pooled vector to logits, tracking gradients to the head
    /// parameters. Bias is added outside the tape; its gradient equals the
    /// logit gradient and is set directly by the caller.
    #[must_use]
    pub fn project(&self, pooled: &Tensor) -> (Tensor, Vec<f32>) {
        let logits = matmul(pooled, &self.weight, 1, self.hidden_size, self.num_classes);
        let bias = self.bias.data();
        let with_bias: Vec<f32> = logits
            .data()
            .iter()
            .zip(bias.iter())
            .map(|(&l, &b)| l + b)
            .collect();
        (logits, with_bias)
    }

    /// Logits without gradient tracking (the evaluation path).
    #[must_use]
    pub fn forward(&self, hidden: &[f32], attention_mask: &[u8]) -> Vec<f32> {
        let pooled = self.mean_pool(hidden, attention_mask);
        let (_, with_bias) = self.project(&pooled);
        with_bias
    }

    /// Trainable parameters (weight, bias).
    pub fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weight, &mut self.bias]
    }

    /// Number of classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Hidden dimension.
    #[must_use]
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Total trainable scalar count.
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.hidden_size * self.num_classes + self.num_classes
    }
}
