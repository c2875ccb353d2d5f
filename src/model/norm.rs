//! Layer normalization.

use std::collections::HashMap;

use crate::Tensor;

/// LayerNorm with learned scale and shift.
///
/// `LN(x) = (x - mean(x)) / sqrt(var(x) + eps) * weight + bias`, applied
/// independently to each row of a `[rows, width]` buffer.
pub struct LayerNorm {
    /// Scale (gamma), `[width]`.
    pub weight: Tensor,
    /// Shift (beta), `[width]`.
    pub bias: Tensor,
    eps: f32,
}

impl LayerNorm {
    /// Identity-initialized LayerNorm (scale 1, shift 0).
    #[must_use]
    pub fn new(width: usize, eps: f32) -> Self {
        Self {
            weight: Tensor::ones(width, false),
            bias: Tensor::zeros(width, false),
            eps,
        }
    }

    /// Load from a parameter map; `{prefix}.weight` and `{prefix}.bias`.
    ///
    /// Returns `None` if a key is missing or a length is wrong.
    pub fn from_params(
        params: &HashMap<String, Tensor>,
        prefix: &str,
        width: usize,
        eps: f32,
    ) -> Option<Self> {
        let weight = params.get(&format!("{prefix}.weight"))?.clone();
        let bias = params.get(&format!("{prefix}.bias"))?.clone();
        if weight.len() != width || bias.len() != width {
            eprintln!(
                "LayerNorm '{prefix}': length mismatch (weight {}, bias {}, expected {width})",
                weight.len(),
                bias.len()
            );
            return None;
        }
        Some(Self { weight, bias, eps })
    }

    /// Normalize each of `rows` rows of width `width` in `x`.
    #[must_use]
    pub fn forward_rows(&self, x: &[f32], rows: usize, width: usize) -> Vec<f32> {
        assert_eq!(x.len(), rows * width, "LayerNorm input is not {rows}x{width}");
        let weight = self.weight.data();
        let bias = self.bias.data();
        let mut out = vec![0.0f32; rows * width];

        for r in 0..rows {
            let row = &x[r * width..(r + 1) * width];
            let mean = row.iter().sum::<f32>() / width as f32;
            let var = row.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / width as f32;
            let inv_std = 1.0 / (var + self.eps).sqrt();

            for (i, &v) in row.iter().enumerate() {
                out[r * width + i] = (v - mean) * inv_std * weight[i] + bias[i];
            }
        }

        out
    }

    /// Parameters in persistence order (weight, bias).
    pub fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weight, &self.bias]
    }
}
