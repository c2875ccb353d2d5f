//! Position-wise feed-forward network.

use std::collections::HashMap;

use super::{seeded_uniform, xavier_scale, EncoderConfig};
use crate::autograd::matmul_compute;
use crate::Tensor;

/// Two-layer MLP with GELU, applied independently at every position.
pub struct FeedForward {
    /// Up projection, `[hidden, intermediate]`.
    pub w_in: Tensor,
    /// Up projection bias, `[intermediate]`.
    pub b_in: Tensor,
    /// Down projection, `[intermediate, hidden]`.
    pub w_out: Tensor,
    /// Down projection bias, `[hidden]`.
    pub b_out: Tensor,
    hidden_size: usize,
    intermediate_size: usize,
}

impl FeedForward {
    /// Deterministically initialized feed-forward layer.
    #[must_use]
    pub fn new(config: &EncoderConfig, layer: usize) -> Self {
        let h = config.hidden_size;
        let inter = config.intermediate_size;
        let seed = 500 + layer as u64 * 10;

        Self {
            w_in: Tensor::from_vec(
                seeded_uniform(h * inter, xavier_scale(h, inter), seed),
                false,
            ),
            b_in: Tensor::zeros(inter, false),
            w_out: Tensor::from_vec(
                seeded_uniform(inter * h, xavier_scale(inter, h), seed + 1),
                false,
            ),
            b_out: Tensor::zeros(h, false),
            hidden_size: h,
            intermediate_size: inter,
        }
    }

    /// Load from a parameter map under `{prefix}.{in,out}_proj.{weight,bias}`.
    pub fn from_params(
        params: &HashMap<String, Tensor>,
        config: &EncoderConfig,
        prefix: &str,
    ) -> Option<Self> {
        let h = config.hidden_size;
        let inter = config.intermediate_size;
        let get = |name: &str| params.get(&format!("{prefix}.{name}")).cloned();

        let w_in = get("in_proj.weight")?;
        let w_out = get("out_proj.weight")?;
        if w_in.len() != h * inter || w_out.len() != inter * h {
            eprintln!("FeedForward '{prefix}': projection shape mismatch");
            return None;
        }

        Some(Self {
            w_in,
            b_in: get("in_proj.bias")?,
            w_out,
            b_out: get("out_proj.bias")?,
            hidden_size: h,
            intermediate_size: inter,
        })
    }

    /// Transform `x` (`[seq_len * hidden]` flattened) position-wise.
    #[must_use]
    pub fn forward(&self, x: &[f32], seq_len: usize) -> Vec<f32> {
        let h = self.hidden_size;
        let inter = self.intermediate_size;
        assert_eq!(x.len(), seq_len * h, "feed-forward input is not {seq_len}x{h}");

        let w_in = self.w_in.data();
        let mut up = matmul_compute(
            x,
            w_in.as_slice().expect("contiguous up projection"),
            seq_len,
            h,
            inter,
        );
        {
            let b_in = self.b_in.data();
            for row in up.chunks_mut(inter) {
                for (v, &b) in row.iter_mut().zip(b_in.iter()) {
                    *v = gelu(*v + b);
                }
            }
        }

        let w_out = self.w_out.data();
        let mut out = matmul_compute(
            &up,
            w_out.as_slice().expect("contiguous down projection"),
            seq_len,
            inter,
            h,
        );
        let b_out = self.b_out.data();
        for row in out.chunks_mut(h) {
            for (v, &b) in row.iter_mut().zip(b_out.iter()) {
                *v += b;
            }
        }

        out
    }

    /// Parameters in persistence order.
    pub fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.w_in, &self.b_in, &self.w_out, &self.b_out]
    }
}

/// GELU activation (tanh approximation).
fn gelu(x: f32) -> f32 {
    const SQRT_2_OVER_PI: f32 = 0.797_884_6;
    0.5 * x * (1.0 + (SQRT_2_OVER_PI * (x + 0.044_715 * x * x * x)).tanh())
}
