//! Bidirectional multi-head self-attention.

use std::collections::HashMap;

use super::{seeded_uniform, xavier_scale, EncoderConfig};
use crate::autograd::matmul_compute;
use crate::Tensor;

/// Additive score for masked-out key positions; large enough to zero the
/// softmax weight without overflowing f32 exp.
const MASK_BIAS: f32 = -1.0e9;

/// Multi-head self-attention with padding mask.
///
/// Every position attends to every unmasked position: no causal
/// restriction. Projections carry biases.
pub struct SelfAttention {
    /// Query projection, `[hidden, hidden]`.
    pub w_q: Tensor,
    /// Key projection, `[hidden, hidden]`.
    pub w_k: Tensor,
    /// Value projection, `[hidden, hidden]`.
    pub w_v: Tensor,
    /// Output projection, `[hidden, hidden]`.
    pub w_o: Tensor,
    /// Projection biases, `[hidden]` each.
    pub b_q: Tensor,
    pub b_k: Tensor,
    pub b_v: Tensor,
    pub b_o: Tensor,
    hidden_size: usize,
    num_heads: usize,
}

impl SelfAttention {
    /// Deterministically initialized attention layer.
    #[must_use]
    pub fn new(config: &EncoderConfig, layer: usize) -> Self {
        let h = config.hidden_size;
        let scale = xavier_scale(h, h);
        let seed = 100 + layer as u64 * 10;

        Self {
            w_q: Tensor::from_vec(seeded_uniform(h * h, scale, seed), false),
            w_k: Tensor::from_vec(seeded_uniform(h * h, scale, seed + 1), false),
            w_v: Tensor::from_vec(seeded_uniform(h * h, scale, seed + 2), false),
            w_o: Tensor::from_vec(seeded_uniform(h * h, scale, seed + 3), false),
            b_q: Tensor::zeros(h, false),
            b_k: Tensor::zeros(h, false),
            b_v: Tensor::zeros(h, false),
            b_o: Tensor::zeros(h, false),
            hidden_size: h,
            num_heads: config.num_attention_heads,
        }
    }

    /// Load from a parameter map under `{prefix}.{q,k,v,o}_proj.{weight,bias}`.
    pub fn from_params(
        params: &HashMap<String, Tensor>,
        config: &EncoderConfig,
        prefix: &str,
    ) -> Option<Self> {
        let h = config.hidden_size;
        let get = |name: &str| params.get(&format!("{prefix}.{name}")).cloned();

        let w_q = get("q_proj.weight")?;
        let w_k = get("k_proj.weight")?;
        let w_v = get("v_proj.weight")?;
        let w_o = get("o_proj.weight")?;
        for (name, w) in [("q", &w_q), ("k", &w_k), ("v", &w_v), ("o", &w_o)] {
            if w.len() != h * h {
                eprintln!("SelfAttention '{prefix}.{name}_proj': expected {}x{h}", h);
                return None;
            }
        }

        Some(Self {
            w_q,
            w_k,
            w_v,
            w_o,
            b_q: get("q_proj.bias")?,
            b_k: get("k_proj.bias")?,
            b_v: get("v_proj.bias")?,
            b_o: get("o_proj.bias")?,
            hidden_size: h,
            num_heads: config.num_attention_heads,
        })
    }

    /// Attend over `x` (`[seq_len * hidden]` flattened), masking padded keys.
    #[must_use]
    pub fn forward(&self, x: &[f32], seq_len: usize, attention_mask: &[u8]) -> Vec<f32> {
        let h = self.hidden_size;
        let head_dim = h / self.num_heads;
        assert_eq!(x.len(), seq_len * h, "attention input is not {seq_len}x{h}");
        assert_eq!(attention_mask.len(), seq_len, "mask length mismatch");

        let q = self.project(x, seq_len, &self.w_q, &self.b_q);
        let k = self.project(x, seq_len, &self.w_k, &self.b_k);
        let v = self.project(x, seq_len, &self.w_v, &self.b_v);

        let inv_sqrt_d = 1.0 / (head_dim as f32).sqrt();
        let mut context = vec![0.0f32; seq_len * h];

        for head in 0..self.num_heads {
            let offset = head * head_dim;

            // scores[i][j] = q_i . k_j / sqrt(d), with masked keys pushed to -inf.
            for i in 0..seq_len {
                let q_row = &q[i * h + offset..i * h + offset + head_dim];
                let mut scores = vec![0.0f32; seq_len];
                for (j, score) in scores.iter_mut().enumerate() {
                    if attention_mask[j] == 0 {
                        *score = MASK_BIAS;
                        continue;
                    }
                    let k_row = &k[j * h + offset..j * h + offset + head_dim];
                    *score = q_row
                        .iter()
                        .zip(k_row.iter())
                        .map(|(&a, &b)| a * b)
                        .sum::<f32>()
                        * inv_sqrt_d;
                }

                // Softmax over key positions.
                let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                let mut denom = 0.0f32;
                for score in &mut scores {
                    *score = (*score - max).exp();
                    denom += *score;
                }
                if denom > 0.0 {
                    for score in &mut scores {
                        *score /= denom;
                    }
                }

                let ctx_row = &mut context[i * h + offset..i * h + offset + head_dim];
                for (j, &weight) in scores.iter().enumerate() {
                    if weight == 0.0 {
                        continue;
                    }
                    let v_row = &v[j * h + offset..j * h + offset + head_dim];
                    for (c, &vv) in ctx_row.iter_mut().zip(v_row.iter()) {
                        *c += weight * vv;
                    }
                }
            }
        }

        self.project(&context, seq_len, &self.w_o, &self.b_o)
    }

    /// `x @ w + b` over all rows.
    fn project(&self, x: &[f32], seq_len: usize, w: &Tensor, b: &Tensor) -> Vec<f32> {
        let h = self.hidden_size;
        let w_data = w.data();
        let mut out = matmul_compute(
            x,
            w_data.as_slice().expect("contiguous projection weight"),
            seq_len,
            h,
            h,
        );
        let b_data = b.data();
        for row in out.chunks_mut(h) {
            for (v, &bias) in row.iter_mut().zip(b_data.iter()) {
                *v += bias;
            }
        }
        out
    }

    /// Parameters in persistence order.
    pub fn parameters(&self) -> Vec<&Tensor> {
        vec![
            &self.w_q, &self.b_q, &self.w_k, &self.b_k, &self.w_v, &self.b_v, &self.w_o, &self.b_o,
        ]
    }
}
