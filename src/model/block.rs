//! One encoder block: attention and feed-forward with post-LN residuals.

use std::collections::HashMap;

use super::attention::SelfAttention;
use super::feedforward::FeedForward;
use super::norm::LayerNorm;
use super::EncoderConfig;
use crate::Tensor;

/// Post-LN encoder block:
///
/// ```text
/// h   = LN(x + Attention(x))
/// out = LN(h + FeedForward(h))
/// ```
pub struct EncoderBlock {
    /// Self-attention sublayer.
    pub attention: SelfAttention,
    /// Norm after the attention residual.
    pub attention_norm: LayerNorm,
    /// Feed-forward sublayer.
    pub feed_forward: FeedForward,
    /// Norm after the feed-forward residual.
    pub output_norm: LayerNorm,
    hidden_size: usize,
}

impl EncoderBlock {
    /// Deterministically initialized block.
    #[must_use]
    pub fn new(config: &EncoderConfig, layer: usize) -> Self {
        Self {
            attention: SelfAttention::new(config, layer),
            attention_norm: LayerNorm::new(config.hidden_size, config.layer_norm_eps),
            feed_forward: FeedForward::new(config, layer),
            output_norm: LayerNorm::new(config.hidden_size, config.layer_norm_eps),
            hidden_size: config.hidden_size,
        }
    }

    /// Load block `layer` from a parameter map under `encoder.layer.{layer}`.
    pub fn from_params(
        params: &HashMap<String, Tensor>,
        config: &EncoderConfig,
        layer: usize,
    ) -> Option<Self> {
        let prefix = format!("encoder.layer.{layer}");
        Some(Self {
            attention: SelfAttention::from_params(params, config, &format!("{prefix}.attention"))?,
            attention_norm: LayerNorm::from_params(
                params,
                &format!("{prefix}.attention_norm"),
                config.hidden_size,
                config.layer_norm_eps,
            )?,
            feed_forward: FeedForward::from_params(params, config, &format!("{prefix}.mlp"))?,
            output_norm: LayerNorm::from_params(
                params,
                &format!("{prefix}.output_norm"),
                config.hidden_size,
                config.layer_norm_eps,
            )?,
            hidden_size: config.hidden_size,
        })
    }

    /// Transform hidden states (`[seq_len * hidden]` flattened).
    #[must_use]
    pub fn forward(&self, x: &[f32], seq_len: usize, attention_mask: &[u8]) -> Vec<f32> {
        let attn_out = self.attention.forward(x, seq_len, attention_mask);
        let residual: Vec<f32> = x.iter().zip(attn_out.iter()).map(|(&a, &b)| a + b).collect();
        let h = self
            .attention_norm
            .forward_rows(&residual, seq_len, self.hidden_size);

        let ffn_out = self.feed_forward.forward(&h, seq_len);
        let residual: Vec<f32> = h.iter().zip(ffn_out.iter()).map(|(&a, &b)| a + b).collect();
        self.output_norm
            .forward_rows(&residual, seq_len, self.hidden_size)
    }

    /// Parameters in persistence order.
    pub fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.attention.parameters();
        params.extend(self.attention_norm.parameters());
        params.extend(self.feed_forward.parameters());
        params.extend(self.output_norm.parameters());
        params
    }
}
