//! Encoder architecture configuration.

use serde::{Deserialize, Serialize};

/// Architecture of the bidirectional encoder.
///
/// Serialized as the `config.json` of a saved artifact and read back when
/// loading pretrained weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Hidden dimension.
    pub hidden_size: usize,
    /// Number of attention heads.
    pub num_attention_heads: usize,
    /// Feed-forward intermediate dimension.
    pub intermediate_size: usize,
    /// Number of encoder blocks.
    pub num_hidden_layers: usize,
    /// Vocabulary size.
    pub vocab_size: usize,
    /// Maximum sequence length (learned position embeddings).
    pub max_position_embeddings: usize,
    /// LayerNorm epsilon.
    pub layer_norm_eps: f32,
}

impl EncoderConfig {
    /// Base encoder: BERT-base dimensions over the GPT-2 BPE vocabulary.
    #[must_use]
    pub fn base() -> Self {
        Self {
            hidden_size: 768,
            num_attention_heads: 12,
            intermediate_size: 3072,
            num_hidden_layers: 12,
            vocab_size: 50257,
            max_position_embeddings: 512,
            layer_norm_eps: 1e-12,
        }
    }

    /// Tiny configuration for tests.
    #[must_use]
    pub fn tiny() -> Self {
        Self {
            hidden_size: 32,
            num_attention_heads: 2,
            intermediate_size: 64,
            num_hidden_layers: 2,
            vocab_size: 1000,
            max_position_embeddings: 64,
            layer_norm_eps: 1e-12,
        }
    }

    /// Per-head dimension.
    #[must_use]
    pub fn head_dim(&self) -> usize {
        self.hidden_size / self.num_attention_heads
    }
}
