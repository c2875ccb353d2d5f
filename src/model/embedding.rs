//! Token and position embeddings.

use std::collections::HashMap;

use super::norm::LayerNorm;
use super::{seeded_uniform, EncoderConfig};
use crate::Tensor;

/// Input embedding stage: token lookup + learned position embedding,
/// normalized with LayerNorm.
pub struct Embeddings {
    /// Token table, `[vocab_size, hidden_size]` flattened.
    pub word_embeddings: Tensor,
    /// Position table, `[max_position_embeddings, hidden_size]` flattened.
    pub position_embeddings: Tensor,
    /// Post-sum normalization.
    pub layer_norm: LayerNorm,
    vocab_size: usize,
    hidden_size: usize,
    max_positions: usize,
}

impl Embeddings {
    /// Deterministically initialized embeddings.
    #[must_use]
    pub fn new(config: &EncoderConfig) -> Self {
        let scale = (1.0 / config.hidden_size as f32).sqrt();
        Self {
            word_embeddings: Tensor::from_vec(
                seeded_uniform(config.vocab_size * config.hidden_size, scale, 11),
                false,
            ),
            position_embeddings: Tensor::from_vec(
                seeded_uniform(config.max_position_embeddings * config.hidden_size, scale, 13),
                false,
            ),
            layer_norm: LayerNorm::new(config.hidden_size, config.layer_norm_eps),
            vocab_size: config.vocab_size,
            hidden_size: config.hidden_size,
            max_positions: config.max_position_embeddings,
        }
    }

    /// Load from a parameter map.
    ///
    /// Expected keys:
    /// - `embeddings.word_embeddings.weight`
    /// - `embeddings.position_embeddings.weight`
    /// - `embeddings.layer_norm.{weight,bias}`
    pub fn from_params(params: &HashMap<String, Tensor>, config: &EncoderConfig) -> Option<Self> {
        let word = params.get("embeddings.word_embeddings.weight")?.clone();
        let pos = params.get("embeddings.position_embeddings.weight")?.clone();

        let expected_word = config.vocab_size * config.hidden_size;
        let expected_pos = config.max_position_embeddings * config.hidden_size;
        if word.len() != expected_word || pos.len() != expected_pos {
            eprintln!(
                "Embeddings: shape mismatch (word {} vs {expected_word}, pos {} vs {expected_pos})",
                word.len(),
                pos.len()
            );
            return None;
        }

        let layer_norm = LayerNorm::from_params(
            params,
            "embeddings.layer_norm",
            config.hidden_size,
            config.layer_norm_eps,
        )?;

        Some(Self {
            word_embeddings: word,
            position_embeddings: pos,
            layer_norm,
            vocab_size: config.vocab_size,
            hidden_size: config.hidden_size,
            max_positions: config.max_position_embeddings,
        })
    }

    /// Embed a token sequence: `[seq_len * hidden_size]` flattened.
    ///
    /// Out-of-vocabulary IDs embed as zeros (with a warning) rather than
    /// panicking; positions beyond the table clamp to the last position.
    #[must_use]
    pub fn forward(&self, token_ids: &[u32]) -> Vec<f32> {
        let h = self.hidden_size;
        let word = self.word_embeddings.data();
        let word = word.as_slice().expect("contiguous word embeddings");
        let pos = self.position_embeddings.data();
        let pos = pos.as_slice().expect("contiguous position embeddings");

        let mut out = vec![0.0f32; token_ids.len() * h];
        for (s, &token_id) in token_ids.iter().enumerate() {
            let idx = token_id as usize;
            if idx >= self.vocab_size {
                eprintln!(
                    "Warning: token id {idx} >= vocab_size {}; embedding as zeros",
                    self.vocab_size
                );
            } else {
                out[s * h..(s + 1) * h].copy_from_slice(&word[idx * h..(idx + 1) * h]);
            }

            let p = s.min(self.max_positions - 1);
            for (i, v) in out[s * h..(s + 1) * h].iter_mut().enumerate() {
                *v += pos[p * h + i];
            }
        }

        self.layer_norm.forward_rows(&out, token_ids.len(), h)
    }

    /// Parameters in persistence order.
    pub fn parameters(&self) -> Vec<&Tensor> {
        let mut params = vec![&self.word_embeddings, &self.position_embeddings];
        params.extend(self.layer_norm.parameters());
        params
    }
}
