//! The full bidirectional encoder.

use std::collections::HashMap;
use std::path::Path;

use super::block::EncoderBlock;
use super::embedding::Embeddings;
use super::weights;
use super::EncoderConfig;
use crate::{Error, Result, Tensor};

/// Frozen bidirectional encoder: embeddings plus a stack of blocks.
///
/// Produces per-token hidden states; the classification head owns the
/// trainable parameters. None of the encoder's tensors require gradients.
pub struct Encoder {
    /// Architecture.
    pub config: EncoderConfig,
    /// Input embedding stage.
    pub embeddings: Embeddings,
    /// Encoder blocks.
    pub layers: Vec<EncoderBlock>,
}

impl Encoder {
    /// Deterministically initialized encoder (the test path; real runs load
    /// pretrained weights).
    #[must_use]
    pub fn new(config: &EncoderConfig) -> Self {
        let layers = (0..config.num_hidden_layers)
            .map(|i| EncoderBlock::new(config, i))
            .collect();
        Self {
            config: config.clone(),
            embeddings: Embeddings::new(config),
            layers,
        }
    }

    /// Reconstruct an encoder from a parameter map.
    ///
    /// Returns `None` when a tensor is missing or mis-shaped; the caller
    /// turns that into a configuration error.
    pub fn from_params(
        config: &EncoderConfig,
        params: &HashMap<String, Tensor>,
    ) -> Option<Self> {
        let embeddings = Embeddings::from_params(params, config)?;
        let layers: Option<Vec<EncoderBlock>> = (0..config.num_hidden_layers)
            .map(|i| EncoderBlock::from_params(params, config, i))
            .collect();

        Some(Self {
            config: config.clone(),
            embeddings,
            layers: layers?,
        })
    }

    /// Load `config.json` + `model.safetensors` from a model directory.
    ///
    /// # Errors
    /// Returns an error if either file is unreadable or the weights do not
    /// match the configured architecture.
    pub fn from_pretrained(model_dir: impl AsRef<Path>) -> Result<Self> {
        let model_dir = model_dir.as_ref();

        let config_path = model_dir.join("config.json");
        let config_json = std::fs::read_to_string(&config_path)
            .map_err(|e| Error::Io(format!("Failed to read {}: {e}", config_path.display())))?;
        let config: EncoderConfig = serde_json::from_str(&config_json)
            .map_err(|e| Error::Serialization(format!("Invalid config.json: {e}")))?;

        let params = weights::load_params(&model_dir.join("model.safetensors"))?;
        Self::from_params(&config, &params).ok_or_else(|| {
            Error::Config(format!(
                "Weights in {} do not match the configured architecture",
                model_dir.display()
            ))
        })
    }

    /// Hidden states for one sequence: `[seq_len * hidden_size]` flattened.
    #[must_use]
    pub fn forward_hidden(&self, input_ids: &[u32], attention_mask: &[u8]) -> Vec<f32> {
        assert_eq!(
            input_ids.len(),
            attention_mask.len(),
            "ids and mask must have equal length"
        );
        let seq_len = input_ids.len();

        let mut hidden = self.embeddings.forward(input_ids);
        for layer in &self.layers {
            hidden = layer.forward(&hidden, seq_len, attention_mask);
        }
        hidden
    }

    /// Hidden dimension.
    #[must_use]
    pub fn hidden_size(&self) -> usize {
        self.config.hidden_size
    }

    /// All encoder tensors paired with their persistence names.
    pub fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        let mut named = Vec::new();

        let emb_names = [
            "embeddings.word_embeddings.weight",
            "embeddings.position_embeddings.weight",
            "embeddings.layer_norm.weight",
            "embeddings.layer_norm.bias",
        ];
        for (name, tensor) in emb_names.iter().zip(self.embeddings.parameters()) {
            named.push(((*name).to_string(), tensor));
        }

        let block_names = [
            "attention.q_proj.weight",
            "attention.q_proj.bias",
            "attention.k_proj.weight",
            "attention.k_proj.bias",
            "attention.v_proj.weight",
            "attention.v_proj.bias",
            "attention.o_proj.weight",
            "attention.o_proj.bias",
            "attention_norm.weight",
            "attention_norm.bias",
            "mlp.in_proj.weight",
            "mlp.in_proj.bias",
            "mlp.out_proj.weight",
            "mlp.out_proj.bias",
            "output_norm.weight",
            "output_norm.bias",
        ];
        for (i, layer) in self.layers.iter().enumerate() {
            for (name, tensor) in block_names.iter().zip(layer.parameters()) {
                named.push((format!("encoder.layer.{i}.{name}"), tensor));
            }
        }

        named
    }
}
