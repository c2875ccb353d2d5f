//! Final artifact persistence.
//!
//! Writes the fine-tuned model and tokenizer into one directory, overwriting
//! any existing content unconditionally: write-once at the end of the run,
//! no versioning, no atomic-rename guarantee. The layout mirrors what the
//! loading side expects: `config.json`, `model.safetensors`, and
//! `tokenizer.json` when the tokenizer is file-backed.

use std::path::Path;

use crate::model::{weights, ClassificationHead, Encoder};
use crate::pipeline::ClassifierPipeline;
use crate::tokenizer::TextEncoder;
use crate::{Error, Result};

/// Serialize the pipeline's model and tokenizer configuration to `dir`.
///
/// # Errors
/// Returns an error if the directory cannot be created or any file write
/// fails.
pub fn save_pretrained(
    pipeline: &ClassifierPipeline,
    text_encoder: &TextEncoder,
    dir: impl AsRef<Path>,
) -> Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::Io(format!("Failed to create {}: {e}", dir.display())))?;

    // model.safetensors: encoder stack + classifier head.
    let mut entries: Vec<(String, Vec<usize>, Vec<f32>)> = pipeline
        .encoder
        .named_parameters()
        .into_iter()
        .map(|(name, t)| (name, vec![t.len()], t.data().to_vec()))
        .collect();
    entries.push((
        "classifier.weight".to_string(),
        vec![pipeline.head.hidden_size(), pipeline.head.num_classes()],
        pipeline.head.weight.data().to_vec(),
    ));
    entries.push((
        "classifier.bias".to_string(),
        vec![pipeline.head.num_classes()],
        pipeline.head.bias.data().to_vec(),
    ));
    weights::save_params(&dir.join("model.safetensors"), &entries)?;

    // config.json: architecture plus the classification surface.
    let mut config = serde_json::to_value(&pipeline.encoder.config)
        .map_err(|e| Error::Serialization(format!("Failed to serialize config: {e}")))?;
    let map = config
        .as_object_mut()
        .expect("EncoderConfig serializes to an object");
    map.insert(
        "num_labels".to_string(),
        serde_json::json!(pipeline.head.num_classes()),
    );
    map.insert(
        "problem_type".to_string(),
        serde_json::json!("single_label_classification"),
    );
    let config_json = serde_json::to_string_pretty(&config)
        .map_err(|e| Error::Serialization(format!("Failed to serialize config.json: {e}")))?;
    std::fs::write(dir.join("config.json"), config_json)
        .map_err(|e| Error::Io(format!("Failed to write config.json: {e}")))?;

    // tokenizer.json: copied from the tokenizer's source file when there is
    // one; the bundled-vocabulary encoder has no file to copy.
    if let Some(src) = text_encoder.source_path() {
        std::fs::copy(src, dir.join("tokenizer.json"))
            .map_err(|e| Error::Io(format!("Failed to copy tokenizer.json: {e}")))?;
    }

    Ok(())
}

/// Reconstruct a saved classifier for inference.
///
/// # Errors
/// Returns an error if the artifact is missing tensors or has an invalid
/// config.
pub fn load_pretrained(dir: impl AsRef<Path>, learning_rate: f32) -> Result<ClassifierPipeline> {
    let dir = dir.as_ref();
    let encoder = Encoder::from_pretrained(dir)?;

    let config_json = std::fs::read_to_string(dir.join("config.json"))
        .map_err(|e| Error::Io(format!("Failed to read config.json: {e}")))?;
    let config: serde_json::Value = serde_json::from_str(&config_json)
        .map_err(|e| Error::Serialization(format!("Invalid config.json: {e}")))?;
    let num_labels = config
        .get("num_labels")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| Error::Config("config.json is missing num_labels".to_string()))?
        as usize;

    let params = weights::load_params(&dir.join("model.safetensors"))?;
    let weight = params
        .get("classifier.weight")
        .ok_or_else(|| Error::Config("artifact is missing classifier.weight".to_string()))?
        .clone();
    let bias = params
        .get("classifier.bias")
        .ok_or_else(|| Error::Config("artifact is missing classifier.bias".to_string()))?
        .clone();

    let hidden_size = encoder.hidden_size();
    let mut pipeline = ClassifierPipeline::new(encoder, num_labels, learning_rate);
    pipeline.head = ClassificationHead::from_tensors(weight, bias, hidden_size, num_labels);
    Ok(pipeline)
}
