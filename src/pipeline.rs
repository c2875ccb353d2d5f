//! Classifier pipeline: frozen encoder + trainable head + optimizer.
//!
//! ```text
//! input_ids/mask -> Encoder.forward_hidden() -> [seq_len, hidden]
//!                -> mean pool (masked)       -> [hidden]
//!                -> head projection          -> [num_classes] logits
//!                -> cross-entropy(label)     -> scalar loss
//! ```
//!
//! The backward path is the cross-entropy gradient (`softmax - one_hot`) set
//! on the logits and propagated through the head's matmul; the encoder takes
//! no gradient updates.

use ndarray::Array1;

use crate::dataset::Batch;
use crate::model::{ClassificationHead, Encoder};
use crate::optim::{AdamW, Optimizer};

/// Outcome of one training batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchResult {
    /// Mean cross-entropy loss over the batch.
    pub avg_loss: f32,
    /// Correct argmax predictions.
    pub correct: usize,
    /// Examples in the batch.
    pub total: usize,
}

/// The model being fine-tuned, with its optimizer.
pub struct ClassifierPipeline {
    /// Frozen encoder.
    pub encoder: Encoder,
    /// Trainable classification head.
    pub head: ClassificationHead,
    optimizer: AdamW,
}

impl ClassifierPipeline {
    /// Wire an encoder to a fresh head and an AdamW optimizer.
    #[must_use]
    pub fn new(encoder: Encoder, num_classes: usize, learning_rate: f32) -> Self {
        let head = ClassificationHead::new(encoder.hidden_size(), num_classes);
        Self {
            encoder,
            head,
            optimizer: AdamW::default_params(learning_rate),
        }
    }

    /// Number of output classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.head.num_classes()
    }

    /// One optimizer step over a batch: zero grads, forward every row,
    /// mean cross-entropy, backward, single parameter update.
    pub fn train_batch(&mut self, batch: &Batch) -> BatchResult {
        let total = batch.batch_size();
        assert!(total > 0, "cannot train on an empty batch");
        let num_classes = self.head.num_classes();
        let inv_total = 1.0 / total as f32;

        self.head.weight.zero_grad();
        self.head.bias.zero_grad();

        let mut loss_sum = 0.0f32;
        let mut correct = 0usize;

        for row in 0..total {
            let input_ids = batch.input_ids.row(row).to_vec();
            let mask = batch.attention_mask.row(row).to_vec();
            let label = batch.labels[row];
            assert!(label < num_classes, "label {label} out of range");

            let hidden = self.encoder.forward_hidden(&input_ids, &mask);
            let pooled = self.head.mean_pool(&hidden, &mask);
            let (logits_tensor, logits) = self.head.project(&pooled);

            let probs = softmax(&logits);
            let loss = -(probs[label].max(1e-10).ln());
            loss_sum += if loss.is_finite() { loss } else { 100.0 };
            if argmax(&logits) == label {
                correct += 1;
            }

            // dL/dlogits = (softmax - one_hot) / batch_size; gradients
            // accumulate across the batch's rows before the single step.
            let mut grad_logits = probs;
            grad_logits[label] -= 1.0;
            for g in &mut grad_logits {
                *g *= inv_total;
            }

            logits_tensor.set_grad(Array1::from(grad_logits.clone()));
            if let Some(op) = logits_tensor.backward_op() {
                op.backward();
            }
            self.head.bias.accumulate_grad(Array1::from(grad_logits));
        }

        let mut params = self.head.parameters_mut();
        self.optimizer.step_refs(&mut params);

        BatchResult {
            avg_loss: loss_sum * inv_total,
            correct,
            total,
        }
    }

    /// Forward one example without gradients; returns (loss, predicted).
    #[must_use]
    pub fn forward_only(&self, input_ids: &[u32], attention_mask: &[u8], label: usize) -> (f32, usize) {
        let num_classes = self.head.num_classes();
        assert!(label < num_classes, "label {label} out of range");

        let hidden = self.encoder.forward_hidden(input_ids, attention_mask);
        let logits = self.head.forward(&hidden, attention_mask);

        // Stable cross-entropy: -(x_t - logsumexp(x)).
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let log_sum_exp = logits.iter().map(|&v| (v - max).exp()).sum::<f32>().ln() + max;
        let loss = log_sum_exp - logits[label];

        (
            if loss.is_finite() { loss } else { 100.0 },
            argmax(&logits),
        )
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}

fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{BatchLoader, EncodedDataset};
    use crate::model::EncoderConfig;
    use crate::tokenizer::Encoding;

    fn make_batch(samples: &[(Vec<u32>, usize)], width: usize) -> Batch {
        let encodings: Vec<Encoding> = samples
            .iter()
            .map(|(ids, _)| {
                let mut input_ids = ids.clone();
                let real = input_ids.len().min(width);
                input_ids.truncate(width);
                let mut mask = vec![1u8; real];
                input_ids.resize(width, 0);
                mask.resize(width, 0);
                Encoding {
                    input_ids,
                    attention_mask: mask,
                }
            })
            .collect();
        let labels: Vec<usize> = samples.iter().map(|(_, l)| *l).collect();
        let dataset = EncodedDataset::new(encodings, labels);
        let loader = BatchLoader::new(&dataset, samples.len(), false, 0);
        let batch = loader.epoch_batches(0).next().expect("one batch");
        batch
    }

    #[test]
    fn train_batch_returns_finite_positive_loss() {
        let encoder = Encoder::new(&EncoderConfig::tiny());
        let mut pipeline = ClassifierPipeline::new(encoder, 2, 1e-2);

        let batch = make_batch(&[(vec![1, 2, 3], 0), (vec![4, 5, 6], 1)], 8);
        let result = pipeline.train_batch(&batch);

        assert!(result.avg_loss.is_finite());
        assert!(result.avg_loss > 0.0);
        assert_eq!(result.total, 2);
        assert!(result.correct <= 2);
    }

    #[test]
    fn training_reduces_loss_on_a_tiny_task() {
        let encoder = Encoder::new(&EncoderConfig::tiny());
        let mut pipeline = ClassifierPipeline::new(encoder, 2, 1e-2);

        let batch = make_batch(
            &[
                (vec![1, 2, 3], 0),
                (vec![900, 901, 902], 1),
                (vec![4, 5, 6], 0),
                (vec![903, 904, 905], 1),
            ],
            8,
        );

        let first = pipeline.train_batch(&batch).avg_loss;
        let mut last = first;
        for _ in 0..30 {
            last = pipeline.train_batch(&batch).avg_loss;
        }

        assert!(
            last < first,
            "loss should decrease when overfitting one batch: first {first:.4}, last {last:.4}"
        );
    }

    #[test]
    fn forward_only_is_deterministic_and_mutation_free() {
        let encoder = Encoder::new(&EncoderConfig::tiny());
        let pipeline = ClassifierPipeline::new(encoder, 2, 1e-2);

        let ids = vec![7u32, 8, 9, 0];
        let mask = vec![1u8, 1, 1, 0];

        let weight_before = pipeline.head.weight.data().to_vec();
        let (loss_a, pred_a) = pipeline.forward_only(&ids, &mask, 1);
        let (loss_b, pred_b) = pipeline.forward_only(&ids, &mask, 1);

        assert_eq!(loss_a, loss_b);
        assert_eq!(pred_a, pred_b);
        assert!(pred_a < 2);
        assert_eq!(pipeline.head.weight.data().to_vec(), weight_before);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_label_panics() {
        let encoder = Encoder::new(&EncoderConfig::tiny());
        let pipeline = ClassifierPipeline::new(encoder, 2, 1e-2);
        let _ = pipeline.forward_only(&[1, 2], &[1, 1], 2);
    }

    #[test]
    fn softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, -1.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn argmax_picks_largest() {
        assert_eq!(argmax(&[0.1, 0.9]), 1);
        assert_eq!(argmax(&[0.9, 0.1]), 0);
        assert_eq!(argmax(&[0.5, 0.5]), 0);
    }
}
