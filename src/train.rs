//! The training loop.
//!
//! For each epoch: request a freshly reshuffled batch pass, run
//! forward/loss/backward/step per batch, report the mean training loss,
//! then synchronously evaluate on the validation set before the next epoch
//! begins. The loop terminates after the configured epoch count; there is
//! no early stopping and no mid-run checkpointing, so a crash loses the run.

use crate::dataset::BatchLoader;
use crate::eval::{evaluate, EvalReport};
use crate::pipeline::ClassifierPipeline;

/// Training hyperparameters.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Full passes over the training set.
    pub epochs: usize,
    /// Examples per optimizer step.
    pub batch_size: usize,
    /// AdamW learning rate.
    pub learning_rate: f32,
    /// Seed for the split and the per-epoch shuffle.
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 3,
            batch_size: 8,
            learning_rate: 2e-5,
            seed: 42,
        }
    }
}

/// Losses and validation metrics recorded for one epoch.
#[derive(Debug, Clone)]
pub struct EpochMetrics {
    /// Epoch number (0-indexed).
    pub epoch: usize,
    /// Mean training loss over the epoch's batches.
    pub train_loss: f32,
    /// Mean validation loss from the inline evaluation.
    pub val_loss: f32,
    /// Validation accuracy in [0, 1].
    pub val_accuracy: f64,
}

/// Outcome of the full run.
#[derive(Debug, Clone)]
pub struct TrainResult {
    /// Per-epoch metrics, one entry per completed epoch.
    pub epoch_metrics: Vec<EpochMetrics>,
}

impl TrainResult {
    /// Training loss per epoch, in order.
    #[must_use]
    pub fn train_losses(&self) -> Vec<f32> {
        self.epoch_metrics.iter().map(|m| m.train_loss).collect()
    }

    /// Validation loss per epoch, in order.
    #[must_use]
    pub fn val_losses(&self) -> Vec<f32> {
        self.epoch_metrics.iter().map(|m| m.val_loss).collect()
    }
}

/// Drives the epoch loop over a pipeline and two batch loaders.
pub struct Trainer<'a> {
    pipeline: ClassifierPipeline,
    train_loader: BatchLoader<'a>,
    val_loader: BatchLoader<'a>,
    label_names: Vec<String>,
    epochs: usize,
}

impl<'a> Trainer<'a> {
    /// Assemble a trainer.
    ///
    /// `train_loader` should shuffle; `val_loader` must not (the evaluation
    /// contract is a deterministic in-order pass).
    #[must_use]
    pub fn new(
        pipeline: ClassifierPipeline,
        train_loader: BatchLoader<'a>,
        val_loader: BatchLoader<'a>,
        label_names: &[&str],
        epochs: usize,
    ) -> Self {
        Self {
            pipeline,
            train_loader,
            val_loader,
            label_names: label_names.iter().map(|s| (*s).to_string()).collect(),
            epochs,
        }
    }

    /// Run the configured number of epochs.
    ///
    /// Prints the per-epoch training loss, validation accuracy, and the
    /// classification report; returns the recorded metrics. With zero
    /// epochs nothing runs, nothing prints, and the model is untouched.
    pub fn fit(&mut self) -> TrainResult {
        let mut epoch_metrics = Vec::with_capacity(self.epochs);

        for epoch in 0..self.epochs {
            let mut loss_sum = 0.0f32;
            let mut num_batches = 0usize;

            for batch in self.train_loader.epoch_batches(epoch) {
                let result = self.pipeline.train_batch(&batch);
                loss_sum += result.avg_loss;
                num_batches += 1;
            }

            let train_loss = if num_batches > 0 {
                loss_sum / num_batches as f32
            } else {
                0.0
            };
            println!("Epoch {}, Loss: {train_loss:.4}", epoch + 1);

            let report = self.validate();
            println!("Validation Accuracy: {:.4}", report.accuracy);
            println!("{}", report.to_report());

            epoch_metrics.push(EpochMetrics {
                epoch,
                train_loss,
                val_loss: report.avg_loss,
                val_accuracy: report.accuracy,
            });
        }

        TrainResult { epoch_metrics }
    }

    /// Evaluate the current model on the validation loader.
    #[must_use]
    pub fn validate(&self) -> EvalReport {
        let names: Vec<&str> = self.label_names.iter().map(String::as_str).collect();
        evaluate(&self.pipeline, &self.val_loader, &names)
    }

    /// The underlying pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &ClassifierPipeline {
        &self.pipeline
    }

    /// Surrender the pipeline (for persistence after training).
    #[must_use]
    pub fn into_pipeline(self) -> ClassifierPipeline {
        self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::EncodedDataset;
    use crate::model::{Encoder, EncoderConfig};
    use crate::tokenizer::Encoding;

    fn make_dataset(n: usize) -> EncodedDataset {
        let encodings: Vec<Encoding> = (0..n)
            .map(|i| Encoding {
                input_ids: vec![(i as u32 * 31) % 900, 2, 7, 0],
                attention_mask: vec![1, 1, 1, 0],
            })
            .collect();
        let labels: Vec<usize> = (0..n).map(|i| i % 2).collect();
        EncodedDataset::new(encodings, labels)
    }

    fn make_pipeline() -> ClassifierPipeline {
        ClassifierPipeline::new(Encoder::new(&EncoderConfig::tiny()), 2, 1e-3)
    }

    #[test]
    fn zero_epochs_changes_nothing_and_records_nothing() {
        let train = make_dataset(8);
        let val = make_dataset(4);
        let pipeline = make_pipeline();
        let weight_before = pipeline.head.weight.data().to_vec();
        let bias_before = pipeline.head.bias.data().to_vec();

        let mut trainer = Trainer::new(
            pipeline,
            BatchLoader::new(&train, 4, true, 42),
            BatchLoader::new(&val, 4, false, 42),
            &["a", "b"],
            0,
        );
        let result = trainer.fit();

        assert!(result.epoch_metrics.is_empty());
        assert!(result.train_losses().is_empty());
        let pipeline = trainer.into_pipeline();
        assert_eq!(pipeline.head.weight.data().to_vec(), weight_before);
        assert_eq!(pipeline.head.bias.data().to_vec(), bias_before);
    }

    #[test]
    fn records_one_metric_entry_per_epoch() {
        let train = make_dataset(8);
        let val = make_dataset(4);

        let mut trainer = Trainer::new(
            make_pipeline(),
            BatchLoader::new(&train, 4, true, 42),
            BatchLoader::new(&val, 4, false, 42),
            &["a", "b"],
            3,
        );
        let result = trainer.fit();

        assert_eq!(result.epoch_metrics.len(), 3);
        assert_eq!(result.train_losses().len(), 3);
        assert_eq!(result.val_losses().len(), 3);
        for (i, m) in result.epoch_metrics.iter().enumerate() {
            assert_eq!(m.epoch, i);
            assert!(m.train_loss.is_finite());
            assert!(m.val_loss.is_finite());
            assert!((0.0..=1.0).contains(&m.val_accuracy));
        }
    }

    #[test]
    fn validate_matches_standalone_evaluate() {
        let train = make_dataset(6);
        let val = make_dataset(4);

        let trainer = Trainer::new(
            make_pipeline(),
            BatchLoader::new(&train, 4, true, 42),
            BatchLoader::new(&val, 4, false, 42),
            &["a", "b"],
            1,
        );

        let from_trainer = trainer.validate();
        let standalone = evaluate(
            trainer.pipeline(),
            &BatchLoader::new(&val, 4, false, 42),
            &["a", "b"],
        );
        assert_eq!(from_trainer.accuracy, standalone.accuracy);
        assert_eq!(from_trainer.avg_loss, standalone.avg_loss);
    }
}
