//! Evaluation: a gradient-free pass over the validation set.

use crate::dataset::BatchLoader;
use crate::metrics::{ClassMetrics, ConfusionMatrix};
use crate::pipeline::ClassifierPipeline;

/// Evaluation results: accuracy, mean loss, and per-class metrics.
///
/// A pure function of model state and validation data: evaluating twice on
/// an unchanged model yields identical reports.
#[derive(Debug, Clone)]
pub struct EvalReport {
    /// Overall accuracy in [0, 1].
    pub accuracy: f64,
    /// Mean cross-entropy loss.
    pub avg_loss: f32,
    /// Per-class precision in [0, 1].
    pub precision: Vec<f64>,
    /// Per-class recall in [0, 1].
    pub recall: Vec<f64>,
    /// Per-class F1 in [0, 1].
    pub f1: Vec<f64>,
    /// True samples per class.
    pub support: Vec<usize>,
    /// Confusion counts, `[true][predicted]`.
    pub confusion_matrix: Vec<Vec<usize>>,
    /// Examples evaluated.
    pub total_samples: usize,
    /// Class names for the report table.
    pub label_names: Vec<String>,
}

/// Run the model over every validation batch in order, without gradients.
///
/// Collects argmax prediction and true label per example, then derives
/// accuracy and the per-class report.
#[must_use]
pub fn evaluate(
    pipeline: &ClassifierPipeline,
    loader: &BatchLoader<'_>,
    label_names: &[&str],
) -> EvalReport {
    let num_classes = pipeline.num_classes();

    let mut y_true = Vec::new();
    let mut y_pred = Vec::new();
    let mut loss_sum = 0.0f32;

    for batch in loader.epoch_batches(0) {
        for row in 0..batch.batch_size() {
            let input_ids = batch.input_ids.row(row).to_vec();
            let mask = batch.attention_mask.row(row).to_vec();
            let label = batch.labels[row];

            let (loss, predicted) = pipeline.forward_only(&input_ids, &mask, label);
            loss_sum += loss;
            y_true.push(label);
            y_pred.push(predicted);
        }
    }

    let total = y_true.len();
    let cm = ConfusionMatrix::from_predictions(&y_pred, &y_true, num_classes);
    let metrics = ClassMetrics::from_confusion_matrix(&cm);

    EvalReport {
        accuracy: cm.accuracy(),
        avg_loss: if total > 0 {
            loss_sum / total as f32
        } else {
            0.0
        },
        precision: metrics.precision,
        recall: metrics.recall,
        f1: metrics.f1,
        support: metrics.support,
        confusion_matrix: cm.matrix().to_vec(),
        total_samples: total,
        label_names: label_names.iter().map(|s| (*s).to_string()).collect(),
    }
}

impl EvalReport {
    /// Render the per-class table in the usual classification-report layout.
    #[must_use]
    pub fn to_report(&self) -> String {
        let n = self.precision.len();
        let mut out = String::new();

        out.push_str(&format!(
            "{:>22} {:>10} {:>10} {:>10} {:>10}\n",
            "", "precision", "recall", "f1-score", "support"
        ));
        out.push_str(&format!("{}\n", "-".repeat(66)));

        for i in 0..n {
            let name = self
                .label_names
                .get(i)
                .map_or_else(|| format!("class {i}"), Clone::clone);
            out.push_str(&format!(
                "{:>22} {:>10.4} {:>10.4} {:>10.4} {:>10}\n",
                name, self.precision[i], self.recall[i], self.f1[i], self.support[i],
            ));
        }

        out.push_str(&format!("{}\n", "-".repeat(66)));

        let total_support: usize = self.support.iter().sum();
        out.push_str(&format!(
            "{:>22} {:>10.4} {:>10.4} {:>10.4} {:>10}\n",
            "macro avg",
            ClassMetrics::macro_avg(&self.precision),
            ClassMetrics::macro_avg(&self.recall),
            ClassMetrics::macro_avg(&self.f1),
            total_support,
        ));
        out.push_str(&format!(
            "{:>22} {:>10.4} {:>10.4} {:>10.4} {:>10}\n",
            "weighted avg",
            ClassMetrics::weighted_avg(&self.precision, &self.support),
            ClassMetrics::weighted_avg(&self.recall, &self.support),
            ClassMetrics::weighted_avg(&self.f1, &self.support),
            total_support,
        ));

        out.push_str(&format!("\nAccuracy: {:.4}\n", self.accuracy));
        out.push_str(&format!("Avg loss: {:.4}\n", self.avg_loss));
        out.push_str(&format!("Samples:  {}\n", self.total_samples));

        out
    }
}
