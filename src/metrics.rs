//! Classification metrics: confusion matrix and per-class precision,
//! recall, F1.

/// Confusion matrix; element `[i][j]` counts samples with true label `i`
/// predicted as `j`.
#[derive(Debug, Clone)]
pub struct ConfusionMatrix {
    matrix: Vec<Vec<usize>>,
    n_classes: usize,
}

impl ConfusionMatrix {
    /// Empty matrix over `n_classes` classes.
    #[must_use]
    pub fn new(n_classes: usize) -> Self {
        Self {
            matrix: vec![vec![0; n_classes]; n_classes],
            n_classes,
        }
    }

    /// Build from prediction/truth pairs over `n_classes` classes.
    ///
    /// Panics if the slices differ in length or any label is out of range.
    #[must_use]
    pub fn from_predictions(y_pred: &[usize], y_true: &[usize], n_classes: usize) -> Self {
        assert_eq!(
            y_pred.len(),
            y_true.len(),
            "predictions and targets must have equal length"
        );

        let mut cm = Self::new(n_classes);
        for (&pred, &truth) in y_pred.iter().zip(y_true.iter()) {
            assert!(pred < n_classes, "predicted class {pred} out of range");
            assert!(truth < n_classes, "true class {truth} out of range");
            cm.matrix[truth][pred] += 1;
        }
        cm
    }

    /// Number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// The raw counts.
    #[must_use]
    pub fn matrix(&self) -> &[Vec<usize>] {
        &self.matrix
    }

    /// Count at `[true_label][predicted_label]`.
    #[must_use]
    pub fn get(&self, true_label: usize, predicted: usize) -> usize {
        self.matrix[true_label][predicted]
    }

    /// Fraction of samples on the diagonal; 0 for an empty matrix.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let total: usize = self.matrix.iter().flatten().sum();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.n_classes).map(|i| self.matrix[i][i]).sum();
        correct as f64 / total as f64
    }

    fn true_positives(&self, class: usize) -> usize {
        self.matrix[class][class]
    }

    fn false_positives(&self, class: usize) -> usize {
        (0..self.n_classes)
            .filter(|&i| i != class)
            .map(|i| self.matrix[i][class])
            .sum()
    }

    fn false_negatives(&self, class: usize) -> usize {
        (0..self.n_classes)
            .filter(|&j| j != class)
            .map(|j| self.matrix[class][j])
            .sum()
    }
}

/// Per-class precision, recall, F1, and support.
///
/// A class with no predicted samples gets precision 0; one with no true
/// samples gets recall 0 (the zero-division convention of the usual
/// classification-report tooling).
#[derive(Debug, Clone)]
pub struct ClassMetrics {
    /// Per-class precision in [0, 1].
    pub precision: Vec<f64>,
    /// Per-class recall in [0, 1].
    pub recall: Vec<f64>,
    /// Per-class F1 in [0, 1].
    pub f1: Vec<f64>,
    /// Number of true samples per class.
    pub support: Vec<usize>,
}

impl ClassMetrics {
    /// Derive metrics from a confusion matrix.
    #[must_use]
    pub fn from_confusion_matrix(cm: &ConfusionMatrix) -> Self {
        let n = cm.n_classes();
        let mut precision = Vec::with_capacity(n);
        let mut recall = Vec::with_capacity(n);
        let mut f1 = Vec::with_capacity(n);
        let mut support = Vec::with_capacity(n);

        for class in 0..n {
            let tp = cm.true_positives(class) as f64;
            let fp = cm.false_positives(class) as f64;
            let fn_ = cm.false_negatives(class) as f64;

            let p = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
            let r = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
            let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };

            precision.push(p);
            recall.push(r);
            f1.push(f);
            support.push((tp + fn_) as usize);
        }

        Self {
            precision,
            recall,
            f1,
            support,
        }
    }

    /// Unweighted mean of a per-class metric.
    #[must_use]
    pub fn macro_avg(values: &[f64]) -> f64 {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    }

    /// Support-weighted mean of a per-class metric.
    #[must_use]
    pub fn weighted_avg(values: &[f64], support: &[usize]) -> f64 {
        let total: usize = support.iter().sum();
        if total == 0 {
            return 0.0;
        }
        values
            .iter()
            .zip(support.iter())
            .map(|(&v, &s)| v * s as f64)
            .sum::<f64>()
            / total as f64
    }
}
