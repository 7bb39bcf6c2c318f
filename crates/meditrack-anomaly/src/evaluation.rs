//! In-sample evaluation of each fitted model and the ensemble summary.
//!
//! Metrics are computed by re-predicting the training batch. Divisions by
//! zero yield 0 rather than NaN.

use meditrack_common::round_to;
use serde::{Deserialize, Serialize};

/// Decimal places kept for every reported ratio.
pub const METRIC_PRECISION: i32 = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &[u8], y_pred: &[u8]) -> Self {
        let mut cm = Self::default();
        for (&actual, &predicted) in y_true.iter().zip(y_pred) {
            match (actual == 1, predicted == 1) {
                (true, true) => cm.true_positives += 1,
                (false, true) => cm.false_positives += 1,
                (false, false) => cm.true_negatives += 1,
                (true, false) => cm.false_negatives += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub confusion_matrix: ConfusionMatrix,
}

impl ModelMetrics {
    /// Score `y_pred` against `y_true`, abnormal (1) being the positive class.
    pub fn evaluate(y_true: &[u8], y_pred: &[u8]) -> Self {
        let cm = ConfusionMatrix::from_predictions(y_true, y_pred);
        let tp = cm.true_positives;

        let accuracy = ratio(tp + cm.true_negatives, cm.total());
        let precision = ratio(tp, tp + cm.false_positives);
        let recall = ratio(tp, tp + cm.false_negatives);
        let f1_score = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Self {
            accuracy: round_to(accuracy, METRIC_PRECISION),
            precision: round_to(precision, METRIC_PRECISION),
            recall: round_to(recall, METRIC_PRECISION),
            f1_score: round_to(f1_score, METRIC_PRECISION),
            confusion_matrix: cm,
        }
    }
}

/// Result slot of one model after training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelOutcome {
    Trained(ModelMetrics),
    Failed { error: String },
}

impl ModelOutcome {
    pub fn metrics(&self) -> Option<&ModelMetrics> {
        match self {
            ModelOutcome::Trained(metrics) => Some(metrics),
            ModelOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

impl AverageMetrics {
    /// Arithmetic mean over the given metrics; `None` for an empty input.
    pub fn mean<'a>(metrics: impl IntoIterator<Item = &'a ModelMetrics>) -> Option<Self> {
        let mut sum = [0.0; 4];
        let mut count = 0usize;
        for m in metrics {
            sum[0] += m.accuracy;
            sum[1] += m.precision;
            sum[2] += m.recall;
            sum[3] += m.f1_score;
            count += 1;
        }
        if count == 0 {
            return None;
        }
        let avg = |total: f64| round_to(total / count as f64, METRIC_PRECISION);
        Some(Self {
            accuracy: avg(sum[0]),
            precision: avg(sum[1]),
            recall: avg(sum[2]),
            f1_score: avg(sum[3]),
        })
    }
}

/// Ensemble quality bucket derived from mean F1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reliability {
    High,
    Medium,
    Low,
}

impl Reliability {
    pub fn from_mean_f1(f1: f64) -> Self {
        if f1 > 0.75 {
            Reliability::High
        } else if f1 > 0.6 {
            Reliability::Medium
        } else {
            Reliability::Low
        }
    }
}
