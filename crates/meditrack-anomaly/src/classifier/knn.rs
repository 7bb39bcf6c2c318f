//! k-nearest-neighbour classifier with a uniform majority vote.

use meditrack_common::euclidean_distance;
use ndarray::{Array2, ArrayView1, ArrayView2};

use super::{check_query_width, check_training_input, Classifier, ModelError};

#[derive(Debug, Clone)]
pub struct KnnClassifier {
    k: usize,
    samples: Option<Array2<f64>>,
    labels: Vec<u8>,
}

impl KnnClassifier {
    pub fn new(k: usize) -> Self {
        Self { k, samples: None, labels: Vec::new() }
    }

    /// Fraction of the `k` nearest training samples labelled abnormal.
    fn abnormal_vote(&self, x: &ArrayView1<f64>) -> Result<f64, ModelError> {
        let samples = self.samples.as_ref().ok_or(ModelError::NotFitted)?;
        check_query_width(samples.ncols(), x)?;

        let mut distances: Vec<(usize, f64)> = samples
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| (i, euclidean_distance(&row, x)))
            .collect();
        // Stable sort: equal distances keep training order.
        distances.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let abnormal = distances
            .iter()
            .take(self.k)
            .filter(|(i, _)| self.labels[*i] == 1)
            .count();
        Ok(abnormal as f64 / self.k as f64)
    }
}

impl Classifier for KnnClassifier {
    fn fit(&mut self, x: &ArrayView2<f64>, y: &[u8]) -> Result<(), ModelError> {
        check_training_input(x, y)?;
        if self.k == 0 {
            return Err(ModelError::InvalidParameter {
                name: "n_neighbors",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.k > x.nrows() {
            return Err(ModelError::InvalidParameter {
                name: "n_neighbors",
                reason: format!(
                    "expected n_neighbors <= n_samples, got n_neighbors = {}, n_samples = {}",
                    self.k,
                    x.nrows()
                ),
            });
        }

        self.samples = Some(x.to_owned());
        self.labels = y.to_vec();
        Ok(())
    }

    fn predict(&self, x: &ArrayView1<f64>) -> Result<u8, ModelError> {
        // A tied vote goes to the lower label.
        Ok(u8::from(self.abnormal_vote(x)? > 0.5))
    }

    fn predict_proba(&self, x: &ArrayView1<f64>) -> Option<Result<[f64; 2], ModelError>> {
        Some(self.abnormal_vote(x).map(|p| [1.0 - p, p]))
    }
}
