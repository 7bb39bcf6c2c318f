//! Gaussian naive Bayes.

use std::f64::consts::PI;

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

use super::{check_query_width, check_training_input, Classifier, ModelError};

/// Fraction of the largest feature variance added to every class variance.
const VAR_SMOOTHING: f64 = 1e-9;
/// Floor for the smoothing term when every feature is constant.
const MIN_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone)]
struct ClassModel {
    log_prior: f64,
    mean: Array1<f64>,
    var: Array1<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct GaussianNaiveBayes {
    /// Indexed by label; `None` for a label absent from training.
    classes: Option<[Option<ClassModel>; 2]>,
    n_features: usize,
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joint log-likelihood per label; absent labels get `-inf`.
    fn joint_log_likelihood(&self, x: &ArrayView1<f64>) -> Result<[f64; 2], ModelError> {
        let classes = self.classes.as_ref().ok_or(ModelError::NotFitted)?;
        check_query_width(self.n_features, x)?;

        let mut jll = [f64::NEG_INFINITY; 2];
        for (slot, class) in jll.iter_mut().zip(classes.iter()) {
            let Some(class) = class else { continue };
            let log_norm: f64 = class.var.iter().map(|v| (2.0 * PI * v).ln()).sum();
            let mahalanobis: f64 = x
                .iter()
                .zip(class.mean.iter().zip(class.var.iter()))
                .map(|(xi, (m, v))| (xi - m).powi(2) / v)
                .sum();
            *slot = class.log_prior - 0.5 * log_norm - 0.5 * mahalanobis;
        }

        if jll.iter().any(|v| v.is_nan()) {
            return Err(ModelError::Numerical("log-likelihood is NaN".to_string()));
        }
        Ok(jll)
    }
}

impl Classifier for GaussianNaiveBayes {
    fn fit(&mut self, x: &ArrayView2<f64>, y: &[u8]) -> Result<(), ModelError> {
        check_training_input(x, y)?;

        let max_var = x
            .var_axis(Axis(0), 0.0)
            .iter()
            .cloned()
            .fold(0.0_f64, f64::max);
        let epsilon = (VAR_SMOOTHING * max_var).max(MIN_EPSILON);

        let n = x.nrows() as f64;
        let mut classes: [Option<ClassModel>; 2] = [None, None];
        for (label, slot) in classes.iter_mut().enumerate() {
            let rows: Vec<usize> = (0..y.len()).filter(|&i| usize::from(y[i]) == label).collect();
            if rows.is_empty() {
                continue;
            }
            let subset = x.select(Axis(0), &rows);
            let mean = subset
                .mean_axis(Axis(0))
                .ok_or_else(|| ModelError::Numerical("empty class".to_string()))?;
            let var = subset.var_axis(Axis(0), 0.0) + epsilon;
            *slot = Some(ClassModel {
                log_prior: (rows.len() as f64 / n).ln(),
                mean,
                var,
            });
        }

        self.n_features = x.ncols();
        self.classes = Some(classes);
        Ok(())
    }

    fn predict(&self, x: &ArrayView1<f64>) -> Result<u8, ModelError> {
        let jll = self.joint_log_likelihood(x)?;
        Ok(u8::from(jll[1] > jll[0]))
    }

    fn predict_proba(&self, x: &ArrayView1<f64>) -> Option<Result<[f64; 2], ModelError>> {
        Some(self.joint_log_likelihood(x).map(|jll| {
            // log-sum-exp keeps tiny likelihoods from underflowing to 0/0.
            let max = jll[0].max(jll[1]);
            let e0 = (jll[0] - max).exp();
            let e1 = (jll[1] - max).exp();
            [e0 / (e0 + e1), e1 / (e0 + e1)]
        }))
    }
}
