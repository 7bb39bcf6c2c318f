//! The classifier roster and the trait every estimator implements.

pub mod knn;
pub mod mlp;
pub mod naive_bayes;
pub mod svm;
pub mod tree;

use std::fmt;
use std::str::FromStr;

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AnomalyConfig;

pub use knn::KnnClassifier;
pub use mlp::MlpClassifier;
pub use naive_bayes::GaussianNaiveBayes;
pub use svm::SvmClassifier;
pub use tree::DecisionTreeClassifier;

/// Failure of a single estimator. Recorded in that estimator's slot only.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("model is not fitted")]
    NotFitted,

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("invalid training input: {0}")]
    InvalidInput(String),

    #[error("numerical failure: {0}")]
    Numerical(String),
}

/// A binary classifier over standardised feature vectors.
///
/// Labels are `0` (normal) and `1` (abnormal).
pub trait Classifier: Send + Sync {
    fn fit(&mut self, x: &ArrayView2<f64>, y: &[u8]) -> Result<(), ModelError>;

    fn predict(&self, x: &ArrayView1<f64>) -> Result<u8, ModelError>;

    /// `[p(normal), p(abnormal)]`, or `None` when the estimator has no
    /// probability model.
    fn predict_proba(&self, _x: &ArrayView1<f64>) -> Option<Result<[f64; 2], ModelError>> {
        None
    }
}

/// Shape and label checks shared by every `fit`.
pub(crate) fn check_training_input(x: &ArrayView2<f64>, y: &[u8]) -> Result<(), ModelError> {
    if x.nrows() == 0 {
        return Err(ModelError::InvalidInput("no samples".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(ModelError::InvalidInput(format!(
            "{} samples but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if let Some(bad) = y.iter().find(|&&label| label > 1) {
        return Err(ModelError::InvalidInput(format!("label {bad} is not binary")));
    }
    Ok(())
}

pub(crate) fn check_query_width(expected: usize, x: &ArrayView1<f64>) -> Result<(), ModelError> {
    if x.len() != expected {
        return Err(ModelError::InvalidInput(format!(
            "expected {expected} features, got {}",
            x.len()
        )));
    }
    Ok(())
}

/// Identifier of each roster slot. Declaration order is the fixed iteration
/// order used for training, reporting and best-model tie breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Knn,
    DecisionTree,
    NaiveBayes,
    Svm,
    NeuralNetwork,
}

impl ModelKind {
    pub const ALL: [ModelKind; 5] = [
        ModelKind::Knn,
        ModelKind::DecisionTree,
        ModelKind::NaiveBayes,
        ModelKind::Svm,
        ModelKind::NeuralNetwork,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Knn => "knn",
            ModelKind::DecisionTree => "decision_tree",
            ModelKind::NaiveBayes => "naive_bayes",
            ModelKind::Svm => "svm",
            ModelKind::NeuralNetwork => "neural_network",
        }
    }

    /// A fresh, unfitted estimator for this slot.
    pub fn build(&self, config: &AnomalyConfig) -> Box<dyn Classifier> {
        match self {
            ModelKind::Knn => Box::new(KnnClassifier::new(config.knn_neighbors)),
            ModelKind::DecisionTree => Box::new(DecisionTreeClassifier::new(config.tree_max_depth)),
            ModelKind::NaiveBayes => Box::new(GaussianNaiveBayes::new()),
            ModelKind::Svm => Box::new(SvmClassifier::new(
                config.svm_c,
                config.svm_tolerance,
                config.svm_max_passes,
            )),
            ModelKind::NeuralNetwork => Box::new(MlpClassifier::new(
                config.mlp_hidden_layers.clone(),
                config.mlp_learning_rate,
                config.mlp_alpha,
                config.mlp_max_iter,
                config.seed,
            )),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown model `{s}`"))
    }
}
