//! Hyperparameters for the classifier roster.

use meditrack_common::EngineError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyConfig {
    #[serde(default = "default_knn_neighbors")]
    pub knn_neighbors: usize,
    /// `None` grows the tree until every leaf is pure.
    #[serde(default)]
    pub tree_max_depth: Option<usize>,
    #[serde(default = "default_svm_c")]
    pub svm_c: f64,
    #[serde(default = "default_svm_tolerance")]
    pub svm_tolerance: f64,
    #[serde(default = "default_svm_max_passes")]
    pub svm_max_passes: usize,
    #[serde(default = "default_mlp_hidden_layers")]
    pub mlp_hidden_layers: Vec<usize>,
    #[serde(default = "default_mlp_max_iter")]
    pub mlp_max_iter: usize,
    #[serde(default = "default_mlp_learning_rate")]
    pub mlp_learning_rate: f64,
    #[serde(default = "default_mlp_alpha")]
    pub mlp_alpha: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_knn_neighbors()     -> usize      { 3 }
fn default_svm_c()             -> f64        { 1.0 }
fn default_svm_tolerance()     -> f64        { 1e-3 }
fn default_svm_max_passes()    -> usize      { 10 }
fn default_mlp_hidden_layers() -> Vec<usize> { vec![100, 50] }
fn default_mlp_max_iter()      -> usize      { 1000 }
fn default_mlp_learning_rate() -> f64        { 1e-3 }
fn default_mlp_alpha()         -> f64        { 1e-4 }
fn default_seed()              -> u64        { 42 }

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            knn_neighbors: default_knn_neighbors(),
            tree_max_depth: None,
            svm_c: default_svm_c(),
            svm_tolerance: default_svm_tolerance(),
            svm_max_passes: default_svm_max_passes(),
            mlp_hidden_layers: default_mlp_hidden_layers(),
            mlp_max_iter: default_mlp_max_iter(),
            mlp_learning_rate: default_mlp_learning_rate(),
            mlp_alpha: default_mlp_alpha(),
            seed: default_seed(),
        }
    }
}

impl AnomalyConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |msg: &str| Err(EngineError::InvalidInput(msg.to_string()));

        if self.knn_neighbors == 0 {
            return invalid("anomaly.knn_neighbors must be at least 1");
        }
        if self.tree_max_depth == Some(0) {
            return invalid("anomaly.tree_max_depth must be at least 1 when set");
        }
        if !(self.svm_c > 0.0) {
            return invalid("anomaly.svm_c must be positive");
        }
        if !(self.svm_tolerance > 0.0) {
            return invalid("anomaly.svm_tolerance must be positive");
        }
        if self.mlp_hidden_layers.is_empty() || self.mlp_hidden_layers.contains(&0) {
            return invalid("anomaly.mlp_hidden_layers must list at least one non-empty layer");
        }
        if self.mlp_max_iter == 0 {
            return invalid("anomaly.mlp_max_iter must be at least 1");
        }
        if !(self.mlp_learning_rate > 0.0) || self.mlp_alpha < 0.0 {
            return invalid("anomaly.mlp_learning_rate must be positive and mlp_alpha non-negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnomalyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.knn_neighbors, 3);
        assert_eq!(config.mlp_hidden_layers, vec![100, 50]);
    }

    #[test]
    fn test_zero_width_layer_rejected() {
        let config = AnomalyConfig { mlp_hidden_layers: vec![10, 0], ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialise_fills_defaults() {
        let config: AnomalyConfig = serde_json::from_str(r#"{ "knn_neighbors": 5 }"#).unwrap();
        assert_eq!(config.knn_neighbors, 5);
        assert_eq!(config.seed, 42);
        assert_eq!(config.tree_max_depth, None);
    }
}
