//! Similarity engine settings.

use meditrack_common::EngineError;
use serde::{Deserialize, Serialize};

use crate::weights::ScoreWeights;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Minimum providers required to train, and the index's default
    /// neighbour count.
    #[serde(default = "default_n_neighbors")]
    pub n_neighbors: usize,
    /// `k` used by similar-provider queries that do not name one.
    #[serde(default = "default_similar_k")]
    pub default_similar_k: usize,
    #[serde(default)]
    pub weights: ScoreWeights,
}

fn default_n_neighbors() -> usize { 3 }
fn default_similar_k()   -> usize { 3 }

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            n_neighbors: default_n_neighbors(),
            default_similar_k: default_similar_k(),
            weights: ScoreWeights::default(),
        }
    }
}

impl SimilarityConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.n_neighbors == 0 {
            return Err(EngineError::InvalidInput(
                "providers.n_neighbors must be at least 1".to_string(),
            ));
        }
        if !self.weights.validate() {
            return Err(EngineError::InvalidInput(
                "providers.weights caps must sum to 100 with positive baselines".to_string(),
            ));
        }
        Ok(())
    }
}
