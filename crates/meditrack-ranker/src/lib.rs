//! meditrack-ranker — Provider performance scoring and peer similarity.
//!
//! Providers are profiled on six performance metrics. The scorer turns those
//! metrics into a capped composite score and a letter grade; the similarity
//! engine indexes standardised metric vectors for nearest-neighbour queries.

pub mod config;
pub mod engine;
pub mod neighbors;
pub mod scorer;
pub mod weights;

pub use config::SimilarityConfig;
pub use engine::{
    ProviderProfile, ProviderSimilarityEngine, ProviderStatus, Ranking, SimilarProvider,
    SimilarProviders, TrainingReport,
};
pub use neighbors::NearestNeighbors;
pub use scorer::{composite_score, Grade, RankedProvider, ScoreBreakdown};
pub use weights::ScoreWeights;
