//! meditrack-anomaly — Ensemble classifier that flags abnormal lab panels.
//!
//! A fixed roster of binary classifiers is trained on standardised
//! (hemoglobin, wbc, glucose) vectors labelled from the lab's abnormal flags.
//! Each model is fitted and evaluated independently; one model failing never
//! aborts its siblings.

pub mod classifier;
pub mod config;
pub mod engine;
pub mod evaluation;

pub use classifier::{Classifier, ModelError, ModelKind};
pub use config::AnomalyConfig;
pub use engine::{
    AnomalyEngine, AnomalyStatus, MetricsSummary, PredictionOutcome, TrainingReport, Verdict,
};
pub use evaluation::{AverageMetrics, ConfusionMatrix, ModelMetrics, ModelOutcome, Reliability};
