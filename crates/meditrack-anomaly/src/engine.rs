//! The anomaly ensemble engine: train, predict, metrics, status.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use meditrack_common::{parse_batch, ConsultationRecord, EngineError, Result, StandardScaler};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::classifier::{Classifier, ModelError, ModelKind};
use crate::config::AnomalyConfig;
use crate::evaluation::{AverageMetrics, ModelMetrics, ModelOutcome, Reliability};

const ENGINE_NAME: &str = "Models";

/// Confidence reported by estimators without a probability model.
pub const NEUTRAL_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub results: BTreeMap<ModelKind, ModelOutcome>,
    /// Usable consultations the ensemble was fitted on.
    pub samples: usize,
    /// Raw records dropped as unusable.
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_abnormal: bool,
    /// 0 = normal, 1 = abnormal.
    pub prediction: u8,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionOutcome {
    Verdict(Verdict),
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub models: BTreeMap<ModelKind, ModelOutcome>,
    /// `None` when no model trained successfully.
    pub average_metrics: Option<AverageMetrics>,
    pub best_model: Option<ModelKind>,
    pub reliability_level: Reliability,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyStatus {
    pub trained: bool,
    pub models: Vec<ModelKind>,
    /// Feature width the fitted normalizer expects; 0 when untrained.
    pub data_points: usize,
    pub trained_at: Option<DateTime<Utc>>,
}

/// Everything derived from one training batch. Replaced as a whole.
struct FittedEnsemble {
    scaler: StandardScaler,
    /// Roster order. A slot whose fit failed keeps the failure message.
    models: Vec<(ModelKind, std::result::Result<Box<dyn Classifier>, String>)>,
    results: BTreeMap<ModelKind, ModelOutcome>,
    trained_at: DateTime<Utc>,
}

impl FittedEnsemble {
    fn standardise(&self, features: &[f64]) -> Result<Array1<f64>> {
        if let Some(bad) = features.iter().find(|v| !v.is_finite()) {
            return Err(EngineError::InvalidInput(format!("feature value {bad} is not finite")));
        }
        let raw = Array1::from(features.to_vec());
        self.scaler.transform(&raw.view())
    }

    fn predict(&self, features: &[f64]) -> Result<BTreeMap<ModelKind, PredictionOutcome>> {
        let x = self.standardise(features)?;
        let x = x.view();
        Ok(self
            .models
            .iter()
            .map(|(kind, slot)| {
                let outcome = match slot {
                    Ok(model) => match verdict(model.as_ref(), &x) {
                        Ok(v) => PredictionOutcome::Verdict(v),
                        Err(err) => PredictionOutcome::Failed { error: err.to_string() },
                    },
                    Err(error) => PredictionOutcome::Failed { error: error.clone() },
                };
                (*kind, outcome)
            })
            .collect())
    }
}

pub struct AnomalyEngine {
    config: AnomalyConfig,
    state: Option<FittedEnsemble>,
}

impl Default for AnomalyEngine {
    fn default() -> Self {
        Self::new(AnomalyConfig::default())
    }
}

fn in_sample_predictions(
    model: &dyn Classifier,
    x: &ArrayView2<f64>,
) -> std::result::Result<Vec<u8>, ModelError> {
    x.rows().into_iter().map(|row| model.predict(&row)).collect()
}

fn verdict(model: &dyn Classifier, x: &ArrayView1<f64>) -> std::result::Result<Verdict, ModelError> {
    let prediction = model.predict(x)?;
    let confidence = match model.predict_proba(x) {
        Some(proba) => {
            let [p0, p1] = proba?;
            p0.max(p1)
        }
        None => NEUTRAL_CONFIDENCE,
    };
    Ok(Verdict {
        is_abnormal: prediction == 1,
        prediction,
        confidence,
    })
}

impl AnomalyEngine {
    pub fn new(config: AnomalyConfig) -> Self {
        Self { config, state: None }
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.state.is_some()
    }

    fn fitted(&self) -> Result<&FittedEnsemble> {
        self.state.as_ref().ok_or(EngineError::NotTrained(ENGINE_NAME))
    }

    /// Fit the normalizer and every roster model on the usable records of
    /// `raw`. On error the previous fitted state is left untouched.
    pub fn train(&mut self, raw: &[Value]) -> Result<TrainingReport> {
        let batch = parse_batch::<ConsultationRecord>(raw);
        let samples = batch.records.len();
        if samples < 2 {
            return Err(EngineError::InsufficientData(format!(
                "need at least 2 usable consultations, got {samples}"
            )));
        }

        let labels: Vec<u8> = batch.records.iter().map(ConsultationRecord::label).collect();
        let abnormal = labels.iter().filter(|&&label| label == 1).count();
        if abnormal == 0 || abnormal == samples {
            return Err(EngineError::InsufficientData(
                "all usable consultations share one label; both normal and abnormal examples are required"
                    .to_string(),
            ));
        }

        let width = ConsultationRecord::FEATURES.len();
        let raw_x = Array2::from_shape_fn((samples, width), |(r, c)| batch.records[r].features()[c]);

        info!(
            samples,
            dropped = batch.dropped,
            abnormal,
            normal = samples - abnormal,
            "training anomaly ensemble"
        );
        for (name, column) in ConsultationRecord::FEATURES.iter().zip(raw_x.columns()) {
            let min = column.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = column.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            info!(feature = *name, min, max, "feature range");
        }

        let scaler = StandardScaler::fit(&raw_x.view())?;
        let x = scaler.transform_batch(&raw_x.view())?;

        let mut models = Vec::with_capacity(ModelKind::ALL.len());
        let mut results = BTreeMap::new();
        for kind in ModelKind::ALL {
            let mut model = kind.build(&self.config);
            let fitted = model
                .fit(&x.view(), &labels)
                .and_then(|()| in_sample_predictions(model.as_ref(), &x.view()));

            match fitted {
                Ok(predicted) => {
                    let metrics = ModelMetrics::evaluate(&labels, &predicted);
                    debug!(model = %kind, f1 = metrics.f1_score, "model trained");
                    results.insert(kind, ModelOutcome::Trained(metrics));
                    models.push((kind, Ok(model)));
                }
                Err(err) => {
                    warn!(model = %kind, error = %err, "model failed to train");
                    let error = err.to_string();
                    results.insert(kind, ModelOutcome::Failed { error: error.clone() });
                    models.push((kind, Err(error)));
                }
            }
        }

        self.state = Some(FittedEnsemble {
            scaler,
            models,
            results: results.clone(),
            trained_at: Utc::now(),
        });

        Ok(TrainingReport {
            results,
            samples,
            dropped: batch.dropped,
        })
    }

    /// Single-value prediction.
    ///
    /// Only meaningful for a normalizer fitted on one feature; the ensemble is
    /// always trained on three, so this reports a dimension mismatch instead
    /// of guessing how one number maps onto three features.
    pub fn predict(&self, value: f64) -> Result<BTreeMap<ModelKind, PredictionOutcome>> {
        self.fitted()?.predict(&[value])
    }

    /// Per-model verdicts for one (hemoglobin, wbc, glucose) vector.
    pub fn predict_multi_feature(
        &self,
        features: &[f64],
    ) -> Result<BTreeMap<ModelKind, PredictionOutcome>> {
        self.fitted()?.predict(features)
    }

    pub fn get_metrics(&self) -> Result<MetricsSummary> {
        let state = self.fitted()?;

        let trained: Vec<(ModelKind, &ModelMetrics)> = state
            .results
            .iter()
            .filter_map(|(kind, outcome)| outcome.metrics().map(|m| (*kind, m)))
            .collect();

        let average_metrics = AverageMetrics::mean(trained.iter().map(|(_, m)| *m));

        // Strictly greater keeps the first model on ties.
        let mut best: Option<(ModelKind, f64)> = None;
        for (kind, metrics) in &trained {
            if best.map_or(true, |(_, f1)| metrics.f1_score > f1) {
                best = Some((*kind, metrics.f1_score));
            }
        }

        let reliability_level = average_metrics
            .map_or(Reliability::Low, |avg| Reliability::from_mean_f1(avg.f1_score));

        Ok(MetricsSummary {
            models: state.results.clone(),
            average_metrics,
            best_model: best.map(|(kind, _)| kind),
            reliability_level,
        })
    }

    pub fn status(&self) -> AnomalyStatus {
        AnomalyStatus {
            trained: self.is_trained(),
            models: ModelKind::ALL.to_vec(),
            data_points: self.state.as_ref().map_or(0, |s| s.scaler.n_features()),
            trained_at: self.state.as_ref().map(|s| s.trained_at),
        }
    }

    /// Drop all fitted state.
    pub fn reset(&mut self) {
        if self.state.take().is_some() {
            info!("anomaly ensemble reset");
        }
    }
}
