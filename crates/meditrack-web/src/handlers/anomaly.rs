//! Anomaly ensemble API — train, predict and inspect the lab classifier.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use meditrack_anomaly::{AnomalyEngine, ModelKind};
use meditrack_common::EngineError;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{number, success, trained};
use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainRequest {
    #[serde(default)]
    pub training_data: Option<Vec<Value>>,
    /// Older clients send the batch under this key.
    #[serde(default, rename = "lab_results")]
    pub lab_results: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct PredictMultiRequest {
    #[serde(default)]
    pub features: Option<Value>,
    #[serde(default)]
    pub model: Option<String>,
}

/// POST /api/ml/train
pub async fn train(
    State(state): State<SharedState>,
    payload: Result<Json<TrainRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let records = body
        .training_data
        .filter(|batch| !batch.is_empty())
        .or(body.lab_results)
        .unwrap_or_default();
    if records.is_empty() {
        return Err(ApiError::BadRequest("No training data provided".to_string()));
    }

    info!(records = records.len(), "anomaly training requested");
    let _training = state.anomaly_training.lock().await;
    let config = state.anomaly.read().await.config().clone();

    let (engine, report) = tokio::task::spawn_blocking(move || {
        let mut engine = AnomalyEngine::new(config);
        let report = engine.train(&records)?;
        Ok::<_, EngineError>((engine, report))
    })
    .await??;

    *state.anomaly.write().await = engine;
    Ok(trained(report))
}

/// POST /api/ml/predict
pub async fn predict(
    State(state): State<SharedState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let value = match body.value {
        None | Some(Value::Null) => return Err(ApiError::BadRequest("Value required".to_string())),
        Some(v) => number(&v, "value")?,
    };

    let predictions = state.anomaly.read().await.predict(value)?;
    Ok(success(json!({ "predictions": predictions })))
}

/// POST /api/ml/predict-multi
pub async fn predict_multi(
    State(state): State<SharedState>,
    payload: Result<Json<PredictMultiRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let features = match body.features {
        None | Some(Value::Null) => {
            return Err(ApiError::BadRequest("Features array required".to_string()))
        }
        Some(Value::Array(items)) if !items.is_empty() => items
            .iter()
            .map(|item| number(item, "features"))
            .collect::<Result<Vec<f64>, _>>()?,
        Some(_) => {
            return Err(ApiError::BadRequest(
                "Features must be a non-empty array".to_string(),
            ))
        }
    };

    let predictions = state.anomaly.read().await.predict_multi_feature(&features)?;

    // A named model narrows the response; unknown names return everything.
    let selected = body
        .model
        .as_deref()
        .and_then(|name| name.parse::<ModelKind>().ok())
        .and_then(|kind| predictions.get(&kind).map(|p| (kind, p)));
    let data = match selected {
        Some((kind, prediction)) => json!({ "model": kind, "prediction": prediction }),
        None => json!({ "predictions": predictions }),
    };
    Ok(success(data))
}

/// GET /api/ml/metrics
pub async fn metrics(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let summary = state.anomaly.read().await.get_metrics()?;
    Ok(success(summary))
}

/// GET /api/ml/status
pub async fn status(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let status = state.anomaly.read().await.status();
    Ok(success(status))
}

/// POST /api/ml/reset
pub async fn reset(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let mut engine = state.anomaly.write().await;
    engine.reset();
    Ok(success(engine.status()))
}
