//! Provider performance API — similarity index and composite ranking.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use meditrack_common::EngineError;
use meditrack_ranker::ProviderSimilarityEngine;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{success, trained};
use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct TrainRequest {
    #[serde(default)]
    pub doctors: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct SimilarParams {
    pub k: Option<usize>,
}

/// POST /api/ml/doctor-performance/train
pub async fn train(
    State(state): State<SharedState>,
    payload: Result<Json<TrainRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let doctors = body.doctors.unwrap_or_default();
    if doctors.is_empty() {
        return Err(ApiError::BadRequest("No doctor data provided".to_string()));
    }

    info!(doctors = doctors.len(), "provider training requested");
    let _training = state.providers_training.lock().await;
    let config = state.providers.read().await.config().clone();

    let (engine, report) = tokio::task::spawn_blocking(move || {
        let mut engine = ProviderSimilarityEngine::new(config);
        let report = engine.train(&doctors)?;
        Ok::<_, EngineError>((engine, report))
    })
    .await??;

    *state.providers.write().await = engine;
    Ok(trained(report))
}

/// GET /api/ml/doctor-performance/ranking
pub async fn ranking(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let ranking = state.providers.read().await.get_performance_ranking()?;
    Ok(success(ranking))
}

/// GET /api/ml/doctor-performance/similar/{doctor_id}?k=
pub async fn similar(
    State(state): State<SharedState>,
    Path(doctor_id): Path<String>,
    params: Result<Query<SimilarParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = params?;
    let engine = state.providers.read().await;
    let similar = match params.k {
        Some(0) => return Err(ApiError::BadRequest("k must be at least 1".to_string())),
        Some(k) => engine.find_similar_doctors(&doctor_id, k)?,
        None => engine.find_similar_default(&doctor_id)?,
    };
    Ok(success(similar))
}

/// GET /api/ml/doctor-performance/status
pub async fn status(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let status = state.providers.read().await.status();
    Ok(success(status))
}

/// POST /api/ml/doctor-performance/reset
pub async fn reset(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let mut engine = state.providers.write().await;
    engine.reset();
    Ok(success(engine.status()))
}
