//! Liveness endpoint.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

use crate::state::SharedState;

pub const SERVICE_NAME: &str = "ML Models API";

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub service: &'static str,
    /// Whether the anomaly ensemble is trained.
    pub trained: bool,
    pub doctor_model_trained: bool,
    pub uptime_secs: i64,
}

/// GET /api/ml/health
pub async fn health(State(state): State<SharedState>) -> Json<Health> {
    let trained = state.anomaly.read().await.is_trained();
    let doctor_model_trained = state.providers.read().await.is_trained();
    Json(Health {
        status: "ok",
        service: SERVICE_NAME,
        trained,
        doctor_model_trained,
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}
