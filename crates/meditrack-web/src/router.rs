//! Axum router — maps all URL paths to handlers.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{anomaly, providers, system};
use crate::state::{AppState, SharedState};

/// Build and return the full Axum router.
pub fn build_router(state: AppState, permissive_cors: bool) -> Router {
    let shared: SharedState = Arc::new(state);

    let router = Router::new()
        .route("/api/ml/health",        get(system::health))

        // Anomaly ensemble
        .route("/api/ml/train",         post(anomaly::train))
        .route("/api/ml/predict",       post(anomaly::predict))
        .route("/api/ml/predict-multi", post(anomaly::predict_multi))
        .route("/api/ml/metrics",       get(anomaly::metrics))
        .route("/api/ml/status",        get(anomaly::status))
        .route("/api/ml/reset",         post(anomaly::reset))

        // Provider performance
        .route("/api/ml/doctor-performance/train",   post(providers::train))
        .route("/api/ml/doctor-performance/ranking", get(providers::ranking))
        .route("/api/ml/doctor-performance/similar/{doctor_id}", get(providers::similar))
        .route("/api/ml/doctor-performance/status",  get(providers::status))
        .route("/api/ml/doctor-performance/reset",   post(providers::reset))

        .layer(TraceLayer::new_for_http())
        .with_state(shared);

    if permissive_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
