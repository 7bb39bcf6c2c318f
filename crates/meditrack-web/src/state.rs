//! Shared application state for the web server.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use meditrack_anomaly::AnomalyEngine;
use meditrack_config::Config;
use meditrack_ranker::ProviderSimilarityEngine;
use tokio::sync::{Mutex, RwLock};

/// Both engines, each behind its own async lock. Training fits a fresh engine
/// off the lock and only takes the write side to swap it in, so queries and
/// health checks keep answering from the previous state meanwhile.
pub struct AppState {
    pub anomaly: RwLock<AnomalyEngine>,
    pub providers: RwLock<ProviderSimilarityEngine>,
    /// One training run per engine at a time.
    pub anomaly_training: Mutex<()>,
    pub providers_training: Mutex<()>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            anomaly: RwLock::new(AnomalyEngine::new(config.anomaly.clone())),
            providers: RwLock::new(ProviderSimilarityEngine::new(config.providers.clone())),
            anomaly_training: Mutex::new(()),
            providers_training: Mutex::new(()),
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<AppState>;
