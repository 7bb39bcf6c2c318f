//! Provider similarity engine.
//!
//! Training standardises the six metrics of every usable provider and indexes
//! them for nearest-neighbour search. Queries reuse the stored, rounded
//! metrics; raw inputs are not retained.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use meditrack_common::{
    parse_batch, EngineError, ProviderMetrics, ProviderRecord, Result, StandardScaler,
};
use ndarray::{Array1, Array2};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::SimilarityConfig;
use crate::neighbors::NearestNeighbors;
use crate::scorer::RankedProvider;

const ENGINE_NAME: &str = "Model";
pub const MODEL_TYPE: &str = "KNN (K-Nearest Neighbors)";

/// Display metadata and rounded metrics kept per trained provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub department: String,
    pub metrics: ProviderMetrics,
}

impl From<ProviderRecord> for ProviderProfile {
    fn from(record: ProviderRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            department: record.department,
            metrics: record.metrics.rounded(),
        }
    }
}

/// Provider profiles keyed by identifier, in training order.
fn serialize_profiles<S: Serializer>(profiles: &[ProviderProfile], s: S) -> std::result::Result<S::Ok, S::Error> {
    let mut map = s.serialize_map(Some(profiles.len()))?;
    for profile in profiles {
        map.serialize_entry(&profile.id, profile)?;
    }
    map.end()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub status: &'static str,
    pub doctors_analyzed: usize,
    /// Raw records dropped as unusable.
    pub dropped: usize,
    #[serde(serialize_with = "serialize_profiles")]
    pub doctor_info: Vec<ProviderProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarProvider {
    pub doctor_id: String,
    pub name: String,
    pub distance: f64,
    pub metrics: ProviderMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarProviders {
    pub doctor_id: String,
    pub doctor_name: String,
    pub target_metrics: ProviderMetrics,
    pub similar_doctors: Vec<SimilarProvider>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ranking {
    pub rankings: Vec<RankedProvider>,
    pub total_doctors: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub trained: bool,
    pub doctors_count: usize,
    pub model_type: String,
    pub n_neighbors: usize,
    pub trained_at: Option<DateTime<Utc>>,
}

struct FittedProviders {
    scaler: StandardScaler,
    index: NearestNeighbors,
    /// Row `i` of the index is `providers[i]`.
    providers: Vec<ProviderProfile>,
    positions: HashMap<String, usize>,
    trained_at: DateTime<Utc>,
}

pub struct ProviderSimilarityEngine {
    config: SimilarityConfig,
    state: Option<FittedProviders>,
}

impl Default for ProviderSimilarityEngine {
    fn default() -> Self {
        Self::new(SimilarityConfig::default())
    }
}

/// Collapse duplicate ids: a later record replaces the earlier one in place.
fn dedupe(records: Vec<ProviderRecord>) -> (Vec<ProviderRecord>, HashMap<String, usize>) {
    let mut unique: Vec<ProviderRecord> = Vec::with_capacity(records.len());
    let mut positions = HashMap::with_capacity(records.len());
    for record in records {
        match positions.get(&record.id) {
            Some(&pos) => {
                debug!(id = %record.id, "duplicate provider id, keeping the later record");
                unique[pos] = record;
            }
            None => {
                positions.insert(record.id.clone(), unique.len());
                unique.push(record);
            }
        }
    }
    (unique, positions)
}

impl ProviderSimilarityEngine {
    pub fn new(config: SimilarityConfig) -> Self {
        Self { config, state: None }
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.state.is_some()
    }

    fn fitted(&self) -> Result<&FittedProviders> {
        self.state.as_ref().ok_or(EngineError::NotTrained(ENGINE_NAME))
    }

    /// Fit the normalizer and neighbour index on the usable providers of
    /// `raw`. On error the previous fitted state is left untouched.
    pub fn train(&mut self, raw: &[Value]) -> Result<TrainingReport> {
        let batch = parse_batch::<ProviderRecord>(raw);
        let (records, positions) = dedupe(batch.records);

        let required = self.config.n_neighbors;
        if records.len() < required {
            return Err(EngineError::InsufficientData(format!(
                "need at least {required} doctors, got {}",
                records.len()
            )));
        }

        let n = records.len();
        let raw_x = Array2::from_shape_fn((n, 6), |(r, c)| records[r].metrics.as_array()[c]);
        let scaler = StandardScaler::fit(&raw_x.view())?;
        let x = scaler.transform_batch(&raw_x.view())?;
        let index = NearestNeighbors::fit(&x.view(), required)?;

        info!(
            doctors = n,
            dropped = batch.dropped,
            n_neighbors = index.n_neighbors(),
            "trained provider similarity index"
        );

        let providers: Vec<ProviderProfile> = records.into_iter().map(ProviderProfile::from).collect();
        self.state = Some(FittedProviders {
            scaler,
            index,
            providers: providers.clone(),
            positions,
            trained_at: Utc::now(),
        });

        Ok(TrainingReport {
            status: "trained",
            doctors_analyzed: n,
            dropped: batch.dropped,
            doctor_info: providers,
        })
    }

    /// The `k` providers nearest to `doctor_id` in standardised metric space,
    /// excluding the provider itself.
    pub fn find_similar_doctors(&self, doctor_id: &str, k: usize) -> Result<SimilarProviders> {
        let state = self.fitted()?;
        let &position = state
            .positions
            .get(doctor_id)
            .ok_or_else(|| EngineError::NotFound(format!("Doctor {doctor_id} not found in trained data")))?;
        let target = &state.providers[position];

        let query = state
            .scaler
            .transform(&Array1::from(target.metrics.as_array().to_vec()).view())?;
        let hits = state
            .index
            .kneighbors(&query.view(), Some(k.saturating_add(1)))?;

        let similar_doctors = hits
            .into_iter()
            .filter(|&(row, _)| row != position)
            .take(k)
            .map(|(row, distance)| {
                let peer = &state.providers[row];
                SimilarProvider {
                    doctor_id: peer.id.clone(),
                    name: peer.name.clone(),
                    distance,
                    metrics: peer.metrics,
                }
            })
            .collect();

        Ok(SimilarProviders {
            doctor_id: target.id.clone(),
            doctor_name: target.name.clone(),
            target_metrics: target.metrics,
            similar_doctors,
        })
    }

    /// [`Self::find_similar_doctors`] with the configured default `k`.
    pub fn find_similar_default(&self, doctor_id: &str) -> Result<SimilarProviders> {
        self.find_similar_doctors(doctor_id, self.config.default_similar_k)
    }

    /// Every trained provider by descending composite score. Equal scores keep
    /// training order.
    pub fn get_performance_ranking(&self) -> Result<Ranking> {
        let state = self.fitted()?;
        let weights = &self.config.weights;

        let mut rankings: Vec<RankedProvider> = state
            .providers
            .iter()
            .map(|p| RankedProvider::score(&p.id, &p.name, &p.department, p.metrics, weights))
            .collect();
        rankings.sort_by(|a, b| b.overall_score.total_cmp(&a.overall_score));

        Ok(Ranking {
            total_doctors: rankings.len(),
            rankings,
        })
    }

    pub fn status(&self) -> ProviderStatus {
        ProviderStatus {
            trained: self.is_trained(),
            doctors_count: self.state.as_ref().map_or(0, |s| s.providers.len()),
            model_type: MODEL_TYPE.to_string(),
            n_neighbors: self.config.n_neighbors,
            trained_at: self.state.as_ref().map(|s| s.trained_at),
        }
    }

    /// Drop all fitted state.
    pub fn reset(&mut self) {
        if self.state.take().is_some() {
            info!("provider similarity engine reset");
        }
    }
}
