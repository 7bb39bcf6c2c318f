//! Sub-score caps and baselines for the provider composite score.

use serde::{Deserialize, Serialize};

/// Point caps of the four sub-scores and the volume baselines that earn
/// full credit. Caps sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Points for visit volume
    pub visit_volume: f64,
    /// Visits that earn the full visit-volume credit
    pub visit_baseline: f64,
    /// Points for patient breadth
    pub patient_breadth: f64,
    /// Unique patients that earn the full patient-breadth credit
    pub patient_baseline: f64,
    /// Points for a 100% visit completion rate
    pub completion_rate: f64,
    /// Points for a 100% prescription frequency
    pub prescription_frequency: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            visit_volume:           30.0,
            visit_baseline:         50.0,
            patient_breadth:        25.0,
            patient_baseline:       25.0,
            completion_rate:        25.0,
            prescription_frequency: 20.0,
        }
    }
}

impl ScoreWeights {
    /// Highest reachable composite score.
    pub fn max_score(&self) -> f64 {
        self.visit_volume + self.patient_breadth + self.completion_rate + self.prescription_frequency
    }

    /// Caps must be non-negative and sum to 100; baselines must be positive.
    pub fn validate(&self) -> bool {
        let caps = [
            self.visit_volume,
            self.patient_breadth,
            self.completion_rate,
            self.prescription_frequency,
        ];
        caps.iter().all(|c| *c >= 0.0)
            && self.visit_baseline > 0.0
            && self.patient_baseline > 0.0
            && (self.max_score() - 100.0).abs() < 1e-6
    }
}
