//! Composite provider score and letter grade.
//!
//! S = visits + patients + completion + prescriptions, each sub-score
//! saturating at its cap from [`ScoreWeights`]. S lies in [0, 100].

use meditrack_common::{round_to, ProviderMetrics};
use serde::{Deserialize, Serialize};

use crate::weights::ScoreWeights;

/// The four capped sub-scores of one provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub visit_volume: f64,
    pub patient_breadth: f64,
    pub completion_rate: f64,
    pub prescription_frequency: f64,
}

impl ScoreBreakdown {
    pub fn compute(metrics: &ProviderMetrics, weights: &ScoreWeights) -> Self {
        let capped = |value: f64, cap: f64| value.clamp(0.0, cap);
        Self {
            visit_volume: capped(
                metrics.total_visits / weights.visit_baseline * weights.visit_volume,
                weights.visit_volume,
            ),
            patient_breadth: capped(
                metrics.unique_patients / weights.patient_baseline * weights.patient_breadth,
                weights.patient_breadth,
            ),
            completion_rate: capped(
                metrics.visit_completion_rate * weights.completion_rate,
                weights.completion_rate,
            ),
            prescription_frequency: capped(
                metrics.prescription_frequency * weights.prescription_frequency,
                weights.prescription_frequency,
            ),
        }
    }

    pub fn total(&self) -> f64 {
        self.visit_volume + self.patient_breadth + self.completion_rate + self.prescription_frequency
    }
}

/// Unrounded composite score.
pub fn composite_score(metrics: &ProviderMetrics, weights: &ScoreWeights) -> f64 {
    ScoreBreakdown::compute(metrics, weights).total()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A — Excellent")]
    A,
    #[serde(rename = "B — Good")]
    B,
    #[serde(rename = "C — Average")]
    C,
    #[serde(rename = "D — Below Average")]
    D,
    #[serde(rename = "F — Needs Improvement")]
    F,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Grade::A
        } else if score >= 70.0 {
            Grade::B
        } else if score >= 55.0 {
            Grade::C
        } else if score >= 40.0 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Grade::A => "A — Excellent",
            Grade::B => "B — Good",
            Grade::C => "C — Average",
            Grade::D => "D — Below Average",
            Grade::F => "F — Needs Improvement",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the performance ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedProvider {
    pub doctor_id: String,
    pub doctor_name: String,
    pub department: String,
    /// Rounded to 2 decimals.
    pub overall_score: f64,
    pub metrics: ProviderMetrics,
    pub performance_grade: Grade,
}

impl RankedProvider {
    /// Grades from the unrounded score; reports the rounded one.
    pub fn score(
        id: &str,
        name: &str,
        department: &str,
        metrics: ProviderMetrics,
        weights: &ScoreWeights,
    ) -> Self {
        let score = composite_score(&metrics, weights);
        Self {
            doctor_id: id.to_string(),
            doctor_name: name.to_string(),
            department: department.to_string(),
            overall_score: round_to(score, 2),
            metrics,
            performance_grade: Grade::from_score(score),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn metrics(visits: f64, patients: f64, completion: f64, prescriptions: f64) -> ProviderMetrics {
        ProviderMetrics {
            total_visits: visits,
            unique_patients: patients,
            visit_completion_rate: completion,
            prescription_frequency: prescriptions,
            ..ProviderMetrics::default()
        }
    }

    #[test]
    fn test_baseline_provider_scores_hundred() {
        let w = ScoreWeights::default();
        let score = composite_score(&metrics(50.0, 25.0, 1.0, 1.0), &w);
        assert_eq!(score, 100.0);
        assert_eq!(Grade::from_score(score), Grade::A);
    }

    #[test]
    fn test_volume_saturates() {
        let w = ScoreWeights::default();
        let at_baseline = composite_score(&metrics(50.0, 25.0, 0.5, 0.5), &w);
        let beyond = composite_score(&metrics(500.0, 250.0, 0.5, 0.5), &w);
        assert_eq!(at_baseline, beyond);
    }

    #[test]
    fn test_partial_credit() {
        let w = ScoreWeights::default();
        let b = ScoreBreakdown::compute(&metrics(25.0, 10.0, 0.8, 0.5), &w);
        assert!((b.visit_volume - 15.0).abs() < 1e-12);
        assert!((b.patient_breadth - 10.0).abs() < 1e-12);
        assert!((b.completion_rate - 20.0).abs() < 1e-12);
        assert!((b.prescription_frequency - 10.0).abs() < 1e-12);
        assert!((b.total() - 55.0).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_rates_are_clamped() {
        let w = ScoreWeights::default();
        let score = composite_score(&metrics(80.0, 40.0, 1.3, 1.5), &w);
        assert_eq!(score, 100.0);
        let negative = composite_score(&metrics(-10.0, -5.0, -0.2, 0.0), &w);
        assert_eq!(negative, 0.0);
    }

    #[test]
    fn test_grade_thresholds() {
        assert_eq!(Grade::from_score(85.0), Grade::A);
        assert_eq!(Grade::from_score(84.99), Grade::B);
        assert_eq!(Grade::from_score(70.0), Grade::B);
        assert_eq!(Grade::from_score(55.0), Grade::C);
        assert_eq!(Grade::from_score(40.0), Grade::D);
        assert_eq!(Grade::from_score(39.99), Grade::F);
        assert_eq!(Grade::from_score(0.0), Grade::F);
    }

    #[test]
    fn test_grade_serialises_as_label() {
        for grade in [Grade::A, Grade::B, Grade::C, Grade::D, Grade::F] {
            assert_eq!(
                serde_json::to_value(grade).unwrap(),
                serde_json::Value::String(grade.label().to_string())
            );
        }
    }

    #[test]
    fn test_ranked_provider_rounds_score_but_grades_raw() {
        let w = ScoreWeights::default();
        // 84.996 rounds to 85.0 but is still a B.
        let m = metrics(50.0, 25.0, 0.39984, 1.0);
        let row = RankedProvider::score("d1", "Dr. A", "Cardiology", m, &w);
        assert_eq!(row.overall_score, 85.0);
        assert_eq!(row.performance_grade, Grade::B);
    }
}
