//! Shared fixtures: raw JSON batches in the shape the HTTP clients send.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

/// One raw consultation. Each analyte is `(value, is_abnormal)`.
pub fn consultation(hemoglobin: (f64, bool), wbc: (f64, bool), glucose: (f64, bool)) -> Value {
    json!({
        "hemoglobin": { "value": hemoglobin.0, "isAbnormal": hemoglobin.1 },
        "wbc": { "value": wbc.0, "isAbnormal": wbc.1 },
        "glucose": { "value": glucose.0, "isAbnormal": glucose.1 },
    })
}

/// The smallest trainable batch: one abnormal and one normal consultation.
pub fn two_consultations() -> Vec<Value> {
    vec![
        consultation((10.0, true), (5.0, false), (90.0, false)),
        consultation((14.0, false), (6.0, false), (85.0, false)),
    ]
}

/// A separable batch: normals sit in reference ranges, abnormals have either
/// low hemoglobin or high glucose. Normals come first.
pub fn labelled_consultations(normal: usize, abnormal: usize, seed: u64) -> Vec<Value> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut batch = Vec::with_capacity(normal + abnormal);

    for _ in 0..normal {
        batch.push(consultation(
            (rng.gen_range(13.5..16.0), false),
            (rng.gen_range(5.0..9.0), false),
            (rng.gen_range(75.0..95.0), false),
        ));
    }
    for i in 0..abnormal {
        let (hemoglobin, glucose) = if i % 2 == 0 {
            ((rng.gen_range(7.0..10.0), true), (rng.gen_range(75.0..95.0), false))
        } else {
            ((rng.gen_range(13.5..16.0), false), (rng.gen_range(160.0..220.0), true))
        };
        batch.push(consultation(hemoglobin, (rng.gen_range(5.0..9.0), false), glucose));
    }
    batch
}

/// Metrics in feature order: total visits, unique patients, average fee,
/// completion rate, prescription frequency, repeat-patient percentage.
pub fn provider(id: &str, name: &str, department: &str, metrics: [f64; 6]) -> Value {
    json!({
        "id": id,
        "name": name,
        "department": department,
        "totalVisits": metrics[0],
        "uniquePatients": metrics[1],
        "averageConsultationFee": metrics[2],
        "visitCompletionRate": metrics[3],
        "prescriptionFrequency": metrics[4],
        "repeatPatientPercentage": metrics[5],
    })
}

/// Scores exactly 100 on the composite score.
pub fn perfect_provider(id: &str) -> Value {
    provider(id, "Dr. Perfect", "General Medicine", [50.0, 25.0, 500.0, 1.0, 1.0, 40.0])
}

/// Six providers in two behavioural groups: d1–d3 are high-volume,
/// d4–d6 low-volume.
pub fn provider_roster() -> Vec<Value> {
    vec![
        provider("d1", "Dr. Asha Rao", "Cardiology", [60.0, 30.0, 800.0, 0.95, 0.90, 45.0]),
        provider("d2", "Dr. Ben Okafor", "Cardiology", [55.0, 28.0, 780.0, 0.93, 0.88, 42.0]),
        provider("d3", "Dr. Chen Li", "General Medicine", [58.0, 29.0, 790.0, 0.94, 0.85, 44.0]),
        provider("d4", "Dr. Dana Ruiz", "Dermatology", [12.0, 10.0, 300.0, 0.60, 0.30, 10.0]),
        provider("d5", "Dr. Eli Stone", "Dermatology", [10.0, 9.0, 310.0, 0.55, 0.35, 12.0]),
        provider("d6", "Dr. Faye Kim", "Pediatrics", [14.0, 11.0, 290.0, 0.62, 0.28, 9.0]),
    ]
}
