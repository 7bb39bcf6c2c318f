//! meditrack-common — Shared types, errors, and numeric helpers used by the
//! MediTrack analytics engines.

pub mod error;
pub mod normalise;
pub mod records;

// Re-export commonly used types
pub use error::{EngineError, RecordError, Result};
pub use normalise::StandardScaler;
pub use records::{
    parse_batch, AnalyteReading, ConsultationRecord, FromRecord, ParsedBatch, ProviderMetrics,
    ProviderRecord,
};

use ndarray::ArrayView1;

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Euclidean (L2) distance between two equally sized vectors.
pub fn euclidean_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_euclidean_distance() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        assert_eq!(euclidean_distance(&a.view(), &b.view()), 5.0);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(150.005, 0), 150.0);
        assert_eq!(round_to(-2.345, 1), -2.3);
    }
}
