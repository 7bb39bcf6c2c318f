//! Feature standardisation shared by both engines.
//!
//! Distance- and gradient-based estimators are scale sensitive, so every
//! feature matrix is standardised with the mean and standard deviation of the
//! batch it was fitted on, and every query vector goes through the same
//! parameters afterwards.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{EngineError, Result};

/// Scales at or below this are treated as a constant column.
const MIN_SCALE: f64 = 1e-12;

/// Per-column mean/scale standardiser: `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit on a `(samples, features)` matrix.
    ///
    /// Uses the population standard deviation (ddof = 0). Constant columns
    /// get a scale of 1.0 so they transform to 0 instead of NaN.
    pub fn fit(x: &ArrayView2<f64>) -> Result<Self> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(EngineError::InsufficientData(
                "cannot fit a scaler on an empty matrix".to_string(),
            ));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| EngineError::InsufficientData("empty matrix".to_string()))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s.is_finite() && s > MIN_SCALE { s } else { 1.0 });

        Ok(Self { mean, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> ArrayView1<'_, f64> {
        self.mean.view()
    }

    pub fn scale(&self) -> ArrayView1<'_, f64> {
        self.scale.view()
    }

    /// Standardise one feature vector.
    pub fn transform(&self, x: &ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_width(x.len())?;
        Ok((x - &self.mean) / &self.scale)
    }

    /// Standardise every row of a `(samples, features)` matrix.
    pub fn transform_batch(&self, x: &ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        let mut out = x.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            row -= &self.mean;
            row /= &self.scale;
        }
        Ok(out)
    }

    fn check_width(&self, actual: usize) -> Result<()> {
        if actual != self.n_features() {
            return Err(EngineError::DimensionMismatch {
                expected: self.n_features(),
                actual,
            });
        }
        Ok(())
    }
}
