//! Feature Standardization
//!
//! Zero mean, unit variance per column, fitted on the current batch.
//! Constant columns keep a scale of 1 so they map to 0 instead of NaN.
//! A column whose variance is within float rounding of zero counts as
//! constant, so identical features computed at different magnitudes do not
//! turn into unit-variance noise.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit column statistics (population std)
    pub fn fit(features: &Array2<f64>) -> PipelineResult<Self> {
        if features.nrows() == 0 {
            return Err(PipelineError::EmptyBatch);
        }

        let mean = features
            .mean_axis(Axis(0))
            .ok_or(PipelineError::EmptyBatch)?;
        let n = features.nrows() as f64;

        let scale = features
            .std_axis(Axis(0), 0.0)
            .iter()
            .zip(mean.iter())
            .map(|(&std, &mean)| {
                if std.is_finite() && !is_constant(std * std, mean, n) {
                    std
                } else {
                    1.0
                }
            })
            .collect::<Array1<f64>>();

        Ok(Self { mean, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, features: &Array2<f64>) -> PipelineResult<Array2<f64>> {
        if features.ncols() != self.n_features() {
            return Err(PipelineError::DimensionMismatch {
                expected: self.n_features(),
                actual: features.ncols(),
            });
        }

        Ok((features - &self.mean) / &self.scale)
    }

    pub fn fit_transform(features: &Array2<f64>) -> PipelineResult<(Self, Array2<f64>)> {
        let scaler = Self::fit(features)?;
        let scaled = scaler.transform(features)?;
        Ok((scaler, scaled))
    }
}

/// Variance indistinguishable from rounding error
fn is_constant(variance: f64, mean: f64, n: f64) -> bool {
    let bound = n * f64::EPSILON * variance + (n * mean * f64::EPSILON).powi(2);
    variance <= bound
}
