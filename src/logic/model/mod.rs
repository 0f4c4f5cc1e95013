//! Model Module - Anomaly Detectors
//!
//! Two interchangeable detectors behind one trait:
//! - `isolation_forest` - primary, tree ensemble
//! - `autoencoder` - reconstruction error, with a statistical fallback
//!
//! Both return scores in [0, 1] and a flag per row. Risk tiers and
//! percentile cutoffs live in `threshold`.

pub mod autoencoder;
pub mod isolation_forest;
pub mod network;
pub mod persistence;
pub mod scaler;
pub mod threshold;

#[cfg(test)]
mod tests;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::{PipelineError, PipelineResult};
use crate::logic::features::FeatureVector;

// Re-export common types
pub use autoencoder::{AutoencoderConfig, AutoencoderDetector, ReconstructionBackend};
pub use isolation_forest::{IsolationForestConfig, IsolationForestDetector};
pub use scaler::StandardScaler;
pub use threshold::RiskLevel;

// ============================================================================
// MODEL KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    IsolationForest,
    Autoencoder,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::IsolationForest => "isolation_forest",
            ModelKind::Autoencoder => "autoencoder",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "isolation_forest" => Ok(ModelKind::IsolationForest),
            "autoencoder" => Ok(ModelKind::Autoencoder),
            other => Err(PipelineError::UnknownModel(other.to_string())),
        }
    }
}

// ============================================================================
// PREDICTION
// ============================================================================

/// Per-row output of a detector, aligned with the input rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub scores: Vec<f64>,
    pub flags: Vec<bool>,
}

impl Prediction {
    pub fn suspicious_count(&self) -> usize {
        self.flags.iter().filter(|&&f| f).count()
    }

    /// Replace the flags with `score >= threshold`
    pub fn apply_threshold(&mut self, threshold: f64) {
        self.flags = threshold::flags_from_threshold(&self.scores, threshold);
    }
}

// ============================================================================
// DETECTOR TRAIT
// ============================================================================

pub trait AnomalyDetector: Send {
    fn kind(&self) -> ModelKind;

    fn is_fitted(&self) -> bool;

    /// Fit on the current batch (rows = meters, columns = features)
    fn fit(&mut self, features: &Array2<f64>) -> PipelineResult<()>;

    /// Scores in [0, 1] and flags, one per row. Requires `fit`.
    fn predict(&self, features: &Array2<f64>) -> PipelineResult<Prediction>;

    fn fit_predict(&mut self, features: &Array2<f64>) -> PipelineResult<Prediction> {
        self.fit(features)?;
        self.predict(features)
    }

    /// Human-readable reasons for one meter's score
    fn generate_explanation(
        &self,
        features: &FeatureVector,
        score: f64,
        is_suspicious: bool,
    ) -> PipelineResult<String>;

    fn get_risk_level(&self, score: f64) -> RiskLevel {
        RiskLevel::from_score(score)
    }

    fn save(&self, path: &Path) -> PipelineResult<()>;

    fn load(&mut self, path: &Path) -> PipelineResult<()>;
}

/// Build an unfitted detector of `kind` from settings.
/// `score_threshold` overrides the detector's own flag rule.
pub fn create_detector(
    kind: ModelKind,
    settings: &Settings,
    score_threshold: Option<f64>,
) -> Box<dyn AnomalyDetector> {
    match kind {
        ModelKind::IsolationForest => {
            Box::new(IsolationForestDetector::new(settings.isolation_forest(score_threshold)))
        }
        ModelKind::Autoencoder => Box::new(AutoencoderDetector::new(settings.autoencoder(score_threshold))),
    }
}
