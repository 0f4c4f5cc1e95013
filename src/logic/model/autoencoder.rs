//! Reconstruction-Error Detector
//!
//! Secondary detector. Meters whose standardized features the bottleneck
//! network cannot reproduce are anomalous.
//!
//! Two backends sit behind the same contract:
//! - **network**: per-row MSE, cutoff at a percentile of the fitted batch,
//!   `score = clip(err / (2 * cutoff))`, flag `err > cutoff`
//! - **statistical** (network unavailable): per-row max |z| over the
//!   standardized columns, cutoff 2.0, `score = clip(max_z / 4)`, flag
//!   `max_z > 2.0`
//!
//! The network is available when built with the `neural` feature and
//! `POWERGUARD_DISABLE_NEURAL` is unset. Resolved once per process.

use std::path::Path;
use std::sync::Once;

use ndarray::{Array1, Array2, Axis};
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::constants::{
    env_flag, DEFAULT_BATCH_SIZE, DEFAULT_ENCODING_DIM, DEFAULT_EPOCHS, DEFAULT_LEARNING_RATE,
    DEFAULT_PATIENCE, DEFAULT_RANDOM_SEED, DEFAULT_THRESHOLD_PERCENTILE, DISABLE_NEURAL_ENV,
};
use crate::error::{PipelineError, PipelineResult};
use crate::logic::explain;
use crate::logic::features::FeatureVector;

use super::network::{ReconstructionNetwork, TrainingConfig};
use super::persistence;
use super::scaler::StandardScaler;
use super::threshold::percentile;
use super::{AnomalyDetector, ModelKind, Prediction};

/// Max |z| treated as anomalous by the statistical backend
pub const STATISTICAL_THRESHOLD: f64 = 2.0;

/// Max |z| mapped to score 1.0
const STATISTICAL_SCORE_SPAN: f64 = 4.0;

const STD_EPSILON: f64 = 1e-8;

/// Network backend usable in this process
pub static NEURAL_RUNTIME_AVAILABLE: Lazy<bool> =
    Lazy::new(|| cfg!(feature = "neural") && !env_flag(DISABLE_NEURAL_ENV));

static FALLBACK_NOTICE: Once = Once::new();

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconstructionBackend {
    /// Network when available, statistical otherwise
    Auto,
    /// Always the z-score proxy
    Statistical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoencoderConfig {
    pub encoding_dim: usize,
    /// Percentile (0..=100) of fitted errors used as cutoff
    pub threshold_percentile: f64,
    pub epochs: usize,
    pub batch_size: usize,
    /// Epochs without improvement before stopping
    pub patience: usize,
    pub learning_rate: f64,
    pub random_seed: u64,
    /// Replaces the backend flag rule with `score >= threshold`
    pub score_threshold: Option<f64>,
    pub backend: ReconstructionBackend,
}

impl Default for AutoencoderConfig {
    fn default() -> Self {
        Self {
            encoding_dim: DEFAULT_ENCODING_DIM,
            threshold_percentile: DEFAULT_THRESHOLD_PERCENTILE,
            epochs: DEFAULT_EPOCHS,
            batch_size: DEFAULT_BATCH_SIZE,
            patience: DEFAULT_PATIENCE,
            learning_rate: DEFAULT_LEARNING_RATE,
            random_seed: DEFAULT_RANDOM_SEED,
            score_threshold: None,
            backend: ReconstructionBackend::Auto,
        }
    }
}

impl AutoencoderConfig {
    fn validate(&self) -> PipelineResult<()> {
        if !(0.0..=100.0).contains(&self.threshold_percentile) {
            return Err(PipelineError::InvalidConfig(format!(
                "threshold_percentile must be in [0, 100], got {}",
                self.threshold_percentile
            )));
        }
        if self.encoding_dim == 0 || self.batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "encoding_dim and batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn training(&self) -> TrainingConfig {
        TrainingConfig {
            epochs: self.epochs,
            batch_size: self.batch_size,
            patience: self.patience,
            learning_rate: self.learning_rate,
        }
    }
}

// ============================================================================
// FITTED STATE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
enum FittedBackend {
    Network {
        network: ReconstructionNetwork,
        threshold: f64,
    },
    Statistical {
        mean: Array1<f64>,
        std: Array1<f64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FittedAutoencoder {
    scaler: StandardScaler,
    backend: FittedBackend,
}

/// Network scores: `clip(err / (2 * threshold))`, `err > threshold`.
/// A non-positive threshold means perfect reconstruction: nothing flagged.
fn reconstruction_prediction(errors: &[f64], threshold: f64) -> Prediction {
    if !(threshold > 0.0) {
        return Prediction {
            scores: vec![0.0; errors.len()],
            flags: vec![false; errors.len()],
        };
    }

    Prediction {
        scores: errors
            .iter()
            .map(|e| (e / (2.0 * threshold)).clamp(0.0, 1.0))
            .collect(),
        flags: errors.iter().map(|&e| e > threshold).collect(),
    }
}

/// Per-row max |z| against the fitted column statistics
fn max_z_scores(scaled: &Array2<f64>, mean: &Array1<f64>, std: &Array1<f64>) -> Vec<f64> {
    let denominator = std.mapv(|s| s + STD_EPSILON);
    let z = ((scaled - mean) / &denominator).mapv(f64::abs);
    z.rows()
        .into_iter()
        .map(|row| row.iter().copied().fold(0.0, f64::max))
        .collect()
}

fn statistical_prediction(max_z: &[f64]) -> Prediction {
    Prediction {
        scores: max_z
            .iter()
            .map(|z| (z / STATISTICAL_SCORE_SPAN).clamp(0.0, 1.0))
            .collect(),
        flags: max_z.iter().map(|&z| z > STATISTICAL_THRESHOLD).collect(),
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

#[derive(Debug, Clone)]
pub struct AutoencoderDetector {
    config: AutoencoderConfig,
    use_network: bool,
    state: Option<FittedAutoencoder>,
}

impl AutoencoderDetector {
    pub fn new(config: AutoencoderConfig) -> Self {
        Self::with_capability(config, *NEURAL_RUNTIME_AVAILABLE)
    }

    /// Build against an explicit network capability instead of the process flag
    pub fn with_capability(config: AutoencoderConfig, network_available: bool) -> Self {
        let use_network = match config.backend {
            ReconstructionBackend::Statistical => false,
            ReconstructionBackend::Auto => {
                if !network_available {
                    FALLBACK_NOTICE.call_once(|| {
                        log::warn!(
                            "Reconstruction network unavailable, autoencoder uses statistical fallback"
                        );
                    });
                }
                network_available
            }
        };

        Self { config, use_network, state: None }
    }

    pub fn config(&self) -> &AutoencoderConfig {
        &self.config
    }

    /// Backend the next `fit` will train, or the loaded one
    pub fn backend_name(&self) -> &'static str {
        match &self.state {
            Some(FittedAutoencoder { backend: FittedBackend::Network { .. }, .. }) => "network",
            Some(_) => "statistical",
            None if self.use_network => "network",
            None => "statistical",
        }
    }

    fn fitted(&self) -> PipelineResult<&FittedAutoencoder> {
        self.state.as_ref().ok_or(PipelineError::NotFitted)
    }

    fn fit_network(&self, scaled: &Array2<f64>) -> PipelineResult<FittedBackend> {
        let mut rng = StdRng::seed_from_u64(self.config.random_seed);
        let mut network = ReconstructionNetwork::bottleneck(scaled.ncols(), self.config.encoding_dim, &mut rng);
        let report = network.train(scaled, &self.config.training(), &mut rng);

        let errors = network.reconstruction_errors(scaled);
        let threshold = percentile(&errors, self.config.threshold_percentile).ok_or(PipelineError::EmptyBatch)?;

        log::info!(
            "Autoencoder fitted (network): {} epochs{}, loss={:.5}, threshold={:.5}",
            report.epochs_run,
            if report.stopped_early { " (early stop)" } else { "" },
            report.best_loss,
            threshold
        );
        Ok(FittedBackend::Network { network, threshold })
    }

    fn fit_statistical(scaled: &Array2<f64>) -> PipelineResult<FittedBackend> {
        let mean = scaled.mean_axis(Axis(0)).ok_or(PipelineError::EmptyBatch)?;
        let std = scaled.std_axis(Axis(0), 0.0);

        log::info!("Autoencoder fitted (statistical): {} rows", scaled.nrows());
        Ok(FittedBackend::Statistical { mean, std })
    }
}

impl Default for AutoencoderDetector {
    fn default() -> Self {
        Self::new(AutoencoderConfig::default())
    }
}

impl AnomalyDetector for AutoencoderDetector {
    fn kind(&self) -> ModelKind {
        ModelKind::Autoencoder
    }

    fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    fn fit(&mut self, features: &Array2<f64>) -> PipelineResult<()> {
        self.config.validate()?;
        let (scaler, scaled) = StandardScaler::fit_transform(features)?;

        let backend = if self.use_network {
            self.fit_network(&scaled)?
        } else {
            Self::fit_statistical(&scaled)?
        };

        self.state = Some(FittedAutoencoder { scaler, backend });
        Ok(())
    }

    fn predict(&self, features: &Array2<f64>) -> PipelineResult<Prediction> {
        let state = self.fitted()?;
        let scaled = state.scaler.transform(features)?;

        let mut prediction = match &state.backend {
            FittedBackend::Network { network, threshold } => {
                reconstruction_prediction(&network.reconstruction_errors(&scaled), *threshold)
            }
            FittedBackend::Statistical { mean, std } => {
                statistical_prediction(&max_z_scores(&scaled, mean, std))
            }
        };

        if let Some(threshold) = self.config.score_threshold {
            prediction.apply_threshold(threshold);
        }
        Ok(prediction)
    }

    fn generate_explanation(
        &self,
        features: &FeatureVector,
        score: f64,
        is_suspicious: bool,
    ) -> PipelineResult<String> {
        self.fitted()?;
        Ok(explain::explain_reconstruction(features, score, is_suspicious))
    }

    fn save(&self, path: &Path) -> PipelineResult<()> {
        persistence::save_state(self.kind(), self.fitted()?, path)
    }

    fn load(&mut self, path: &Path) -> PipelineResult<()> {
        let state: FittedAutoencoder = persistence::load_state(self.kind(), path)?;
        self.use_network = matches!(state.backend, FittedBackend::Network { .. });
        self.state = Some(state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clustered(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n + 1, 9), |(i, j)| {
            if i == n {
                10.0
            } else {
                ((i * 7 + j * 3) % 5) as f64 * 0.1 + 1.0
            }
        })
    }

    fn statistical() -> AutoencoderDetector {
        AutoencoderDetector::new(AutoencoderConfig {
            backend: ReconstructionBackend::Statistical,
            ..Default::default()
        })
    }

    #[test]
    fn test_zero_threshold_flags_nothing() {
        let prediction = reconstruction_prediction(&[0.0, 0.0, 0.0], 0.0);
        assert_eq!(prediction.scores, vec![0.0; 3]);
        assert_eq!(prediction.flags, vec![false; 3]);
    }

    #[test]
    fn test_reconstruction_scores() {
        let prediction = reconstruction_prediction(&[0.5, 1.0, 1.5, 4.0], 1.0);
        assert_eq!(prediction.scores, vec![0.25, 0.5, 0.75, 1.0]);
        assert_eq!(prediction.flags, vec![false, false, true, true]);
    }

    #[test]
    fn test_statistical_scores() {
        let prediction = statistical_prediction(&[1.0, 2.0, 3.0, 9.0]);
        assert_eq!(prediction.scores, vec![0.25, 0.5, 0.75, 1.0]);
        assert_eq!(prediction.flags, vec![false, false, true, true]);
    }

    #[test]
    fn test_statistical_backend_flags_outlier() {
        let mut detector = statistical();
        let prediction = detector.fit_predict(&clustered(30)).unwrap();

        assert_eq!(detector.backend_name(), "statistical");
        assert!(prediction.flags[30]);
        assert_eq!(prediction.scores[30], 1.0);
        assert_eq!(prediction.suspicious_count(), 1);
    }

    #[test]
    fn test_constant_batch_is_not_flagged() {
        let data = Array2::from_elem((5, 9), 1.0);
        let prediction = statistical().fit_predict(&data).unwrap();
        assert!(prediction.scores.iter().all(|&s| s == 0.0));
        assert_eq!(prediction.suspicious_count(), 0);
    }

    #[test]
    fn test_auto_backend_contract() {
        let mut detector = AutoencoderDetector::default();
        let prediction = detector.fit_predict(&clustered(30)).unwrap();

        assert_eq!(prediction.scores.len(), 31);
        assert!(prediction.scores.iter().all(|s| (0.0..=1.0).contains(s)));
        assert!(prediction.suspicious_count() <= 2);
    }

    #[test]
    fn test_auto_without_network_matches_statistical() {
        let data = clustered(30);
        let mut fallback = AutoencoderDetector::with_capability(AutoencoderConfig::default(), false);
        assert_eq!(fallback.backend_name(), "statistical");

        let expected = statistical().fit_predict(&data).unwrap();
        assert_eq!(fallback.fit_predict(&data).unwrap(), expected);
        assert_eq!(fallback.backend_name(), "statistical");
    }

    #[test]
    fn test_capability_selects_network() {
        let available = AutoencoderDetector::with_capability(AutoencoderConfig::default(), true);
        assert_eq!(available.backend_name(), "network");

        let forced = AutoencoderDetector::with_capability(
            AutoencoderConfig { backend: ReconstructionBackend::Statistical, ..Default::default() },
            true,
        );
        assert_eq!(forced.backend_name(), "statistical");
    }

    #[test]
    fn test_threshold_override() {
        let config = AutoencoderConfig {
            backend: ReconstructionBackend::Statistical,
            score_threshold: Some(0.0),
            ..Default::default()
        };
        let prediction = AutoencoderDetector::new(config).fit_predict(&clustered(10)).unwrap();
        assert!(prediction.flags.iter().all(|&f| f));
    }

    #[test]
    fn test_invalid_percentile() {
        let config = AutoencoderConfig { threshold_percentile: 120.0, ..Default::default() };
        let err = AutoencoderDetector::new(config).fit(&clustered(5)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let detector = statistical();
        assert!(matches!(detector.predict(&clustered(3)), Err(PipelineError::NotFitted)));
    }
}
