//! Configuration module
//!
//! `Settings` is an explicit value: the binary loads it once and hands it to
//! the orchestrator, which derives a fresh detector config for every run.

use std::path::PathBuf;

use crate::constants::{self, env_flag, env_or};
use crate::logic::model::{
    AutoencoderConfig, IsolationForestConfig, ModelKind, ReconstructionBackend,
};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite database file backing the reading store and result sink
    pub database_path: PathBuf,

    /// Expected anomaly proportion for the isolation forest
    pub contamination: f64,

    /// Trees in the isolation ensemble
    pub n_estimators: usize,

    /// Seed shared by both detectors
    pub random_seed: u64,

    /// Score cutoff applied instead of the model's own decision
    pub anomaly_threshold: Option<f64>,

    /// Use the autoencoder as the default model
    pub use_autoencoder: bool,

    /// Reconstruction error percentile used as autoencoder cutoff
    pub threshold_percentile: f64,

    pub encoding_dim: usize,
    pub epochs: usize,
    pub batch_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: constants::default_database_path(),
            contamination: constants::DEFAULT_CONTAMINATION,
            n_estimators: constants::DEFAULT_ESTIMATORS,
            random_seed: constants::DEFAULT_RANDOM_SEED,
            anomaly_threshold: None,
            use_autoencoder: false,
            threshold_percentile: constants::DEFAULT_THRESHOLD_PERCENTILE,
            encoding_dim: constants::DEFAULT_ENCODING_DIM,
            epochs: constants::DEFAULT_EPOCHS,
            batch_size: constants::DEFAULT_BATCH_SIZE,
        }
    }
}

impl Settings {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            database_path: std::env::var("POWERGUARD_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            contamination: env_or("ISOLATION_FOREST_CONTAMINATION", defaults.contamination),

            n_estimators: env_or("ISOLATION_FOREST_ESTIMATORS", defaults.n_estimators),

            random_seed: env_or("POWERGUARD_RANDOM_SEED", defaults.random_seed),

            anomaly_threshold: std::env::var("ANOMALY_THRESHOLD")
                .ok()
                .and_then(|s| s.trim().parse().ok()),

            use_autoencoder: env_flag("USE_AUTOENCODER"),

            threshold_percentile: env_or(
                "AUTOENCODER_THRESHOLD_PERCENTILE",
                defaults.threshold_percentile,
            ),

            encoding_dim: env_or("AUTOENCODER_ENCODING_DIM", defaults.encoding_dim),

            epochs: env_or("AUTOENCODER_EPOCHS", defaults.epochs),

            batch_size: env_or("AUTOENCODER_BATCH_SIZE", defaults.batch_size),
        }
    }

    /// Model used when the caller does not pick one
    pub fn default_model(&self) -> ModelKind {
        if self.use_autoencoder {
            ModelKind::Autoencoder
        } else {
            ModelKind::IsolationForest
        }
    }

    pub fn isolation_forest(&self, score_threshold: Option<f64>) -> IsolationForestConfig {
        IsolationForestConfig {
            contamination: self.contamination,
            n_estimators: self.n_estimators,
            random_seed: self.random_seed,
            score_threshold,
            ..Default::default()
        }
    }

    pub fn autoencoder(&self, score_threshold: Option<f64>) -> AutoencoderConfig {
        AutoencoderConfig {
            encoding_dim: self.encoding_dim,
            threshold_percentile: self.threshold_percentile,
            epochs: self.epochs,
            batch_size: self.batch_size,
            random_seed: self.random_seed,
            score_threshold,
            backend: ReconstructionBackend::Auto,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.contamination, 0.1);
        assert_eq!(settings.n_estimators, 100);
        assert!(settings.anomaly_threshold.is_none());
        assert_eq!(settings.default_model(), ModelKind::IsolationForest);
    }

    #[test]
    fn test_detector_configs_carry_threshold() {
        let settings = Settings::default();
        let forest = settings.isolation_forest(Some(0.4));
        assert_eq!(forest.score_threshold, Some(0.4));
        assert_eq!(forest.n_estimators, 100);

        let autoencoder = settings.autoencoder(None);
        assert_eq!(autoencoder.threshold_percentile, 95.0);
        assert!(autoencoder.score_threshold.is_none());
    }
}
