//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! `config::Settings` reads the environment and falls back to these.

use std::path::PathBuf;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "PowerGuard";

/// Directory name under the local data dir
pub const DATA_DIR_NAME: &str = "powerguard";

/// Database file name
pub const DATABASE_FILE: &str = "powerguard.db";

/// Expected proportion of anomalous meters
pub const DEFAULT_CONTAMINATION: f64 = 0.1;

/// Trees in the isolation ensemble
pub const DEFAULT_ESTIMATORS: usize = 100;

/// Per-tree sample cap (`max_samples = "auto"`)
pub const DEFAULT_MAX_SAMPLES: usize = 256;

/// Seed used by every randomized model
pub const DEFAULT_RANDOM_SEED: u64 = 42;

/// Percentile of in-batch reconstruction errors used as cutoff
pub const DEFAULT_THRESHOLD_PERCENTILE: f64 = 95.0;

/// Bottleneck width of the reconstruction network
pub const DEFAULT_ENCODING_DIM: usize = 4;

pub const DEFAULT_EPOCHS: usize = 50;
pub const DEFAULT_BATCH_SIZE: usize = 32;
pub const DEFAULT_PATIENCE: usize = 5;
pub const DEFAULT_LEARNING_RATE: f64 = 0.001;

/// Env var that forces the statistical fallback of the autoencoder
pub const DISABLE_NEURAL_ENV: &str = "POWERGUARD_DISABLE_NEURAL";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Default database location: `<data_local_dir>/powerguard/powerguard.db`
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
        .join(DATABASE_FILE)
}

/// Read and parse an env var, falling back when missing or malformed
pub fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Read a boolean flag (`1`/`true`/`yes` are truthy)
pub fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|s| matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
