//! Feature Layout - Centralized Feature Definition
//!
//! **CRITICAL: This file controls the feature schema**
//!
//! ## Rules (NEVER break these):
//! 1. Add feature → increment FEATURE_VERSION
//! 2. Change order → increment FEATURE_VERSION
//! 3. Remove feature → increment FEATURE_VERSION
//!
//! Persisted models store the version and layout hash they were fitted
//! against, so a changed layout is caught on load instead of silently
//! feeding columns to the wrong weights.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version
/// MUST be incremented when layout changes
pub const FEATURE_VERSION: u8 = 1;

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// Feature names in exact order they appear in the vector
/// This is the SINGLE SOURCE OF TRUTH for feature layout
pub const FEATURE_LAYOUT: &[&str] = &[
    // === Level (0) ===
    "hourly_avg",            // 0: Mean consumption per reading (kWh)

    // === Temporal shape (1-4) ===
    "daily_variance",        // 1: Mean of per-day sample variances
    "night_ratio",           // 2: Night share vs expected 8/24
    "peak_ratio",            // 3: Evening peak share vs expected 4/24
    "weekend_ratio",         // 4: Weekend/weekday ratio vs expected 2/5

    // === Spread (5-8) ===
    "consumption_std",       // 5: Population std of all readings
    "max_consumption",       // 6: Largest reading
    "min_consumption",       // 7: Smallest reading
    "consumption_range",     // 8: max - min
];

/// Total number of features
/// IMPORTANT: Must match FEATURE_LAYOUT.len()!
pub const FEATURE_COUNT: usize = 9;

// Indices into the layout
pub const HOURLY_AVG: usize = 0;
pub const DAILY_VARIANCE: usize = 1;
pub const NIGHT_RATIO: usize = 2;
pub const PEAK_RATIO: usize = 3;
pub const WEEKEND_RATIO: usize = 4;
pub const CONSUMPTION_STD: usize = 5;
pub const MAX_CONSUMPTION: usize = 6;
pub const MIN_CONSUMPTION: usize = 7;
pub const CONSUMPTION_RANGE: usize = 8;

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// Compute CRC32 hash of the feature layout
/// Used to detect layout mismatches at runtime
pub fn compute_layout_hash() -> u32 {
    let mut hasher = Hasher::new();

    // Include version in hash
    hasher.update(&[FEATURE_VERSION]);

    // Hash all feature names in order
    for name in FEATURE_LAYOUT {
        hasher.update(name.as_bytes());
        hasher.update(&[0]); // Separator
    }

    hasher.finalize()
}

/// Get layout hash
pub fn layout_hash() -> u32 {
    compute_layout_hash()
}

// ============================================================================
// LAYOUT INFO
// ============================================================================

/// Complete layout information for serialization/logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            version: FEATURE_VERSION,
            hash: layout_hash(),
            feature_count: FEATURE_COUNT,
            feature_names: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Validate against the layout compiled into this binary
    pub fn validate(&self) -> Result<(), LayoutMismatchError> {
        validate_layout(self.version, self.hash)
    }
}

impl Default for LayoutInfo {
    fn default() -> Self {
        Self::current()
    }
}

// ============================================================================
// LAYOUT VALIDATION
// ============================================================================

/// Error when feature layout doesn't match expected
#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "Feature layout mismatch: expected v{expected_version} (hash: {expected_hash:08x}), \
     got v{actual_version} (hash: {actual_hash:08x})"
)]
pub struct LayoutMismatchError {
    pub expected_version: u8,
    pub expected_hash: u32,
    pub actual_version: u8,
    pub actual_hash: u32,
}

/// Validate that incoming data matches current layout
pub fn validate_layout(incoming_version: u8, incoming_hash: u32) -> Result<(), LayoutMismatchError> {
    let current_hash = layout_hash();

    if incoming_version != FEATURE_VERSION || incoming_hash != current_hash {
        return Err(LayoutMismatchError {
            expected_version: FEATURE_VERSION,
            expected_hash: current_hash,
            actual_version: incoming_version,
            actual_hash: incoming_hash,
        });
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
