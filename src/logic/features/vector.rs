//! Feature Vector - Core data structure for model input
//!
//! Values follow the centralized layout from `layout.rs`. The layout version
//! and hash travel with persisted models (`LayoutInfo`), not with each vector.

use serde::{Deserialize, Serialize};
use super::reading::Reading;
use super::layout::{self, LayoutInfo, FEATURE_COUNT, FEATURE_LAYOUT};

// ============================================================================
// FEATURE VECTOR
// ============================================================================

/// Behavioral summary of one meter's reading sequence.
///
/// Always holds all 9 values in `FEATURE_LAYOUT` order; a meter without
/// readings is the all-zero vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Feature values in order defined by FEATURE_LAYOUT
    pub values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Create a new zeroed feature vector
    pub fn new() -> Self {
        Self::from_values([0.0; FEATURE_COUNT])
    }

    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    /// Fixed-order numeric form consumed by the detectors
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        self.values
    }

    /// Set feature by index
    pub fn set(&mut self, index: usize, value: f64) {
        if index < FEATURE_COUNT {
            self.values[index] = value;
        }
    }

    pub fn hourly_avg(&self) -> f64 { self.values[layout::HOURLY_AVG] }
    pub fn daily_variance(&self) -> f64 { self.values[layout::DAILY_VARIANCE] }
    pub fn night_ratio(&self) -> f64 { self.values[layout::NIGHT_RATIO] }
    pub fn peak_ratio(&self) -> f64 { self.values[layout::PEAK_RATIO] }
    pub fn weekend_ratio(&self) -> f64 { self.values[layout::WEEKEND_RATIO] }
    pub fn consumption_std(&self) -> f64 { self.values[layout::CONSUMPTION_STD] }
    pub fn max_consumption(&self) -> f64 { self.values[layout::MAX_CONSUMPTION] }
    pub fn min_consumption(&self) -> f64 { self.values[layout::MIN_CONSUMPTION] }
    pub fn consumption_range(&self) -> f64 { self.values[layout::CONSUMPTION_RANGE] }

    /// Iterate `(name, value)` pairs in layout order
    pub fn named_values(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_LAYOUT.iter().copied().zip(self.values.iter().copied())
    }

    /// Convert to JSON-serializable format for logging
    pub fn to_log_entry(&self) -> serde_json::Value {
        let layout = LayoutInfo::current();
        serde_json::json!({
            "feature_version": layout.version,
            "layout_hash": format!("{:08x}", layout.hash),
            "named_values": self.named_values()
                .map(|(name, value)| (name.to_string(), serde_json::json!(value)))
                .collect::<serde_json::Map<_, _>>(),
        })
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// FEATURE EXTRACTOR TRAIT
// ============================================================================

/// Accumulates readings and writes the features it owns into a vector
pub trait FeatureExtractor {
    /// Feed one reading
    fn add_reading(&mut self, reading: &Reading);

    /// Extract features and update the vector
    fn extract(&self, vector: &mut FeatureVector);
}

// ============================================================================
// BUILDER PATTERN
// ============================================================================

/// Builder for creating FeatureVector with named setters
pub struct FeatureVectorBuilder {
    vector: FeatureVector,
}

impl FeatureVectorBuilder {
    pub fn new() -> Self {
        Self { vector: FeatureVector::new() }
    }

    pub fn hourly_avg(mut self, value: f64) -> Self {
        self.vector.set(layout::HOURLY_AVG, value);
        self
    }

    pub fn daily_variance(mut self, value: f64) -> Self {
        self.vector.set(layout::DAILY_VARIANCE, value);
        self
    }

    pub fn night_ratio(mut self, value: f64) -> Self {
        self.vector.set(layout::NIGHT_RATIO, value);
        self
    }

    pub fn peak_ratio(mut self, value: f64) -> Self {
        self.vector.set(layout::PEAK_RATIO, value);
        self
    }

    pub fn weekend_ratio(mut self, value: f64) -> Self {
        self.vector.set(layout::WEEKEND_RATIO, value);
        self
    }

    pub fn consumption_std(mut self, value: f64) -> Self {
        self.vector.set(layout::CONSUMPTION_STD, value);
        self
    }

    pub fn max_consumption(mut self, value: f64) -> Self {
        self.vector.set(layout::MAX_CONSUMPTION, value);
        self
    }

    pub fn min_consumption(mut self, value: f64) -> Self {
        self.vector.set(layout::MIN_CONSUMPTION, value);
        self
    }

    pub fn consumption_range(mut self, value: f64) -> Self {
        self.vector.set(layout::CONSUMPTION_RANGE, value);
        self
    }

    pub fn build(self) -> FeatureVector {
        self.vector
    }
}

impl Default for FeatureVectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
