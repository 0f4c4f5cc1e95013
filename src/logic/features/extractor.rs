//! Meter Feature Extraction
//!
//! Runs every family extractor over one meter's readings and assembles the
//! 9-value vector. Meters are independent; the batch form is a plain map.

use std::collections::BTreeMap;

use ndarray::Array2;

use super::consumption::ConsumptionFeatures;
use super::daily::DailyFeatures;
use super::layout::FEATURE_COUNT;
use super::reading::{MeterReadings, Reading};
use super::vector::{FeatureExtractor, FeatureVector};
use super::window::WindowFeatures;

/// Feature vectors keyed by meter id
pub type MeterFeatures = BTreeMap<String, FeatureVector>;

/// Extract the feature vector of one meter. Empty input gives all zeros.
pub fn extract_features(readings: &[Reading]) -> FeatureVector {
    if readings.is_empty() {
        return FeatureVector::new();
    }

    // Storage order is not guaranteed
    let mut ordered = readings.to_vec();
    ordered.sort_by_key(|r| r.timestamp);

    let mut extractors: [Box<dyn FeatureExtractor>; 3] = [
        Box::new(ConsumptionFeatures::new()),
        Box::new(DailyFeatures::new()),
        Box::new(WindowFeatures::new()),
    ];

    for reading in &ordered {
        for extractor in extractors.iter_mut() {
            extractor.add_reading(reading);
        }
    }

    let mut vector = FeatureVector::new();
    for extractor in &extractors {
        extractor.extract(&mut vector);
    }
    vector
}

/// Extract features for every meter
pub fn extract_features_batch(readings_by_meter: &MeterReadings) -> MeterFeatures {
    let features: MeterFeatures = readings_by_meter
        .iter()
        .map(|(meter_id, readings)| {
            let vector = extract_features(readings);
            log::debug!("Features for {} ({} readings): {}", meter_id, readings.len(), vector.to_log_entry());
            (meter_id.clone(), vector)
        })
        .collect();

    log::debug!("Extracted features for {} meters", features.len());
    features
}

/// Fixed-order numeric form of one vector
pub fn features_to_array(features: &FeatureVector) -> [f64; FEATURE_COUNT] {
    features.to_array()
}

/// Stack a batch into a matrix. Row `i` belongs to `meter_ids[i]`.
pub fn batch_to_array(features_by_meter: &MeterFeatures) -> (Vec<String>, Array2<f64>) {
    let meter_ids: Vec<String> = features_by_meter.keys().cloned().collect();
    let mut matrix = Array2::<f64>::zeros((meter_ids.len(), FEATURE_COUNT));

    for (mut row, features) in matrix.rows_mut().into_iter().zip(features_by_meter.values()) {
        for (cell, value) in row.iter_mut().zip(features.values.iter()) {
            *cell = *value;
        }
    }

    (meter_ids, matrix)
}
