//! Consumption Level Features
//!
//! Direct statistics over every consumption value of a meter:
//! mean, population std, max, min and range.

use super::layout::{CONSUMPTION_RANGE, CONSUMPTION_STD, HOURLY_AVG, MAX_CONSUMPTION, MIN_CONSUMPTION};
use super::reading::Reading;
use super::stats;
use super::vector::{FeatureExtractor, FeatureVector};

#[derive(Debug, Clone, Default)]
pub struct ConsumptionFeatures {
    values: Vec<f64>,
}

impl ConsumptionFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_count(&self) -> usize {
        self.values.len()
    }

    pub fn average(&self) -> f64 {
        stats::mean(&self.values)
    }

    pub fn std(&self) -> f64 {
        stats::population_std(&self.values)
    }
}

impl FeatureExtractor for ConsumptionFeatures {
    fn add_reading(&mut self, reading: &Reading) {
        self.values.push(reading.consumption_kwh);
    }

    fn extract(&self, vector: &mut FeatureVector) {
        let (min, max) = stats::min_max(&self.values).unwrap_or((0.0, 0.0));

        vector.set(HOURLY_AVG, self.average());
        vector.set(CONSUMPTION_STD, self.std());
        vector.set(MAX_CONSUMPTION, max);
        vector.set(MIN_CONSUMPTION, min);
        vector.set(CONSUMPTION_RANGE, max - min);
    }
}
