//! Daily Variability Feature
//!
//! `daily_variance` is the mean over calendar dates of each date's sample
//! variance. Dates with a single reading have no variance and are skipped.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::layout::DAILY_VARIANCE;
use super::reading::Reading;
use super::stats;
use super::vector::{FeatureExtractor, FeatureVector};

#[derive(Debug, Clone, Default)]
pub struct DailyFeatures {
    by_date: BTreeMap<NaiveDate, Vec<f64>>,
}

impl DailyFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn day_count(&self) -> usize {
        self.by_date.len()
    }

    /// Mean of per-date sample variances, 0 when no date has 2+ readings
    pub fn daily_variance(&self) -> f64 {
        let variances: Vec<f64> = self
            .by_date
            .values()
            .filter_map(|values| stats::sample_variance(values))
            .collect();

        stats::mean(&variances)
    }
}

impl FeatureExtractor for DailyFeatures {
    fn add_reading(&mut self, reading: &Reading) {
        self.by_date
            .entry(reading.timestamp.date())
            .or_default()
            .push(reading.consumption_kwh);
    }

    fn extract(&self, vector: &mut FeatureVector) {
        vector.set(DAILY_VARIANCE, self.daily_variance());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(day: u32, hour: u32, kwh: f64) -> Reading {
        let ts = NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        Reading::new(ts, kwh)
    }

    #[test]
    fn test_mean_of_daily_variances() {
        let mut daily = DailyFeatures::new();
        // Day 1: variance of [1, 3] = 2
        daily.add_reading(&reading(1, 0, 1.0));
        daily.add_reading(&reading(1, 1, 3.0));
        // Day 2: variance of [0, 4] = 8
        daily.add_reading(&reading(2, 0, 0.0));
        daily.add_reading(&reading(2, 1, 4.0));

        assert_eq!(daily.day_count(), 2);
        assert_eq!(daily.daily_variance(), 5.0);
    }

    #[test]
    fn test_single_reading_days_are_excluded() {
        let mut daily = DailyFeatures::new();
        daily.add_reading(&reading(1, 0, 1.0));
        daily.add_reading(&reading(1, 1, 3.0));
        daily.add_reading(&reading(2, 0, 100.0));

        assert_eq!(daily.daily_variance(), 2.0);
    }

    #[test]
    fn test_no_variance_is_zero() {
        let mut daily = DailyFeatures::new();
        daily.add_reading(&reading(1, 0, 1.0));
        daily.add_reading(&reading(2, 0, 5.0));

        let mut vector = FeatureVector::new();
        daily.extract(&mut vector);
        assert_eq!(vector.daily_variance(), 0.0);
    }
}
