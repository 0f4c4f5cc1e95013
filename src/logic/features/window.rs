//! Time Window Ratio Features
//!
//! Night, evening peak and weekend shares of consumption, normalized by the
//! share each window would get under uniform usage. 1.0 means "proportional
//! to time", >1 over-represented, <1 under-represented.

use chrono::{Datelike, Timelike};

use super::layout::{NIGHT_RATIO, PEAK_RATIO, WEEKEND_RATIO};
use super::reading::Reading;
use super::vector::{FeatureExtractor, FeatureVector};

/// Night window: 22:00 - 05:59
pub const NIGHT_HOURS: [u32; 8] = [22, 23, 0, 1, 2, 3, 4, 5];

/// Evening peak window: 18:00 - 21:59
pub const PEAK_HOURS: [u32; 4] = [18, 19, 20, 21];

/// Weekend days over weekdays
pub const EXPECTED_WEEKEND_RATIO: f64 = 2.0 / 5.0;

/// Ratio reported when all consumption lands on weekends
pub const WEEKEND_ONLY_SENTINEL: f64 = 2.0;

/// Ratio reported when there is nothing to compare
pub const NEUTRAL_RATIO: f64 = 1.0;

#[derive(Debug, Clone, Default)]
pub struct WindowFeatures {
    pub total: f64,
    pub night: f64,
    pub peak: f64,
    pub weekend: f64,
    pub weekday: f64,
}

impl WindowFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    fn share_ratio(&self, window_sum: f64, window_hours: usize) -> f64 {
        if self.total <= 0.0 {
            return NEUTRAL_RATIO;
        }
        let expected = self.total * (window_hours as f64 / 24.0);
        window_sum / expected
    }

    pub fn night_ratio(&self) -> f64 {
        self.share_ratio(self.night, NIGHT_HOURS.len())
    }

    pub fn peak_ratio(&self) -> f64 {
        self.share_ratio(self.peak, PEAK_HOURS.len())
    }

    pub fn weekend_ratio(&self) -> f64 {
        if self.weekday > 0.0 {
            (self.weekend / self.weekday) / EXPECTED_WEEKEND_RATIO
        } else if self.weekend == 0.0 {
            NEUTRAL_RATIO
        } else {
            WEEKEND_ONLY_SENTINEL
        }
    }
}

impl FeatureExtractor for WindowFeatures {
    fn add_reading(&mut self, reading: &Reading) {
        let kwh = reading.consumption_kwh;
        let hour = reading.timestamp.hour();

        self.total += kwh;
        if NIGHT_HOURS.contains(&hour) {
            self.night += kwh;
        }
        if PEAK_HOURS.contains(&hour) {
            self.peak += kwh;
        }

        // Saturday = 5, Sunday = 6
        if reading.timestamp.weekday().num_days_from_monday() >= 5 {
            self.weekend += kwh;
        } else {
            self.weekday += kwh;
        }
    }

    fn extract(&self, vector: &mut FeatureVector) {
        vector.set(NIGHT_RATIO, self.night_ratio());
        vector.set(PEAK_RATIO, self.peak_ratio());
        vector.set(WEEKEND_RATIO, self.weekend_ratio());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    // 2024-01-06 is a Saturday, 2024-01-08 a Monday
    fn reading(day: u32, hour: u32, kwh: f64) -> Reading {
        let ts = NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        Reading::new(ts, kwh)
    }

    #[test]
    fn test_uniform_day_is_neutral() {
        let mut window = WindowFeatures::new();
        for hour in 0..24 {
            window.add_reading(&reading(8, hour, 0.5));
        }
        assert!((window.night_ratio() - 1.0).abs() < 1e-12);
        assert!((window.peak_ratio() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_night_only_usage() {
        let mut window = WindowFeatures::new();
        for hour in NIGHT_HOURS {
            window.add_reading(&reading(8, hour, 1.0));
        }
        // All consumption at night: 1 / (8/24) = 3
        assert!((window.night_ratio() - 3.0).abs() < 1e-12);
        assert_eq!(window.peak_ratio(), 0.0);
    }

    #[test]
    fn test_zero_total_is_neutral() {
        let mut window = WindowFeatures::new();
        window.add_reading(&reading(8, 1, 0.0));
        assert_eq!(window.night_ratio(), 1.0);
        assert_eq!(window.peak_ratio(), 1.0);
        assert_eq!(window.weekend_ratio(), 1.0);
    }

    #[test]
    fn test_weekend_ratio_edge_cases() {
        let mut weekend_only = WindowFeatures::new();
        weekend_only.add_reading(&reading(6, 12, 3.0));
        assert_eq!(weekend_only.weekend_ratio(), WEEKEND_ONLY_SENTINEL);

        let empty = WindowFeatures::new();
        assert_eq!(empty.weekend_ratio(), NEUTRAL_RATIO);
    }

    #[test]
    fn test_equal_daily_averages_give_one() {
        let mut window = WindowFeatures::new();
        // Week of 2024-01-08 (Mon) .. 2024-01-14 (Sun), 2 kWh per day
        for day in 8..=14 {
            window.add_reading(&reading(day, 12, 2.0));
        }
        assert!((window.weekend_ratio() - 1.0).abs() < 1e-12);
    }
}
