//! Risk Tiers and Score Cutoffs
//!
//! Risk tier is a pure function of the anomaly score and is shared by every
//! detector. Percentiles use linear interpolation between closest ranks.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const CRITICAL_SCORE: f64 = 0.75;
pub const HIGH_SCORE: f64 = 0.5;
pub const MEDIUM_SCORE: f64 = 0.25;

/// Risk tier derived from an anomaly score in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Boundary values map to the higher tier
    pub fn from_score(score: f64) -> Self {
        if score >= CRITICAL_SCORE {
            RiskLevel::Critical
        } else if score >= HIGH_SCORE {
            RiskLevel::High
        } else if score >= MEDIUM_SCORE {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    /// High or critical
    pub fn is_elevated(&self) -> bool {
        *self >= RiskLevel::High
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(format!("unknown risk level '{}'", other)),
        }
    }
}

/// `q`-th percentile (0..=100) with linear interpolation. `None` when empty.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let fraction = rank - lo as f64;

    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * fraction)
}

/// Override flags with `score >= threshold`
pub fn flags_from_threshold(scores: &[f64], threshold: f64) -> Vec<bool> {
    scores.iter().map(|&s| s >= threshold).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.2499), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.25), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.5), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0.75), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(1.0), RiskLevel::Critical);
    }

    #[test]
    fn test_tier_is_monotonic() {
        let mut previous = RiskLevel::Low;
        for i in 0..=1000 {
            let level = RiskLevel::from_score(i as f64 / 1000.0);
            assert!(level >= previous);
            previous = level;
        }
    }

    #[test]
    fn test_tier_string_round_trip() {
        for level in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High, RiskLevel::Critical] {
            assert_eq!(level.as_str().parse::<RiskLevel>(), Ok(level));
        }
        assert!(RiskLevel::High.is_elevated());
        assert!(!RiskLevel::Medium.is_elevated());
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 50.0), Some(3.0));
        assert_eq!(percentile(&values, 100.0), Some(5.0));
        assert!((percentile(&values, 95.0).unwrap() - 4.8).abs() < 1e-9);
        assert_eq!(percentile(&[], 50.0), None);
        assert_eq!(percentile(&[7.0], 10.0), Some(7.0));
    }

    #[test]
    fn test_flags_from_threshold_inclusive() {
        assert_eq!(flags_from_threshold(&[0.2, 0.5, 0.9], 0.5), vec![false, true, true]);
    }
}
