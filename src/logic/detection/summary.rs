use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::AnomalyRecord;
use crate::logic::model::RiskLevel;
use crate::logic::store::StoreCounts;

/// Dashboard totals: fleet size from the store, outcomes from the live records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionSummary {
    /// Registered meters, scored or not
    pub total_meters: usize,
    pub total_readings: usize,
    pub suspicious_meters: usize,
    /// Share of registered meters, 0..=100
    pub suspicious_percentage: f64,
    /// High and critical
    pub high_risk_count: usize,
    pub critical_risk_count: usize,
    pub medium_risk_count: usize,
    pub low_risk_count: usize,
    pub last_detection: Option<DateTime<Utc>>,
}

impl DetectionSummary {
    pub fn new(counts: StoreCounts, records: &[AnomalyRecord]) -> Self {
        let count = |level: RiskLevel| records.iter().filter(|r| r.risk_level == level).count();

        let total_meters = counts.meters;
        let suspicious_meters = records.iter().filter(|r| r.is_suspicious).count();
        let suspicious_percentage = if total_meters > 0 {
            suspicious_meters as f64 / total_meters as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total_meters,
            total_readings: counts.readings,
            suspicious_meters,
            suspicious_percentage,
            high_risk_count: records.iter().filter(|r| r.risk_level.is_elevated()).count(),
            critical_risk_count: count(RiskLevel::Critical),
            medium_risk_count: count(RiskLevel::Medium),
            low_risk_count: count(RiskLevel::Low),
            last_detection: records.iter().map(|r| r.detected_at).max(),
        }
    }
}
