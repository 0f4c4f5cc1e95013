use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use super::record::AnomalyRecord;
use crate::logic::features::{FeatureVector, Reading};

/// Feature vector as an ordered `name -> value` map
pub(crate) fn named_features<S: Serializer>(features: &FeatureVector, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(features.named_values())
}

/// On-demand diagnostics for one meter, no model involved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterAnalysis {
    pub meter_id: String,
    pub readings_count: usize,
    #[serde(serialize_with = "named_features")]
    pub features: FeatureVector,
    pub anomaly_result: Option<AnomalyRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReadingPoint {
    pub timestamp: NaiveDateTime,
    pub consumption_kwh: f64,
    pub is_anomaly: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterTimeSeries {
    pub meter_id: String,
    pub readings: Vec<ReadingPoint>,
    pub anomaly_result: Option<AnomalyRecord>,
    #[serde(serialize_with = "named_features")]
    pub stats: FeatureVector,
}

/// Level above which a single reading of a suspicious meter is marked
pub fn spike_threshold(features: &FeatureVector) -> f64 {
    let avg = features.hourly_avg();
    let std = features.consumption_std();
    if std > 0.0 {
        avg + 2.0 * std
    } else {
        avg * 2.0
    }
}

/// Only meters whose live record is suspicious get reading-level marks
pub fn mark_readings(readings: &[Reading], features: &FeatureVector, suspicious: bool) -> Vec<ReadingPoint> {
    let threshold = spike_threshold(features);
    readings
        .iter()
        .map(|r| ReadingPoint {
            timestamp: r.timestamp,
            consumption_kwh: r.consumption_kwh,
            is_anomaly: suspicious && r.consumption_kwh > threshold,
        })
        .collect()
}
