use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::features::FeatureVector;
use crate::logic::model::{ModelKind, RiskLevel};

/// Latest detection outcome for one meter. The sink keeps at most one per meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub meter_id: String,
    /// 0 = normal, 1 = most anomalous in its batch
    pub anomaly_score: f64,
    pub is_suspicious: bool,
    pub risk_level: RiskLevel,
    pub hourly_avg: f64,
    pub daily_variance: f64,
    pub night_ratio: f64,
    pub explanation: String,
    pub model_used: ModelKind,
    /// Detection run that produced this record
    pub run_id: String,
    pub detected_at: DateTime<Utc>,
}

impl AnomalyRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        meter_id: &str,
        features: &FeatureVector,
        anomaly_score: f64,
        is_suspicious: bool,
        risk_level: RiskLevel,
        explanation: String,
        model_used: ModelKind,
        run_id: &str,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            meter_id: meter_id.to_string(),
            anomaly_score,
            is_suspicious,
            risk_level,
            hourly_avg: features.hourly_avg(),
            daily_variance: features.daily_variance(),
            night_ratio: features.night_ratio(),
            explanation,
            model_used,
            run_id: run_id.to_string(),
            detected_at,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn sample_record(meter_id: &str, score: f64) -> AnomalyRecord {
        let features = FeatureVector::from_values([0.8, 0.1, 1.0, 1.2, 1.0, 0.3, 2.0, 0.1, 1.9]);
        AnomalyRecord::new(
            meter_id,
            &features,
            score,
            score >= 0.5,
            RiskLevel::from_score(score),
            "[LOW RISK] Unusual consumption pattern detected by statistical analysis.".to_string(),
            ModelKind::IsolationForest,
            "run-1",
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_record_copies_selected_features() {
        let record = sample_record("M1", 0.6);
        assert_eq!(record.hourly_avg, 0.8);
        assert_eq!(record.daily_variance, 0.1);
        assert_eq!(record.night_ratio, 1.0);
        assert_eq!(record.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::to_value(sample_record("M1", 0.9)).unwrap();
        assert_eq!(json["risk_level"], "critical");
        assert_eq!(json["model_used"], "isolation_forest");
        assert_eq!(json["is_suspicious"], true);
    }
}
