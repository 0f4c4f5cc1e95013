use super::types::{Explanation, Severity};
use crate::logic::features::FeatureVector;

pub const NORMAL_EXPLANATION: &str = "No anomalies detected. Consumption patterns appear normal.";

const HIGH_RATIO: f64 = 1.5;
const LOW_RATIO: f64 = 0.5;
const HIGH_VARIANCE: f64 = 2.0;
const HIGH_STD: f64 = 2.0;
const HIGH_AVERAGE: f64 = 2.0;
// Below this the meter is likely bypassed
const TAMPERING_AVERAGE: f64 = 0.3;
const SPIKE_RANGE_FACTOR: f64 = 5.0;

fn forest_severity(score: f64) -> Severity {
    if score > 0.8 {
        Severity::Critical
    } else if score > 0.6 {
        Severity::High
    } else if score > 0.4 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn reconstruction_severity(score: f64) -> Severity {
    if score > 0.7 {
        Severity::High
    } else if score > 0.4 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Clause rules of the isolation forest, in output order
pub fn isolation_forest_findings(features: &FeatureVector) -> Vec<String> {
    let mut findings = Vec::new();

    let night = features.night_ratio();
    if night > HIGH_RATIO {
        findings.push(format!(
            "Unusually high night-time consumption ({:.1}% of expected)",
            night * 100.0
        ));
    } else if night < LOW_RATIO {
        findings.push(format!(
            "Abnormally low night-time consumption ({:.1}% of expected)",
            night * 100.0
        ));
    }

    let peak = features.peak_ratio();
    if peak > HIGH_RATIO {
        findings.push("Elevated peak hour consumption".into());
    } else if peak < LOW_RATIO {
        findings.push("Unusually low peak hour consumption".into());
    }

    let variance = features.daily_variance();
    if variance > HIGH_VARIANCE {
        findings.push("High daily consumption variance indicating irregular usage patterns".into());
    }

    let std = features.consumption_std();
    if std > HIGH_STD {
        findings.push("Highly variable consumption suggesting irregular patterns".into());
    }

    let avg = features.hourly_avg();
    if avg > HIGH_AVERAGE {
        findings.push("Extremely high average consumption compared to typical households".into());
    } else if avg < TAMPERING_AVERAGE {
        findings.push("Suspiciously low average consumption - possible meter tampering".into());
    }

    let range = features.consumption_range();
    if range > SPIKE_RANGE_FACTOR * avg {
        findings.push("Extreme consumption spikes detected".into());
    }

    findings
}

/// Coarser clause rules of the reconstruction model
pub fn reconstruction_findings(features: &FeatureVector) -> Vec<String> {
    let mut findings = Vec::new();

    let night = features.night_ratio();
    if night > HIGH_RATIO {
        findings.push("Unusual night-time consumption spike detected".into());
    } else if night < LOW_RATIO {
        findings.push("Abnormally low night-time consumption".into());
    }

    let variance = features.daily_variance();
    if variance > HIGH_VARIANCE {
        findings.push("Highly irregular daily consumption patterns".into());
    }

    let std = features.consumption_std();
    if std > HIGH_STD {
        findings.push("Extreme variability in consumption".into());
    }

    findings
}

pub fn explain_isolation_forest(features: &FeatureVector, score: f64, is_suspicious: bool) -> String {
    if !is_suspicious {
        return NORMAL_EXPLANATION.to_string();
    }

    let mut findings = isolation_forest_findings(features);
    if findings.is_empty() {
        findings.push("Unusual consumption pattern detected by statistical analysis".into());
    }

    Explanation {
        severity: forest_severity(score),
        source: None,
        findings,
    }
    .render()
}

pub fn explain_reconstruction(features: &FeatureVector, score: f64, is_suspicious: bool) -> String {
    if !is_suspicious {
        return NORMAL_EXPLANATION.to_string();
    }

    let mut findings = reconstruction_findings(features);
    if findings.is_empty() {
        findings.push("Consumption pattern differs significantly from normal behavior".into());
    }

    Explanation {
        severity: reconstruction_severity(score),
        source: Some("reconstruction model".to_string()),
        findings,
    }
    .render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::FeatureVectorBuilder;

    fn neutral() -> FeatureVectorBuilder {
        FeatureVectorBuilder::new()
            .hourly_avg(1.0)
            .night_ratio(1.0)
            .peak_ratio(1.0)
            .weekend_ratio(1.0)
            .consumption_std(0.5)
            .max_consumption(2.0)
            .min_consumption(0.5)
            .consumption_range(1.5)
    }

    #[test]
    fn test_not_suspicious_is_neutral() {
        let features = neutral().night_ratio(3.0).build();
        assert_eq!(explain_isolation_forest(&features, 0.99, false), NORMAL_EXPLANATION);
        assert_eq!(explain_reconstruction(&features, 0.99, false), NORMAL_EXPLANATION);
    }

    #[test]
    fn test_generic_clause_when_nothing_deviates() {
        let features = neutral().build();
        assert_eq!(
            explain_isolation_forest(&features, 0.5, true),
            "[MEDIUM RISK] Unusual consumption pattern detected by statistical analysis."
        );
        assert_eq!(
            explain_reconstruction(&features, 0.5, true),
            "[MEDIUM RISK - reconstruction model] Consumption pattern differs significantly from normal behavior."
        );
    }

    #[test]
    fn test_forest_clauses_in_order() {
        let features = neutral().night_ratio(1.8).hourly_avg(0.1).build();
        assert_eq!(
            explain_isolation_forest(&features, 0.9, true),
            "[CRITICAL RISK] Unusually high night-time consumption (180.0% of expected); \
             Suspiciously low average consumption - possible meter tampering; \
             Extreme consumption spikes detected."
        );
    }

    #[test]
    fn test_reconstruction_clauses() {
        let features = neutral().night_ratio(0.2).daily_variance(3.0).consumption_std(2.5).build();
        assert_eq!(
            explain_reconstruction(&features, 0.8, true),
            "[HIGH RISK - reconstruction model] Abnormally low night-time consumption; \
             Highly irregular daily consumption patterns; Extreme variability in consumption."
        );
    }

    #[test]
    fn test_severity_boundaries_are_strict() {
        assert_eq!(forest_severity(0.8), Severity::High);
        assert_eq!(forest_severity(0.81), Severity::Critical);
        assert_eq!(forest_severity(0.4), Severity::Low);
        assert_eq!(reconstruction_severity(0.7), Severity::Medium);
        assert_eq!(reconstruction_severity(0.71), Severity::High);
    }

    #[test]
    fn test_suspicious_never_empty() {
        for score in [0.0, 0.3, 0.5, 0.7, 1.0] {
            let features = FeatureVector::new();
            assert!(!explain_isolation_forest(&features, score, true).trim().is_empty());
            assert!(!explain_reconstruction(&features, score, true).trim().is_empty());
        }
    }
}
