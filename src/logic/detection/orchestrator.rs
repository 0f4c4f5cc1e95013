//! Detection Orchestrator
//!
//! One run:
//! 1. pull readings grouped by meter (optionally filtered)
//! 2. extract features in batch, stack into a matrix
//! 3. build a fresh detector, `fit_predict` on the batch
//! 4. explain, tier and persist one record per meter
//!
//! The orchestrator keeps no model between runs.

use chrono::Utc;
use uuid::Uuid;

use super::record::AnomalyRecord;
use super::series::{mark_readings, MeterAnalysis, MeterTimeSeries};
use super::summary::DetectionSummary;
use crate::config::Settings;
use crate::error::{PipelineError, PipelineResult};
use crate::logic::features::{batch_to_array, extract_features, extract_features_batch};
use crate::logic::model::{create_detector, ModelKind};
use crate::logic::store::{ReadingStore, ResultSink};

pub struct DetectionOrchestrator<'a> {
    store: &'a dyn ReadingStore,
    sink: &'a dyn ResultSink,
    settings: Settings,
}

impl<'a> DetectionOrchestrator<'a> {
    pub fn new(store: &'a dyn ReadingStore, sink: &'a dyn ResultSink, settings: Settings) -> Self {
        Self { store, sink, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Score every requested meter and replace its stored record.
    ///
    /// `threshold` (in [0, 1]) overrides the detector's own flag rule; when
    /// absent the configured `ANOMALY_THRESHOLD` applies, if any. Returns the
    /// fresh records in meter id order, empty when there is no data.
    pub fn run_detection(
        &self,
        model: ModelKind,
        threshold: Option<f64>,
        meter_ids: Option<&[String]>,
    ) -> PipelineResult<Vec<AnomalyRecord>> {
        let threshold = threshold.or(self.settings.anomaly_threshold);
        if let Some(t) = threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(PipelineError::InvalidConfig(format!(
                    "threshold must be in [0, 1], got {}",
                    t
                )));
            }
        }

        let readings = self.store.readings_grouped_by_meter(meter_ids)?;
        if readings.is_empty() {
            log::info!("No readings for the requested meters, nothing to detect");
            return Ok(Vec::new());
        }

        let run_id = Uuid::new_v4().to_string();
        log::info!(
            "Detection run {} started: model={}, meters={}, threshold={:?}",
            run_id,
            model,
            readings.len(),
            threshold
        );

        let features = extract_features_batch(&readings);
        let (ids, matrix) = batch_to_array(&features);

        let mut detector = create_detector(model, &self.settings, threshold);
        let prediction = detector.fit_predict(&matrix)?;

        let detected_at = Utc::now();
        let mut records = Vec::with_capacity(ids.len());

        for ((meter_id, score), suspicious) in ids.iter().zip(&prediction.scores).zip(&prediction.flags) {
            // ids come from the same map
            let Some(vector) = features.get(meter_id) else {
                continue;
            };

            let explanation = detector.generate_explanation(vector, *score, *suspicious)?;
            let record = AnomalyRecord::new(
                meter_id,
                vector,
                *score,
                *suspicious,
                detector.get_risk_level(*score),
                explanation,
                model,
                &run_id,
                detected_at,
            );

            self.sink.save_anomaly_result(&record)?;
            records.push(record);
        }

        log::info!(
            "Detection run {} finished: {}/{} meters suspicious",
            run_id,
            prediction.suspicious_count(),
            records.len()
        );
        Ok(records)
    }

    /// Recomputed features and the live record. `None` when the meter has no readings.
    pub fn get_meter_analysis(&self, meter_id: &str) -> PipelineResult<Option<MeterAnalysis>> {
        let readings = self.store.readings_for_meter(meter_id)?;
        if readings.is_empty() {
            return Ok(None);
        }

        Ok(Some(MeterAnalysis {
            meter_id: meter_id.to_string(),
            readings_count: readings.len(),
            features: extract_features(&readings),
            anomaly_result: self.sink.anomaly_result_for_meter(meter_id)?,
        }))
    }

    /// Readings with per-reading spike marks. `None` when the meter has no readings.
    pub fn get_meter_time_series(&self, meter_id: &str) -> PipelineResult<Option<MeterTimeSeries>> {
        let readings = self.store.readings_for_meter(meter_id)?;
        if readings.is_empty() {
            return Ok(None);
        }

        let features = extract_features(&readings);
        let anomaly_result = self.sink.anomaly_result_for_meter(meter_id)?;
        let suspicious = anomaly_result.as_ref().is_some_and(|r| r.is_suspicious);

        Ok(Some(MeterTimeSeries {
            meter_id: meter_id.to_string(),
            readings: mark_readings(&readings, &features, suspicious),
            anomaly_result,
            stats: features,
        }))
    }

    /// Live records, highest score first
    pub fn results(&self) -> PipelineResult<Vec<AnomalyRecord>> {
        self.sink.anomaly_results()
    }

    /// Fleet totals from the reading store, outcomes from the live records
    pub fn summary(&self) -> PipelineResult<DetectionSummary> {
        Ok(DetectionSummary::new(self.store.counts()?, &self.sink.anomaly_results()?))
    }
}
