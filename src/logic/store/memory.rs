//! In-process store, used by tests and one-shot runs

use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{active_filter, sort_by_score, ReadingStore, ResultSink, StoreCounts};
use crate::error::PipelineResult;
use crate::logic::detection::AnomalyRecord;
use crate::logic::features::{MeterReadings, Reading};

#[derive(Debug, Default)]
pub struct MemoryStore {
    readings: RwLock<MeterReadings>,
    results: RwLock<BTreeMap<String, AnomalyRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Known meter with no readings yet
    pub fn register_meter(&self, meter_id: &str) {
        self.readings.write().entry(meter_id.to_string()).or_default();
    }

    pub fn insert_readings(&self, meter_id: &str, readings: &[Reading]) {
        let mut all = self.readings.write();
        let entry = all.entry(meter_id.to_string()).or_default();
        entry.extend_from_slice(readings);
        entry.sort_by_key(|r| r.timestamp);
    }

    pub fn result_count(&self) -> usize {
        self.results.read().len()
    }
}

impl ReadingStore for MemoryStore {
    fn readings_grouped_by_meter(&self, meter_ids: Option<&[String]>) -> PipelineResult<MeterReadings> {
        let all = self.readings.read();
        let grouped = match active_filter(meter_ids) {
            Some(ids) => all
                .iter()
                .filter(|(id, _)| ids.contains(id))
                .map(|(id, readings)| (id.clone(), readings.clone()))
                .collect(),
            None => all.clone(),
        };
        Ok(grouped)
    }

    fn readings_for_meter(&self, meter_id: &str) -> PipelineResult<Vec<Reading>> {
        Ok(self.readings.read().get(meter_id).cloned().unwrap_or_default())
    }

    fn counts(&self) -> PipelineResult<StoreCounts> {
        let all = self.readings.read();
        Ok(StoreCounts {
            meters: all.len(),
            readings: all.values().map(Vec::len).sum(),
        })
    }
}

impl ResultSink for MemoryStore {
    fn save_anomaly_result(&self, record: &AnomalyRecord) -> PipelineResult<()> {
        self.register_meter(&record.meter_id);
        self.results.write().insert(record.meter_id.clone(), record.clone());
        Ok(())
    }

    fn anomaly_results(&self) -> PipelineResult<Vec<AnomalyRecord>> {
        let mut records: Vec<AnomalyRecord> = self.results.read().values().cloned().collect();
        sort_by_score(&mut records);
        Ok(records)
    }

    fn anomaly_result_for_meter(&self, meter_id: &str) -> PipelineResult<Option<AnomalyRecord>> {
        Ok(self.results.read().get(meter_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::detection::record::tests::sample_record;
    use chrono::NaiveDate;

    fn reading(hour: u32, kwh: f64) -> Reading {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        Reading::new(ts, kwh)
    }

    #[test]
    fn test_readings_are_ordered() {
        let store = MemoryStore::new();
        store.insert_readings("M1", &[reading(5, 1.0), reading(1, 2.0)]);
        store.insert_readings("M1", &[reading(3, 3.0)]);

        let hours: Vec<f64> = store
            .readings_for_meter("M1")
            .unwrap()
            .iter()
            .map(|r| r.consumption_kwh)
            .collect();
        assert_eq!(hours, vec![2.0, 3.0, 1.0]);
        assert!(store.readings_for_meter("missing").unwrap().is_empty());
    }

    #[test]
    fn test_filter() {
        let store = MemoryStore::new();
        store.insert_readings("M1", &[reading(1, 1.0)]);
        store.insert_readings("M2", &[reading(1, 1.0)]);
        store.register_meter("M3");

        let all = store.readings_grouped_by_meter(None).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all["M3"].is_empty());

        let ids = vec!["M2".to_string(), "unknown".to_string()];
        let some = store.readings_grouped_by_meter(Some(&ids)).unwrap();
        assert_eq!(some.keys().collect::<Vec<_>>(), vec!["M2"]);

        assert_eq!(store.readings_grouped_by_meter(Some(&[])).unwrap().len(), 3);
    }

    #[test]
    fn test_upsert_and_ordering() {
        let store = MemoryStore::new();
        store.save_anomaly_result(&sample_record("M1", 0.2)).unwrap();
        store.save_anomaly_result(&sample_record("M2", 0.9)).unwrap();
        store.save_anomaly_result(&sample_record("M1", 0.6)).unwrap();

        assert_eq!(store.result_count(), 2);
        let results = store.anomaly_results().unwrap();
        assert_eq!(results[0].meter_id, "M2");
        assert_eq!(results[1].anomaly_score, 0.6);
        assert_eq!(store.anomaly_result_for_meter("M1").unwrap().unwrap().anomaly_score, 0.6);
        assert!(store.anomaly_result_for_meter("M9").unwrap().is_none());
    }

    #[test]
    fn test_counts_include_meters_without_readings() {
        let store = MemoryStore::new();
        assert_eq!(store.counts().unwrap(), StoreCounts::default());

        store.insert_readings("M1", &[reading(1, 1.0), reading(2, 1.0)]);
        store.register_meter("M2");
        store.save_anomaly_result(&sample_record("M3", 0.7)).unwrap();

        assert_eq!(store.counts().unwrap(), StoreCounts { meters: 3, readings: 2 });
    }
}
