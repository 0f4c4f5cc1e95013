//! Store Module - Reading source and result sink
//!
//! The pipeline reads readings and writes results only through these two
//! traits. Every call is blocking from the pipeline's point of view.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::PipelineResult;
use crate::logic::detection::AnomalyRecord;
use crate::logic::features::{MeterReadings, Reading};

/// Registered meters and stored readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub meters: usize,
    pub readings: usize,
}

pub trait ReadingStore: Send + Sync {
    /// Readings per meter, each ordered by timestamp.
    /// `None` or an empty filter means every meter.
    fn readings_grouped_by_meter(&self, meter_ids: Option<&[String]>) -> PipelineResult<MeterReadings>;

    /// Ordered readings of one meter, empty when unknown
    fn readings_for_meter(&self, meter_id: &str) -> PipelineResult<Vec<Reading>>;

    /// Every registered meter counts, with or without readings or results
    fn counts(&self) -> PipelineResult<StoreCounts>;
}

pub trait ResultSink: Send + Sync {
    /// Replace whatever record `record.meter_id` had. No prior record is fine.
    fn save_anomaly_result(&self, record: &AnomalyRecord) -> PipelineResult<()>;

    /// Live records, highest score first
    fn anomaly_results(&self) -> PipelineResult<Vec<AnomalyRecord>>;

    fn anomaly_result_for_meter(&self, meter_id: &str) -> PipelineResult<Option<AnomalyRecord>>;
}

/// Empty filters select everything
pub(crate) fn active_filter(meter_ids: Option<&[String]>) -> Option<&[String]> {
    meter_ids.filter(|ids| !ids.is_empty())
}

/// Highest score first, meter id breaks ties
pub(crate) fn sort_by_score(records: &mut [AnomalyRecord]) {
    records.sort_by(|a, b| {
        b.anomaly_score
            .total_cmp(&a.anomaly_score)
            .then_with(|| a.meter_id.cmp(&b.meter_id))
    });
}
