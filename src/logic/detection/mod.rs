//! Detection Module - Batch detection runs and their outputs

pub mod orchestrator;
pub mod record;
pub mod series;
pub mod summary;


pub use orchestrator::DetectionOrchestrator;
pub use record::AnomalyRecord;
pub use series::{MeterAnalysis, MeterTimeSeries, ReadingPoint};
pub use summary::DetectionSummary;
