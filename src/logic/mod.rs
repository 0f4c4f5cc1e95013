//! Logic Module - Detection pipeline engines
//!
//! - `features/` - per-meter feature extraction
//! - `model/` - anomaly detectors, risk tiers, persistence
//! - `explain/` - human-readable reasons
//! - `store/` - reading source and result sink
//! - `detection/` - orchestration of a detection run

pub mod detection;
pub mod explain;
pub mod features;
pub mod model;
pub mod store;
