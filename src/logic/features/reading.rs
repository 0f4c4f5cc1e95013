//! Meter readings as supplied by the reading store.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One hourly consumption sample (kWh >= 0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    pub consumption_kwh: f64,
}

impl Reading {
    pub fn new(timestamp: NaiveDateTime, consumption_kwh: f64) -> Self {
        Self { timestamp, consumption_kwh }
    }
}

/// Readings grouped by meter id. Ordered by id so batches are reproducible.
pub type MeterReadings = BTreeMap<String, Vec<Reading>>;
