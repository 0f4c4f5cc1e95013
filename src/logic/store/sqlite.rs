//! SQLite-backed reading store and result sink

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{active_filter, ReadingStore, ResultSink, StoreCounts};
use crate::error::PipelineResult;
use crate::logic::detection::AnomalyRecord;
use crate::logic::features::{MeterReadings, Reading};
use crate::logic::model::{ModelKind, RiskLevel};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS meters (
        meter_id TEXT PRIMARY KEY,
        location TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS readings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        meter_id TEXT NOT NULL REFERENCES meters(meter_id),
        timestamp TEXT NOT NULL,
        consumption_kwh REAL NOT NULL
    );

    CREATE TABLE IF NOT EXISTS anomaly_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        meter_id TEXT NOT NULL REFERENCES meters(meter_id),
        anomaly_score REAL NOT NULL,
        is_suspicious INTEGER NOT NULL DEFAULT 0,
        risk_level TEXT NOT NULL DEFAULT 'low',
        hourly_avg REAL,
        daily_variance REAL,
        night_ratio REAL,
        explanation TEXT,
        model_used TEXT NOT NULL DEFAULT 'isolation_forest',
        run_id TEXT NOT NULL,
        detected_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_readings_meter_ts
        ON readings(meter_id, timestamp);

    CREATE INDEX IF NOT EXISTS idx_results_meter
        ON anomaly_results(meter_id);

    CREATE INDEX IF NOT EXISTS idx_results_score
        ON anomaly_results(anomaly_score DESC);
"#;

const RESULT_COLUMNS: &str = "meter_id, anomaly_score, is_suspicious, risk_level, hourly_avg, \
     daily_variance, night_ratio, explanation, model_used, run_id, detected_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> PipelineResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Self::with_connection(Connection::open(path)?)?;
        log::info!("Opened store at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> PipelineResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> PipelineResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Known meter with no readings yet
    pub fn register_meter(&self, meter_id: &str) -> PipelineResult<()> {
        self.conn.lock().execute(
            "INSERT OR IGNORE INTO meters (meter_id) VALUES (?1)",
            params![meter_id],
        )?;
        Ok(())
    }

    pub fn insert_readings(&self, meter_id: &str, readings: &[Reading]) -> PipelineResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("INSERT OR IGNORE INTO meters (meter_id) VALUES (?1)", params![meter_id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO readings (meter_id, timestamp, consumption_kwh) VALUES (?1, ?2, ?3)",
            )?;
            for reading in readings {
                stmt.execute(params![meter_id, reading.timestamp, reading.consumption_kwh])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Stored result rows for one meter (1 after any number of runs)
    pub fn result_row_count(&self, meter_id: &str) -> PipelineResult<usize> {
        let count: i64 = self.conn.lock().query_row(
            "SELECT COUNT(*) FROM anomaly_results WHERE meter_id = ?1",
            params![meter_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn text_error(index: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
}

/// Unparsable enum column
#[derive(Debug)]
struct UnknownValue(String);

impl std::fmt::Display for UnknownValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for UnknownValue {}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<AnomalyRecord> {
    let risk_level: String = row.get(3)?;
    let model_used: String = row.get(8)?;

    Ok(AnomalyRecord {
        meter_id: row.get(0)?,
        anomaly_score: row.get(1)?,
        is_suspicious: row.get(2)?,
        risk_level: risk_level
            .parse::<RiskLevel>()
            .map_err(|e| text_error(3, UnknownValue(e)))?,
        hourly_avg: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
        daily_variance: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
        night_ratio: row.get::<_, Option<f64>>(6)?.unwrap_or(0.0),
        explanation: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        model_used: model_used
            .parse::<ModelKind>()
            .map_err(|e| text_error(8, UnknownValue(e.to_string())))?,
        run_id: row.get(9)?,
        detected_at: row.get(10)?,
    })
}

impl ReadingStore for SqliteStore {
    fn readings_grouped_by_meter(&self, meter_ids: Option<&[String]>) -> PipelineResult<MeterReadings> {
        let conn = self.conn.lock();
        let filter = active_filter(meter_ids);
        let clause = filter
            .map(|ids| format!("WHERE meter_id IN ({})", vec!["?"; ids.len()].join(", ")))
            .unwrap_or_default();
        let bound: Vec<&String> = filter.map(|ids| ids.iter().collect()).unwrap_or_default();

        let mut grouped = MeterReadings::new();

        let mut meters = conn.prepare(&format!("SELECT meter_id FROM meters {}", clause))?;
        for meter_id in meters.query_map(params_from_iter(bound.iter()), |row| row.get::<_, String>(0))? {
            grouped.entry(meter_id?).or_default();
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT meter_id, timestamp, consumption_kwh FROM readings {} ORDER BY meter_id, timestamp",
            clause
        ))?;
        let rows = stmt.query_map(params_from_iter(bound.iter()), |row| {
            Ok((row.get::<_, String>(0)?, Reading::new(row.get(1)?, row.get(2)?)))
        })?;
        for row in rows {
            let (meter_id, reading) = row?;
            grouped.entry(meter_id).or_default().push(reading);
        }

        Ok(grouped)
    }

    fn readings_for_meter(&self, meter_id: &str) -> PipelineResult<Vec<Reading>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT timestamp, consumption_kwh FROM readings WHERE meter_id = ?1 ORDER BY timestamp",
        )?;
        let readings = stmt
            .query_map(params![meter_id], |row| Ok(Reading::new(row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(readings)
    }

    fn counts(&self) -> PipelineResult<StoreCounts> {
        let conn = self.conn.lock();
        let (meters, readings): (i64, i64) = conn.query_row(
            "SELECT (SELECT COUNT(*) FROM meters), (SELECT COUNT(*) FROM readings)",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(StoreCounts {
            meters: meters as usize,
            readings: readings as usize,
        })
    }
}

impl ResultSink for SqliteStore {
    /// Delete-then-insert inside one transaction
    fn save_anomaly_result(&self, record: &AnomalyRecord) -> PipelineResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute("INSERT OR IGNORE INTO meters (meter_id) VALUES (?1)", params![record.meter_id])?;
        tx.execute("DELETE FROM anomaly_results WHERE meter_id = ?1", params![record.meter_id])?;
        tx.execute(
            &format!(
                "INSERT INTO anomaly_results ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                RESULT_COLUMNS
            ),
            params![
                record.meter_id,
                record.anomaly_score,
                record.is_suspicious,
                record.risk_level.as_str(),
                record.hourly_avg,
                record.daily_variance,
                record.night_ratio,
                record.explanation,
                record.model_used.as_str(),
                record.run_id,
                record.detected_at,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn anomaly_results(&self) -> PipelineResult<Vec<AnomalyRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM anomaly_results ORDER BY anomaly_score DESC, meter_id ASC",
            RESULT_COLUMNS
        ))?;
        let records = stmt
            .query_map([], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn anomaly_result_for_meter(&self, meter_id: &str) -> PipelineResult<Option<AnomalyRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                &format!("SELECT {} FROM anomaly_results WHERE meter_id = ?1", RESULT_COLUMNS),
                params![meter_id],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }
}
