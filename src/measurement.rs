//! Measurements
//!
//! The CO2 readings served by `GET /data`, how they are parsed from the
//! parallel-array payload, and the trailing window that gets drawn.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PayloadError;

/// One timestamped CO2 concentration reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub timestamp: DateTime<Utc>,
    /// Concentration in ppm
    pub value: f64,
}

impl Measurement {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Local wall-clock time, used for chart labels
    pub fn label(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string()
    }
}

/// Body of `GET /data`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Co2Payload {
    pub timestamps: Vec<String>,
    pub co2values: Vec<f64>,
}

impl Co2Payload {
    /// Parse a raw response body
    pub fn from_json(body: &str) -> Result<Self, PayloadError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Pair `timestamps[i]` with `co2values[i]`
    pub fn into_measurements(self) -> Result<Vec<Measurement>, PayloadError> {
        if self.timestamps.len() != self.co2values.len() {
            return Err(PayloadError::LengthMismatch {
                timestamps: self.timestamps.len(),
                values: self.co2values.len(),
            });
        }

        self.timestamps
            .into_iter()
            .zip(self.co2values)
            .enumerate()
            .map(|(index, (ts, value))| match parse_timestamp(&ts) {
                Some(timestamp) => Ok(Measurement::new(timestamp, value)),
                None => Err(PayloadError::InvalidTimestamp { index, value: ts }),
            })
            .collect()
    }
}

impl FromIterator<Measurement> for Co2Payload {
    fn from_iter<I: IntoIterator<Item = Measurement>>(iter: I) -> Self {
        let mut payload = Co2Payload::default();
        for m in iter {
            payload.timestamps.push(m.timestamp.to_rfc3339());
            payload.co2values.push(m.value);
        }
        payload
    }
}

/// Parse a timestamp the way a lenient date parser would.
///
/// Accepted, in order: RFC 3339, ISO date-time without offset (local time),
/// ISO date (UTC midnight), `MM.DD.YYYY` / `MM/DD/YYYY` (local midnight),
/// and integer Unix milliseconds.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return local_to_utc(naive);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }

    for fmt in ["%m.%d.%Y", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).and_then(local_to_utc);
        }
    }

    s.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}

fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// The trailing subset of measurements that is actually drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayWindow {
    pub last_n: usize,
}

impl Default for DisplayWindow {
    fn default() -> Self {
        Self { last_n: 100 }
    }
}

impl DisplayWindow {
    pub fn new(last_n: usize) -> Self {
        Self { last_n }
    }

    /// Sort ascending by timestamp and keep the latest `last_n` entries.
    ///
    /// The sort is stable, so readings sharing a timestamp keep server order.
    pub fn apply(&self, measurements: &[Measurement]) -> Vec<Measurement> {
        let mut sorted = measurements.to_vec();
        sorted.sort_by_key(|m| m.timestamp);
        let skip = sorted.len().saturating_sub(self.last_n);
        sorted.split_off(skip)
    }
}
