//! Stored sensor reading.

use chrono::{DateTime, Utc};
/// One accepted sample. Rows are append-only: once inserted a reading is
/// never updated or deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub sensor_id: String,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Percent relative humidity.
    pub humidity: f64,
}
