use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{format_timestamp, parse_timestamp},
    models::Reading,
};

fn row_to_reading(row: &Row) -> Result<Reading> {
    let timestamp: String = row.get("rDatetime")?;

    Ok(Reading {
        timestamp: parse_timestamp(&timestamp, "rDatetime")?,
        sensor_id: row.get("sensorID")?,
        temperature: row.get("temperature")?,
        humidity: row.get("humidity")?,
    })
}

impl Database {
    pub async fn insert_reading(&self, reading: &Reading) -> Result<()> {
        let record = reading.clone();
        self.write(move |conn| {
            conn.execute(
                "INSERT INTO sensor_values (rDatetime, sensorID, temperature, humidity)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    format_timestamp(&record.timestamp),
                    record.sensor_id,
                    record.temperature,
                    record.humidity,
                ],
            )
            .with_context(|| "failed to insert reading")?;
            Ok(())
        })
        .await
    }

    /// Readings for `sensor_id` with `from <= timestamp <= to`, in insertion
    /// order. A reversed window simply matches nothing.
    ///
    /// Stored timestamps go through `datetime()` so minute-precision rows
    /// compare as `HH:MM:00`. Rows whose timestamp SQLite can't read are skipped.
    pub async fn scan_readings(
        &self,
        sensor_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Reading>> {
        let sensor_id = sensor_id.to_string();
        self.read(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT datetime(rDatetime) AS rDatetime, sensorID, temperature, humidity
                 FROM sensor_values
                 WHERE sensorID = ?1 AND datetime(rDatetime) BETWEEN ?2 AND ?3
                 ORDER BY rowid ASC",
            )?;

            let mut rows = stmt.query(params![
                sensor_id,
                format_timestamp(&from),
                format_timestamp(&to),
            ])?;

            let mut readings = Vec::new();
            while let Some(row) = rows.next()? {
                readings.push(row_to_reading(row)?);
            }

            Ok(readings)
        })
        .await
    }

    /// Most recent reading for `sensor_id` strictly newer than `since`.
    /// Unreadable timestamps never qualify.
    pub async fn latest_reading_since(
        &self,
        sensor_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Reading>> {
        let sensor_id = sensor_id.to_string();
        self.read(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT datetime(rDatetime) AS rDatetime, sensorID, temperature, humidity
                 FROM sensor_values
                 WHERE sensorID = ?1 AND datetime(rDatetime) > ?2
                 ORDER BY datetime(rDatetime) DESC, rowid DESC
                 LIMIT 1",
            )?;

            let mut rows = stmt.query(params![sensor_id, format_timestamp(&since)])?;
            let reading = match rows.next()? {
                Some(row) => Some(row_to_reading(row)?),
                None => None,
            };
            Ok(reading)
        })
        .await
    }
}
