use log::warn;
use serde::Serialize;

use crate::db::Database;

use super::range::{to_display, TimeWindow};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    /// `YYYY-MM-DD HH:MM` in the window's display timezone.
    pub timestamp: String,
    pub temperature: f64,
    pub humidity: f64,
}

/// Rows in storage order. A failed scan yields an empty result.
pub async fn query(db: &Database, window: &TimeWindow, sensor_id: &str) -> Vec<HistoryRow> {
    let readings = match db.scan_readings(sensor_id, window.from, window.to).await {
        Ok(readings) => readings,
        Err(err) => {
            warn!("history scan for sensor {sensor_id} failed, returning no rows: {err:#}");
            return Vec::new();
        }
    };

    readings
        .into_iter()
        .map(|reading| HistoryRow {
            timestamp: to_display(&reading.timestamp, window.display_timezone),
            temperature: round_tenth(reading.temperature),
            humidity: round_tenth(reading.humidity),
        })
        .collect()
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use chrono_tz::{Australia::Sydney, Tz};

    use super::*;
    use crate::db::Reading;
    use crate::history::range::resolve_at;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    async fn seeded() -> Database {
        let db = Database::new(":memory:").unwrap();
        for (ts, temperature, humidity) in [
            (at(10, 0), 21.3, 55.2),
            (at(10, 5), 21.46, 55.04),
            (at(23, 59), 19.95, 60.0),
        ] {
            db.insert_reading(&Reading {
                timestamp: ts,
                sensor_id: "1".into(),
                temperature,
                humidity,
            })
            .await
            .unwrap();
        }
        db
    }

    #[tokio::test]
    async fn returns_rows_rounded_and_in_display_timezone() {
        let db = seeded().await;
        let window = resolve_at(
            Some("2024-01-01 21:00"),
            Some("2024-01-01 21:00"),
            None,
            Sydney,
            at(12, 0),
        );

        let rows = query(&db, &window, "1").await;

        // Sydney is UTC+11 in January.
        assert_eq!(
            rows,
            vec![HistoryRow {
                timestamp: "2024-01-01 21:00".into(),
                temperature: 21.3,
                humidity: 55.2,
            }]
        );
    }

    #[tokio::test]
    async fn bounds_are_inclusive_and_values_rounded() {
        let db = seeded().await;
        let window = resolve_at(
            Some("2024-01-01 00:00"),
            Some("2024-01-01 23:59"),
            None,
            Tz::UTC,
            at(12, 0),
        );

        let rows = query(&db, &window, "1").await;

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].timestamp, "2024-01-01 10:05");
        assert_eq!(rows[1].temperature, 21.5);
        assert_eq!(rows[1].humidity, 55.0);
        assert_eq!(rows[2].timestamp, "2024-01-01 23:59");
        assert_eq!(rows[2].temperature, 20.0);
    }

    #[tokio::test]
    async fn repeated_queries_are_identical() {
        let db = seeded().await;
        let window = resolve_at(None, None, Some("48"), Tz::UTC, at(23, 59));

        let first = query(&db, &window, "1").await;
        let second = query(&db, &window, "1").await;

        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn reversed_window_yields_no_rows() {
        let db = seeded().await;
        let window = resolve_at(
            Some("2024-01-02 00:00"),
            Some("2024-01-01 00:00"),
            None,
            Tz::UTC,
            at(12, 0),
        );

        assert!(query(&db, &window, "1").await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_rows_degrade_to_empty_result() {
        let db = seeded().await;
        db.write(|conn| {
            conn.execute(
                "INSERT INTO sensor_values VALUES ('2024-01-01 11:00:00', '1', 'warm', 50.0)",
                [],
            )?;
            Ok(())
        })
        .await
        .unwrap();
        let window = resolve_at(None, None, Some("24"), Tz::UTC, at(23, 59));

        assert!(query(&db, &window, "1").await.is_empty());
    }
}
