use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, error, info, warn};
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::db::{Database, Reading};
use crate::validation::{self, Rejection, LOOKBACK_MINUTES};

use super::{SensorReader, SensorSample};

/// Upper bound for one sampling cycle (sensor retries plus the DB round trips).
const CYCLE_TIMEOUT_SECS: u64 = 90;

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Stored(Reading),
    Rejected(Rejection),
}

pub async fn sampling_loop(
    db: Database,
    reader: SensorReader,
    sensor_id: String,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let fut = ingest_once(&db, &reader, &sensor_id, Utc::now());

                match tokio::time::timeout(Duration::from_secs(CYCLE_TIMEOUT_SECS), fut).await {
                    Ok(Ok(IngestOutcome::Stored(reading))) => debug!(
                        "stored reading {:.1}C {:.1}% for sensor {}",
                        reading.temperature, reading.humidity, reading.sensor_id
                    ),
                    Ok(Ok(IngestOutcome::Rejected(reason))) => {
                        warn!("dropping sample for sensor {sensor_id}: {reason}")
                    }
                    Ok(Err(err)) => error!("sampling cycle failed for sensor {sensor_id}: {err:?}"),
                    Err(_) => warn!("sampling cycle timeout (> {}s) sensor {}", CYCLE_TIMEOUT_SECS, sensor_id),
                }
            }
            _ = cancel_token.cancelled() => {
                info!("sampling loop shutting down");
                break;
            }
        }
    }
}

/// One sampling cycle: read, validate against recent history, store.
///
/// Rejected samples are dropped; the next scheduled cycle tries again. An
/// `Err` means the accepted sample could not be written.
pub async fn ingest_once(
    db: &Database,
    reader: &SensorReader,
    sensor_id: &str,
    now: DateTime<Utc>,
) -> Result<IngestOutcome> {
    let sample = reader.read().await;
    ingest_sample(db, sensor_id, sample, now).await
}

pub(crate) async fn ingest_sample(
    db: &Database,
    sensor_id: &str,
    sample: SensorSample,
    now: DateTime<Utc>,
) -> Result<IngestOutcome> {
    let previous = recent_reading(db, sensor_id, now).await;

    if let Err(reason) = validation::check(&sample, previous.as_ref()) {
        return Ok(IngestOutcome::Rejected(reason));
    }

    let (Some(temperature), Some(humidity)) = (sample.temperature, sample.humidity) else {
        return Ok(IngestOutcome::Rejected(Rejection::SensorReadFailure));
    };

    let reading = Reading {
        timestamp: now,
        sensor_id: sensor_id.to_string(),
        temperature,
        humidity,
    };

    db.insert_reading(&reading)
        .await
        .context("failed to persist reading")?;

    Ok(IngestOutcome::Stored(reading))
}

/// The continuity context. Any lookup failure counts as "no prior reading".
async fn recent_reading(db: &Database, sensor_id: &str, now: DateTime<Utc>) -> Option<Reading> {
    let since = now - ChronoDuration::minutes(LOOKBACK_MINUTES);
    match db.latest_reading_since(sensor_id, since).await {
        Ok(previous) => previous,
        Err(err) => {
            warn!("continuity lookup failed for sensor {sensor_id}, skipping check: {err:#}");
            None
        }
    }
}
