use std::sync::{
    atomic::{AtomicI64, Ordering},
    RwLock,
};

use chrono::Utc;
use log::warn;
use serde::Serialize;

use super::SensorReader;

/// Current values as reported to the `/temp_current` and `/temp_api` routes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CurrentReading {
    pub humidity: Option<f64>,
    pub temperature: Option<f64>,
}

/// Single-entry, time-based cache in front of the physical sensor. No
/// validation is applied on this path; it only rate-limits polling.
pub struct LiveCache {
    reader: SensorReader,
    ttl_ms: i64,
    /// Wall-clock millis of the last refresh attempt. `i64::MIN` = never.
    fetched_at_ms: AtomicI64,
    value: RwLock<CurrentReading>,
}

impl LiveCache {
    pub fn new(reader: SensorReader, ttl_ms: u64) -> Self {
        Self {
            reader,
            ttl_ms: i64::try_from(ttl_ms).unwrap_or(i64::MAX),
            fetched_at_ms: AtomicI64::new(i64::MIN),
            value: RwLock::new(CurrentReading::default()),
        }
    }

    pub async fn current(&self) -> CurrentReading {
        self.current_at(Utc::now().timestamp_millis()).await
    }

    pub(crate) async fn current_at(&self, now_ms: i64) -> CurrentReading {
        if self.claim_refresh(now_ms) {
            let sample = self.reader.read().await;
            if sample.is_complete() {
                let mut guard = match self.value.write() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                *guard = CurrentReading {
                    humidity: sample.humidity,
                    temperature: sample.temperature,
                };
            } else {
                warn!("live read failed; serving previous values");
            }
        }

        match self.value.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Stamps the refresh time if the entry is stale. Only the caller whose
    /// compare-and-swap succeeds performs the physical read.
    fn claim_refresh(&self, now_ms: i64) -> bool {
        let last = self.fetched_at_ms.load(Ordering::Acquire);
        if last != i64::MIN && last.saturating_add(self.ttl_ms) >= now_ms {
            return false;
        }
        self.fetched_at_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
