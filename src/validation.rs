//! Plausibility and continuity checks applied to raw sensor samples before
//! they are written to the store.
//!
//! Rules run in order and the first failure wins:
//! 1. both values must be present and finite,
//! 2. humidity in `[0, 100]` %RH and temperature in `[-50, 100]` °C,
//! 3. when a reading from the last [`LOOKBACK_MINUTES`] exists, neither value
//!    may move by more than `max(2, 10% of the previous value)`.

use std::fmt;

use crate::db::Reading;
use crate::sensing::SensorSample;

/// How far back a stored reading still counts as the previous value.
pub const LOOKBACK_MINUTES: i64 = 8;

pub const HUMIDITY_MIN_PCT: f64 = 0.0;
pub const HUMIDITY_MAX_PCT: f64 = 100.0;
pub const TEMP_MIN_C: f64 = -50.0;
pub const TEMP_MAX_C: f64 = 100.0;

const MIN_ALLOWED_STEP: f64 = 2.0;
const MAX_RELATIVE_STEP: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// The sensor produced no usable value.
    SensorReadFailure,
    /// A value is outside its physical bounds.
    Implausible { temperature: f64, humidity: f64 },
    /// A value jumped too far from the previous reading.
    Discontinuous {
        temperature_delta: f64,
        humidity_delta: f64,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::SensorReadFailure => write!(f, "sensor returned no value"),
            Rejection::Implausible {
                temperature,
                humidity,
            } => write!(
                f,
                "implausible reading ({temperature:.1}C, {humidity:.1}%)"
            ),
            Rejection::Discontinuous {
                temperature_delta,
                humidity_delta,
            } => write!(
                f,
                "discontinuous reading (dT={temperature_delta:.1}, dH={humidity_delta:.1})"
            ),
        }
    }
}

/// `true` when `candidate` may be stored. `previous` is the most recent
/// stored reading inside the lookback window, or `None` if there is none or
/// it could not be loaded.
pub fn validate(candidate: &SensorSample, previous: Option<&Reading>) -> bool {
    check(candidate, previous).is_ok()
}

pub fn check(candidate: &SensorSample, previous: Option<&Reading>) -> Result<(), Rejection> {
    let (Some(temperature), Some(humidity)) = (
        candidate.temperature.filter(|v| v.is_finite()),
        candidate.humidity.filter(|v| v.is_finite()),
    ) else {
        return Err(Rejection::SensorReadFailure);
    };

    if !(HUMIDITY_MIN_PCT..=HUMIDITY_MAX_PCT).contains(&humidity)
        || !(TEMP_MIN_C..=TEMP_MAX_C).contains(&temperature)
    {
        return Err(Rejection::Implausible {
            temperature,
            humidity,
        });
    }

    if let Some(prev) = previous {
        let temperature_delta = (temperature - prev.temperature).abs();
        let humidity_delta = (humidity - prev.humidity).abs();
        if temperature_delta > allowed_step(prev.temperature)
            || humidity_delta > allowed_step(prev.humidity)
        {
            return Err(Rejection::Discontinuous {
                temperature_delta,
                humidity_delta,
            });
        }
    }

    Ok(())
}

fn allowed_step(previous: f64) -> f64 {
    MIN_ALLOWED_STEP.max(previous * MAX_RELATIVE_STEP)
}
