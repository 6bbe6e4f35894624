use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use rand::Rng;

use crate::config::{SensorConfig, SensorKind};

/// Raw values from one physical read. `None` means the sensor did not
/// produce that value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorSample {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

impl SensorSample {
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.temperature.is_some() && self.humidity.is_some()
    }
}

/// A temperature/humidity sensor. `read` performs a single blocking attempt.
pub trait HumitureSensor: Send + Sync {
    fn read(&self) -> Result<SensorSample>;

    fn describe(&self) -> String;
}

/// Linux IIO device exposed by the `dht11` kernel driver (DHT11/DHT22/AM2302).
pub struct IioSensor {
    model: String,
    device: PathBuf,
}

impl IioSensor {
    pub fn new(model: impl Into<String>, device: impl Into<PathBuf>) -> Self {
        Self {
            model: model.into(),
            device: device.into(),
        }
    }

    fn read_milli(&self, channel: &str) -> Result<f64> {
        let path = self.device.join(channel);
        read_milli_units(&path)
    }
}

fn read_milli_units(path: &Path) -> Result<f64> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let milli: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("unexpected value '{}' in {}", raw.trim(), path.display()))?;
    Ok(milli as f64 / 1000.0)
}

impl HumitureSensor for IioSensor {
    fn read(&self) -> Result<SensorSample> {
        // The driver triggers a fresh conversion on the first channel read and
        // serves the second channel from the same transfer.
        let temperature = self.read_milli("in_temp_input")?;
        let humidity = self.read_milli("in_humidityrelative_input")?;
        Ok(SensorSample {
            temperature: Some(temperature),
            humidity: Some(humidity),
        })
    }

    fn describe(&self) -> String {
        format!("{} at {}", self.model, self.device.display())
    }
}

/// Random-walk sensor for running without hardware. Occasionally drops a
/// value or spikes so the validator has something to reject.
pub struct SimulatedSensor {
    state: Mutex<(f64, f64)>,
    glitch_probability: f64,
}

impl SimulatedSensor {
    pub fn new(temperature: f64, humidity: f64, glitch_probability: f64) -> Self {
        Self {
            state: Mutex::new((temperature, humidity)),
            glitch_probability: glitch_probability.clamp(0.0, 1.0),
        }
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new(21.0, 45.0, 0.02)
    }
}

impl HumitureSensor for SimulatedSensor {
    fn read(&self) -> Result<SensorSample> {
        let mut rng = rand::thread_rng();
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("simulated sensor state poisoned"))?;

        state.0 = (state.0 + rng.gen_range(-0.3..=0.3)).clamp(-10.0, 40.0);
        state.1 = (state.1 + rng.gen_range(-0.8..=0.8)).clamp(5.0, 95.0);

        if rng.gen_bool(self.glitch_probability) {
            return if rng.gen_bool(0.5) {
                Ok(SensorSample {
                    temperature: None,
                    humidity: Some(state.1),
                })
            } else {
                Ok(SensorSample {
                    temperature: Some(state.0 + 15.0),
                    humidity: Some(state.1),
                })
            };
        }

        Ok(SensorSample {
            temperature: Some(state.0),
            humidity: Some(state.1),
        })
    }

    fn describe(&self) -> String {
        "simulated sensor".to_string()
    }
}

/// A sensor plus its retry policy. Reads are bounded: after `attempts`
/// failures the result is a sample with both values missing.
#[derive(Clone)]
pub struct SensorReader {
    sensor: Arc<dyn HumitureSensor>,
    attempts: u32,
    retry_delay: Duration,
}

impl SensorReader {
    pub fn new(sensor: Arc<dyn HumitureSensor>, attempts: u32, retry_delay: Duration) -> Self {
        Self {
            sensor,
            attempts: attempts.max(1),
            retry_delay,
        }
    }

    /// A missing IIO device is not fatal: every read then fails and the
    /// reader reports missing values until the device shows up.
    pub fn from_config(config: &SensorConfig) -> Self {
        let sensor: Arc<dyn HumitureSensor> = match config.kind {
            SensorKind::Iio => {
                if !config.device.exists() {
                    warn!(
                        "IIO device {} not found; is the dht11 overlay loaded?",
                        config.device.display()
                    );
                }
                Arc::new(IioSensor::new(config.model.clone(), config.device.clone()))
            }
            SensorKind::Simulated => Arc::new(SimulatedSensor::default()),
        };

        Self::new(
            sensor,
            config.read_attempts,
            Duration::from_millis(config.retry_delay_ms),
        )
    }

    pub fn describe(&self) -> String {
        self.sensor.describe()
    }

    /// Blocking read with retries.
    pub fn read_blocking(&self) -> SensorSample {
        for attempt in 1..=self.attempts {
            match self.sensor.read() {
                Ok(sample) if sample.is_complete() => return sample,
                Ok(_) => debug!("incomplete sample on attempt {attempt}/{}", self.attempts),
                Err(err) => debug!("sensor read attempt {attempt}/{} failed: {err:#}", self.attempts),
            }

            if attempt < self.attempts {
                thread::sleep(self.retry_delay);
            }
        }

        warn!(
            "{} returned no value after {} attempts",
            self.sensor.describe(),
            self.attempts
        );
        SensorSample::missing()
    }

    pub async fn read(&self) -> SensorSample {
        let reader = self.clone();
        match tokio::task::spawn_blocking(move || reader.read_blocking()).await {
            Ok(sample) => sample,
            Err(err) => {
                warn!("sensor read worker join failed: {err}");
                SensorSample::missing()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    use anyhow::{anyhow, Result};

    use super::{HumitureSensor, SensorSample};

    /// Plays back a fixed script of results, then keeps failing.
    pub struct ScriptedSensor {
        script: Mutex<VecDeque<Result<SensorSample>>>,
        reads: AtomicUsize,
    }

    impl ScriptedSensor {
        pub fn new(script: Vec<Result<SensorSample>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                reads: AtomicUsize::new(0),
            }
        }

        pub fn read_count(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl HumitureSensor for ScriptedSensor {
        fn read(&self) -> Result<SensorSample> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("script exhausted")))
        }

        fn describe(&self) -> String {
            "scripted sensor".to_string()
        }
    }

    pub fn ok(temperature: f64, humidity: f64) -> Result<SensorSample> {
        Ok(SensorSample {
            temperature: Some(temperature),
            humidity: Some(humidity),
        })
    }
}
