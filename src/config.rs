use anyhow::{Context, Result};
use chrono_tz::Tz;
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

pub const CONFIG_PATH_ENV: &str = "PITEMP_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "./pitemp.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Iio,
    Simulated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub kind: SensorKind,
    /// Descriptive model name, e.g. `AM2302`.
    pub model: String,
    /// IIO device directory created by the dht11 driver.
    pub device: PathBuf,
    pub read_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            kind: SensorKind::Iio,
            model: "AM2302".into(),
            device: PathBuf::from("/sys/bus/iio/devices/iio:device0"),
            read_attempts: 15,
            retry_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub sensor_id: String,
    pub bind_addr: String,
    /// IANA zone used for history requests that don't name one.
    pub default_timezone: String,
    pub sample_interval_secs: u64,
    pub cache_ttl_ms: u64,
    pub sensor: SensorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./pi-temp.db"),
            sensor_id: "1".into(),
            bind_addr: "0.0.0.0:8080".into(),
            default_timezone: "Etc/UTC".into(),
            sample_interval_secs: 60,
            cache_ttl_ms: 5000,
            sensor: SensorConfig::default(),
        }
    }
}

impl Config {
    /// Loads the file named by `PITEMP_CONFIG` (or `./pitemp.json`), then
    /// applies environment overrides.
    pub fn from_env() -> Result<Self> {
        let path = env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut config = Self::load(&path)?;
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// A missing file yields defaults. An unparseable file is logged and
    /// also yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        Ok(serde_json::from_str(&contents).unwrap_or_else(|err| {
            warn!("Ignoring invalid config {}: {err}", path.display());
            Self::default()
        }))
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("PITEMP_DB_PATH") {
            self.db_path = PathBuf::from(value);
        }
        if let Some(value) = lookup("PITEMP_BIND_ADDR") {
            self.bind_addr = value;
        }
        if let Some(value) = lookup("PITEMP_TIMEZONE") {
            self.default_timezone = value;
        }
        if let Some(value) = lookup("PITEMP_SENSOR_ID") {
            self.sensor_id = value;
        }
    }

    pub fn default_tz(&self) -> Tz {
        self.default_timezone.parse().unwrap_or_else(|_| {
            warn!(
                "Unknown default timezone '{}', using UTC",
                self.default_timezone
            );
            Tz::UTC
        })
    }
}
