pub mod controller;
pub mod live_cache;
pub mod loop_worker;
pub mod sensor;

pub use controller::SamplerController;
pub use live_cache::{CurrentReading, LiveCache};
pub use loop_worker::{ingest_once, IngestOutcome};
pub use sensor::{HumitureSensor, IioSensor, SensorReader, SensorSample, SimulatedSensor};
