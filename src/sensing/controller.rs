use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::db::Database;

use super::{loop_worker::sampling_loop, SensorReader};

/// Owns the background sampling task.
pub struct SamplerController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SamplerController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn start(
        &mut self,
        db: Database,
        reader: SensorReader,
        sensor_id: String,
        interval: Duration,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("sampler already active");
        }

        info!(
            "Starting sampler for sensor {} ({}) every {}s",
            sensor_id,
            reader.describe(),
            interval.as_secs()
        );

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(sampling_loop(
            db,
            reader,
            sensor_id,
            interval,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("sampling loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for SamplerController {
    fn default() -> Self {
        Self::new()
    }
}
