//! Scoped sensor subscription
//!
//! The subscription owns the task that drains the platform stream. Dropping
//! the handle aborts that task, which drops the stream and releases the
//! sensor, whatever path led to the drop.

use std::time::Instant;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{SamplingRate, SensorDescriptor, SensorPlatform};
use crate::error::Result;

#[derive(Debug)]
pub struct SensorSubscription {
    sensor: SensorDescriptor,
    rate: SamplingRate,
    display: watch::Receiver<Option<String>>,
    started: Instant,
    task: JoinHandle<()>,
}

impl SensorSubscription {
    /// Open the sensor's stream and start mirroring its latest reading.
    ///
    /// Must be called from within a tokio runtime.
    pub fn acquire(
        platform: &dyn SensorPlatform,
        sensor: SensorDescriptor,
        rate: SamplingRate,
    ) -> Result<Self> {
        let mut readings = platform.subscribe(&sensor, rate)?;
        let (tx, display) = watch::channel(None);

        let name = sensor.name.clone();
        let task = tokio::spawn(async move {
            while let Some(reading) = readings.next().await {
                // Latest value only; earlier readings are overwritten
                tx.send_replace(Some(reading.display()));
            }
            debug!("Sensor stream for {} ended", name);
        });

        info!("Subscribed to {} at {:?}", sensor.name, rate);
        Ok(Self {
            sensor,
            rate,
            display,
            started: Instant::now(),
            task,
        })
    }

    pub fn sensor(&self) -> &SensorDescriptor {
        &self.sensor
    }

    pub fn rate(&self) -> SamplingRate {
        self.rate
    }

    /// Formatted most recent reading, if any arrived yet
    pub fn latest(&self) -> Option<String> {
        self.display.borrow().clone()
    }

    /// Receiver of the display slot, for callers that want to await updates
    #[cfg(test)]
    pub fn display(&self) -> watch::Receiver<Option<String>> {
        self.display.clone()
    }

    pub fn age(&self) -> std::time::Duration {
        self.started.elapsed()
    }

    /// Whether the platform stream is still delivering
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn release(self) {}
}

impl Drop for SensorSubscription {
    fn drop(&mut self) {
        self.task.abort();
        info!("Released subscription to {}", self.sensor.name);
    }
}
