//! Sensors of the machine the server runs on

use futures::stream::BoxStream;
use tracing::debug;

#[cfg(target_os = "linux")]
use super::iio::IioBus;
use super::{SamplingRate, SensorDescriptor, SensorPlatform, SensorReading};
use crate::error::{LabError, Result};

/// Host platform: Linux IIO devices first, then hardware temperature components.
#[derive(Debug, Clone)]
pub struct HostSensors {
    #[cfg(target_os = "linux")]
    iio: IioBus,
}

impl Default for HostSensors {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSensors {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "linux")]
            iio: IioBus::system(),
        }
    }

    #[cfg(all(test, target_os = "linux"))]
    pub fn with_iio(iio: IioBus) -> Self {
        Self { iio }
    }
}

impl SensorPlatform for HostSensors {
    fn list_sensors(&self) -> Vec<SensorDescriptor> {
        let mut sensors = Vec::new();

        #[cfg(target_os = "linux")]
        sensors.extend(self.iio.enumerate());

        #[cfg(feature = "sensors")]
        sensors.extend(super::components::enumerate());

        debug!("Host reports {} sensors", sensors.len());
        sensors
    }

    fn subscribe(
        &self,
        sensor: &SensorDescriptor,
        rate: SamplingRate,
    ) -> Result<BoxStream<'static, SensorReading>> {
        let period = rate.poll_period();

        #[cfg(target_os = "linux")]
        if IioBus::owns(&sensor.handle) {
            return self
                .iio
                .channel(&sensor.handle)
                .map(|channel| channel.stream(period))
                .ok_or_else(|| unavailable(sensor));
        }

        #[cfg(feature = "sensors")]
        if super::components::owns(&sensor.handle) {
            return super::components::stream(&sensor.handle, period)
                .ok_or_else(|| unavailable(sensor));
        }

        let _ = period;
        Err(unavailable(sensor))
    }
}

fn unavailable(sensor: &SensorDescriptor) -> LabError {
    LabError::SensorUnavailable(sensor.name.clone())
}
