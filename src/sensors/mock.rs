//! Scripted sensor platform for tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

use super::{SamplingRate, SensorDescriptor, SensorKind, SensorPlatform, SensorReading};
use crate::error::{LabError, Result};

/// Platform whose sensors are declared up front and whose readings are pushed
/// by the test through [`MockSensors::feed`].
#[derive(Debug, Default)]
pub struct MockSensors {
    sensors: Vec<SensorDescriptor>,
    feeds: Mutex<HashMap<String, mpsc::UnboundedReceiver<SensorReading>>>,
    list_calls: AtomicUsize,
}

impl MockSensors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sensor(self, name: &str, kind: SensorKind) -> Self {
        self.with_raw_sensor(name, kind.string_type())
    }

    /// Declare a sensor with an arbitrary type string
    pub fn with_raw_sensor(mut self, name: &str, sensor_type: &str) -> Self {
        self.sensors.push(SensorDescriptor {
            name: name.to_string(),
            sensor_type: sensor_type.to_string(),
            vendor: "mock".to_string(),
            handle: format!("mock/{}", name),
        });
        self
    }

    /// How many times the sensor list was enumerated
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Sender for the next subscription to the named sensor
    pub fn feed(&self, name: &str) -> mpsc::UnboundedSender<SensorReading> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut feeds) = self.feeds.lock() {
            feeds.insert(name.to_string(), rx);
        }
        tx
    }
}

impl SensorPlatform for MockSensors {
    fn list_sensors(&self) -> Vec<SensorDescriptor> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.sensors.clone()
    }

    fn subscribe(
        &self,
        sensor: &SensorDescriptor,
        _rate: SamplingRate,
    ) -> Result<BoxStream<'static, SensorReading>> {
        let rx = self
            .feeds
            .lock()
            .ok()
            .and_then(|mut feeds| feeds.remove(&sensor.name))
            .ok_or_else(|| LabError::SensorUnavailable(sensor.name.clone()))?;

        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|reading| (reading, rx))
        })
        .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_preserves_descriptors_verbatim() {
        let platform = MockSensors::new()
            .with_raw_sensor("BMI160 accelerometer", "android.sensor.accelerometer")
            .with_raw_sensor("Vendor Step Counter", "com.vendor.step")
            .with_sensor("AK09918 magnetometer", SensorKind::MagneticField);

        let sensors = platform.list_sensors();
        assert_eq!(sensors.len(), 3);
        assert_eq!(sensors[0].name, "BMI160 accelerometer");
        assert_eq!(sensors[0].sensor_type, "android.sensor.accelerometer");
        assert_eq!(sensors[1].name, "Vendor Step Counter");
        assert_eq!(sensors[1].sensor_type, "com.vendor.step");
        assert_eq!(sensors[1].kind(), None);
        assert_eq!(sensors[2].sensor_type, "android.sensor.magnetic_field");
    }

    #[test]
    fn test_default_sensor_absent_kind() {
        let platform = MockSensors::new().with_sensor("Light", SensorKind::Light);
        assert!(platform.default_sensor(SensorKind::Accelerometer).is_none());
        assert_eq!(
            platform.default_sensor(SensorKind::Light).map(|s| s.name),
            Some("Light".to_string())
        );
    }

    #[test]
    fn test_default_sensor_is_first_of_kind() {
        let platform = MockSensors::new()
            .with_sensor("Primary", SensorKind::Accelerometer)
            .with_sensor("Secondary", SensorKind::Accelerometer);
        assert_eq!(
            platform.default_sensor(SensorKind::Accelerometer).unwrap().name,
            "Primary"
        );
    }
}
