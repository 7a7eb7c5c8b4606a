//! Sensors screen: sensor list, default sensor lookup and live value

use rmcp::{model::*, ErrorData as McpError};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::UNSET;
use crate::config::SensorsConfig;
use crate::error::LabError;
use crate::sensors::{
    default_of, SamplingRate, SensorDescriptor, SensorKind, SensorPlatform, SensorSubscription,
};
use crate::shared::{format_duration, label};

// === Parameter Types ===

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct SensorKindParams {
    #[schemars(description = "Sensor kind, e.g. accelerometer, gyroscope, light (default from config)")]
    #[serde(default)]
    pub kind: Option<SensorKind>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct OpenScreenParams {
    #[schemars(description = "Sensor kind to listen to (default from config)")]
    #[serde(default)]
    pub kind: Option<SensorKind>,
    #[schemars(description = "Sampling rate: fastest, game, ui or normal (default from config)")]
    #[serde(default)]
    pub sampling: Option<SamplingRate>,
}

/// Holds the live subscription while shown; leaving the screen by any path
/// (explicit exit, replacement, drop on error) releases it.
#[derive(Debug)]
pub struct SensorsScreen {
    kind: SensorKind,
    sensors: Vec<SensorDescriptor>,
    error: Option<String>,
    subscription: Option<SensorSubscription>,
}

impl SensorsScreen {
    /// Enumerate sensors and start listening to the default sensor of `kind`
    pub fn enter(platform: &dyn SensorPlatform, kind: SensorKind, rate: SamplingRate) -> Self {
        // One enumeration serves both the list and the default lookup
        let sensors = platform.list_sensors();

        let acquired = default_of(&sensors, kind)
            .ok_or(LabError::NotFound(kind))
            .and_then(|sensor| SensorSubscription::acquire(platform, sensor, rate));

        let (subscription, error) = match acquired {
            Ok(subscription) => (Some(subscription), None),
            Err(e) => {
                warn!("Sensors screen without live value: {}", e);
                (None, Some(e.to_string()))
            }
        };

        Self {
            kind,
            sensors,
            error,
            subscription,
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn sensors(&self) -> &[SensorDescriptor] {
        &self.sensors
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn subscription(&self) -> Option<&SensorSubscription> {
        self.subscription.as_ref()
    }

    pub fn latest(&self) -> Option<String> {
        self.subscription().and_then(|s| s.latest())
    }

    pub fn error_label(&self) -> String {
        format!("Error: {}", self.error().unwrap_or(UNSET))
    }

    pub fn result_label(&self) -> String {
        self.latest().unwrap_or_else(|| UNSET.to_string())
    }

    /// Full text rendering of the screen
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.error_label());
        out.push('\n');
        out.push_str(&self.result_label());
        out.push('\n');

        if let Some(sub) = self.subscription() {
            if sub.is_active() {
                out.push_str(&format!(
                    "Listening to {} ({:?}) for {}\n",
                    sub.sensor().name,
                    sub.rate(),
                    format_duration(sub.age())
                ));
            } else {
                out.push_str(&format!("Stream from {} ended\n", sub.sensor().name));
            }
        }

        out.push_str(&format!("\nSensors ({}):\n", self.sensors().len()));
        for sensor in self.sensors() {
            out.push_str(&format!("  {}\n    {}\n", sensor.name, sensor.sensor_type));
        }
        out
    }

    pub fn exit(self) {
        if let Some(subscription) = self.subscription {
            subscription.release();
        }
    }
}

fn render_list(sensors: &[SensorDescriptor]) -> String {
    let mut out = format!("Sensors ({}):\n", sensors.len());
    for sensor in sensors {
        out.push_str(&format!(
            "  {}\n    type: {}\n    vendor: {}\n",
            sensor.name, sensor.sensor_type, sensor.vendor
        ));
    }
    out
}

// === Tool Functions ===

pub async fn list_sensors(
    platform: &dyn SensorPlatform,
) -> std::result::Result<CallToolResult, McpError> {
    label(render_list(&platform.list_sensors()))
}

pub async fn get_default_sensor(
    platform: &dyn SensorPlatform,
    config: &SensorsConfig,
    params: SensorKindParams,
) -> std::result::Result<CallToolResult, McpError> {
    let kind = params.kind.unwrap_or(config.default_kind);
    match platform.default_sensor(kind) {
        Some(sensor) => label(format!(
            "{}\n  type: {}\n  vendor: {}",
            sensor.name, sensor.sensor_type, sensor.vendor
        )),
        None => label(format!("Error: {}", LabError::NotFound(kind))),
    }
}

pub async fn open_sensors_screen(
    platform: &dyn SensorPlatform,
    slot: &Mutex<Option<SensorsScreen>>,
    config: &SensorsConfig,
    params: OpenScreenParams,
) -> std::result::Result<CallToolResult, McpError> {
    let kind = params.kind.unwrap_or(config.default_kind);
    let rate = params.sampling.unwrap_or(config.sampling);

    let mut slot = slot.lock().await;
    if let Some(previous) = slot.take() {
        previous.exit();
    }

    info!("Opening sensors screen for {} at {:?}", kind, rate);
    let screen = slot.insert(SensorsScreen::enter(platform, kind, rate));
    label(screen.render())
}

pub async fn read_sensors_screen(
    slot: &Mutex<Option<SensorsScreen>>,
) -> std::result::Result<CallToolResult, McpError> {
    match slot.lock().await.as_ref() {
        Some(screen) => label(screen.render()),
        None => label("Sensors screen is not open"),
    }
}

pub async fn close_sensors_screen(
    slot: &Mutex<Option<SensorsScreen>>,
) -> std::result::Result<CallToolResult, McpError> {
    match slot.lock().await.take() {
        Some(screen) => {
            let kind = screen.kind();
            screen.exit();
            label(format!("Closed sensors screen ({})", kind))
        }
        None => label("Sensors screen is not open"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::mock::MockSensors;
    use crate::sensors::SensorReading;
    use std::time::Duration;

    #[tokio::test]
    async fn test_missing_accelerometer_shows_error() {
        let platform = MockSensors::new()
            .with_sensor("Ambient Light", SensorKind::Light)
            .with_sensor("Barometer", SensorKind::Pressure);

        let screen = SensorsScreen::enter(&platform, SensorKind::Accelerometer, SamplingRate::Normal);
        assert_eq!(screen.error(), Some("No accelerometer"));
        assert_eq!(screen.error_label(), "Error: No accelerometer");
        assert_eq!(screen.result_label(), "null");
        assert_eq!(screen.sensors().len(), 2);
        assert!(screen.subscription().is_none());
    }

    #[tokio::test]
    async fn test_list_matches_platform() {
        let platform = MockSensors::new()
            .with_raw_sensor("LSM6DSO Accelerometer", "android.sensor.accelerometer")
            .with_raw_sensor("LSM6DSO Gyroscope", "android.sensor.gyroscope")
            .with_raw_sensor("Pickup Gesture", "com.google.sensor.pickup_gesture");
        let _feed = platform.feed("LSM6DSO Accelerometer");

        let screen = SensorsScreen::enter(&platform, SensorKind::Accelerometer, SamplingRate::Ui);
        assert_eq!(screen.sensors(), platform.list_sensors().as_slice());
        assert_eq!(screen.sensors()[2].sensor_type, "com.google.sensor.pickup_gesture");

        let text = screen.render();
        assert!(text.starts_with("Error: null\nnull\n"));
        assert!(text.contains("Sensors (3):"));
        assert!(text.contains("  Pickup Gesture\n    com.google.sensor.pickup_gesture\n"));
    }

    #[tokio::test]
    async fn test_live_value_tracks_latest_reading() {
        let platform = MockSensors::new().with_sensor("Accel", SensorKind::Accelerometer);
        let feed = platform.feed("Accel");

        let screen = SensorsScreen::enter(&platform, SensorKind::Accelerometer, SamplingRate::Game);
        let mut display = screen.subscription().unwrap().display();

        for (value, expected) in [(1.0, "1.00"), (2.0, "2.00"), (3.0, "3.00")] {
            feed.send(SensorReading::now(vec![value])).unwrap();
            tokio::time::timeout(Duration::from_secs(5), display.changed())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(screen.result_label(), expected);
        }
    }

    #[tokio::test]
    async fn test_exit_releases_sensor() {
        let platform = MockSensors::new().with_sensor("Accel", SensorKind::Accelerometer);
        let feed = platform.feed("Accel");

        let screen = SensorsScreen::enter(&platform, SensorKind::Accelerometer, SamplingRate::Normal);
        assert!(screen.subscription().is_some());
        screen.exit();

        tokio::time::timeout(Duration::from_secs(5), feed.closed())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reopening_releases_previous_subscription() {
        let platform = MockSensors::new()
            .with_sensor("Accel", SensorKind::Accelerometer)
            .with_sensor("Gyro", SensorKind::Gyroscope);
        let accel = platform.feed("Accel");
        let _gyro = platform.feed("Gyro");
        let slot = Mutex::new(None);
        let config = SensorsConfig::default();

        open_sensors_screen(&platform, &slot, &config, OpenScreenParams::default())
            .await
            .unwrap();
        assert_eq!(slot.lock().await.as_ref().unwrap().kind(), SensorKind::Accelerometer);

        let params = OpenScreenParams {
            kind: Some(SensorKind::Gyroscope),
            sampling: Some(SamplingRate::Game),
        };
        open_sensors_screen(&platform, &slot, &config, params).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), accel.closed())
            .await
            .unwrap();

        close_sensors_screen(&slot).await.unwrap();
        assert!(slot.lock().await.is_none());
    }

    #[test]
    fn test_render_list_includes_vendor() {
        let platform = MockSensors::new().with_sensor("Accel", SensorKind::Accelerometer);
        let text = render_list(&platform.list_sensors());
        assert!(text.starts_with("Sensors (1):\n  Accel\n    type: android.sensor.accelerometer\n"));
        assert!(text.contains("vendor: "));
    }

    #[tokio::test]
    async fn test_enter_enumerates_once() {
        let platform = MockSensors::new()
            .with_sensor("Accel", SensorKind::Accelerometer)
            .with_sensor("Gyro", SensorKind::Gyroscope);
        let _feed = platform.feed("Accel");

        let screen = SensorsScreen::enter(&platform, SensorKind::Accelerometer, SamplingRate::Normal);
        assert!(screen.subscription().is_some());
        assert_eq!(platform.list_calls(), 1);

        let missing = SensorsScreen::enter(&platform, SensorKind::Light, SamplingRate::Normal);
        assert_eq!(missing.error(), Some("No light sensor"));
        assert_eq!(platform.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_unopenable_default_sensor_reports_error() {
        // Listed, but no feed was scripted for it
        let platform = MockSensors::new().with_sensor("Accel", SensorKind::Accelerometer);

        let screen = SensorsScreen::enter(&platform, SensorKind::Accelerometer, SamplingRate::Normal);
        assert_eq!(screen.error_label(), "Error: Sensor unavailable: Accel");
        assert!(screen.subscription().is_none());
    }
}
