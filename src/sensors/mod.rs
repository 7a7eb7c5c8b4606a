//! Sensors area - enumeration, default lookup and live streams
//!
//! A [`SensorPlatform`] answers three questions: which sensors exist, which
//! one is the default for a kind, and what a sensor is reading right now (as
//! a stream). [`SensorSubscription`] turns such a stream into a scoped,
//! latest-value-only display slot.

pub mod host;
#[cfg(target_os = "linux")]
pub mod iio;
#[cfg(test)]
pub mod mock;
pub mod subscription;

#[cfg(feature = "sensors")]
pub mod components;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use host::HostSensors;
pub use subscription::SensorSubscription;

/// Well-known sensor kinds with their platform type strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Accelerometer,
    MagneticField,
    Gyroscope,
    Light,
    Pressure,
    Proximity,
    Gravity,
    LinearAcceleration,
    RotationVector,
    RelativeHumidity,
    AmbientTemperature,
    Temperature,
}

impl SensorKind {
    pub const ALL: [SensorKind; 12] = [
        SensorKind::Accelerometer,
        SensorKind::MagneticField,
        SensorKind::Gyroscope,
        SensorKind::Light,
        SensorKind::Pressure,
        SensorKind::Proximity,
        SensorKind::Gravity,
        SensorKind::LinearAcceleration,
        SensorKind::RotationVector,
        SensorKind::RelativeHumidity,
        SensorKind::AmbientTemperature,
        SensorKind::Temperature,
    ];

    /// Type string reported in [`SensorDescriptor::sensor_type`]
    pub fn string_type(self) -> &'static str {
        match self {
            SensorKind::Accelerometer => "android.sensor.accelerometer",
            SensorKind::MagneticField => "android.sensor.magnetic_field",
            SensorKind::Gyroscope => "android.sensor.gyroscope",
            SensorKind::Light => "android.sensor.light",
            SensorKind::Pressure => "android.sensor.pressure",
            SensorKind::Proximity => "android.sensor.proximity",
            SensorKind::Gravity => "android.sensor.gravity",
            SensorKind::LinearAcceleration => "android.sensor.linear_acceleration",
            SensorKind::RotationVector => "android.sensor.rotation_vector",
            SensorKind::RelativeHumidity => "android.sensor.relative_humidity",
            SensorKind::AmbientTemperature => "android.sensor.ambient_temperature",
            SensorKind::Temperature => "android.sensor.temperature",
        }
    }

    pub fn from_string_type(sensor_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.string_type() == sensor_type)
    }

    /// Short title used when naming enumerated sensors
    pub fn title(self) -> &'static str {
        match self {
            SensorKind::Accelerometer => "Accelerometer",
            SensorKind::MagneticField => "Magnetometer",
            SensorKind::Gyroscope => "Gyroscope",
            SensorKind::Light => "Light",
            SensorKind::Pressure => "Pressure",
            SensorKind::Proximity => "Proximity",
            SensorKind::Gravity => "Gravity",
            SensorKind::LinearAcceleration => "Linear Acceleration",
            SensorKind::RotationVector => "Rotation Vector",
            SensorKind::RelativeHumidity => "Humidity",
            SensorKind::AmbientTemperature => "Ambient Temperature",
            SensorKind::Temperature => "Temperature",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SensorKind::Accelerometer => "accelerometer",
            SensorKind::MagneticField => "magnetometer",
            SensorKind::Gyroscope => "gyroscope",
            SensorKind::Light => "light sensor",
            SensorKind::Pressure => "barometer",
            SensorKind::Proximity => "proximity sensor",
            SensorKind::Gravity => "gravity sensor",
            SensorKind::LinearAcceleration => "linear acceleration sensor",
            SensorKind::RotationVector => "rotation vector sensor",
            SensorKind::RelativeHumidity => "humidity sensor",
            SensorKind::AmbientTemperature => "ambient thermometer",
            SensorKind::Temperature => "temperature sensor",
        };
        f.write_str(label)
    }
}

/// Metadata describing one hardware sensor. Name and type are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorDescriptor {
    pub name: String,
    pub sensor_type: String,
    pub vendor: String,
    /// Platform-specific address used to open the sensor's stream
    pub handle: String,
}

impl SensorDescriptor {
    pub fn kind(&self) -> Option<SensorKind> {
        SensorKind::from_string_type(&self.sensor_type)
    }
}

/// Delivery rate hint for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SamplingRate {
    Fastest,
    Game,
    Ui,
    Normal,
}

impl SamplingRate {
    /// Requested period between readings
    pub fn period(self) -> Duration {
        match self {
            SamplingRate::Fastest => Duration::ZERO,
            SamplingRate::Game => Duration::from_micros(20_000),
            SamplingRate::Ui => Duration::from_micros(66_667),
            SamplingRate::Normal => Duration::from_micros(200_000),
        }
    }

    /// Period used by sensors that have to be polled
    pub fn poll_period(self) -> Duration {
        self.period().max(MIN_POLL_PERIOD)
    }
}

const MIN_POLL_PERIOD: Duration = Duration::from_millis(5);

/// One event's worth of measurement values.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub values: Vec<f32>,
    pub timestamp: DateTime<Utc>,
}

impl SensorReading {
    pub fn now(values: Vec<f32>) -> Self {
        Self {
            values,
            timestamp: Utc::now(),
        }
    }

    /// Display form: two decimals per value, comma separated
    pub fn display(&self) -> String {
        self.values
            .iter()
            .map(|v| format!("{:.2}", v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Default sensor of `kind` within an enumeration: the first one listed
pub fn default_of(sensors: &[SensorDescriptor], kind: SensorKind) -> Option<SensorDescriptor> {
    sensors.iter().find(|s| s.kind() == Some(kind)).cloned()
}

/// Source of sensors and their readings.
pub trait SensorPlatform: Send + Sync + fmt::Debug {
    /// Every sensor the platform reports right now
    fn list_sensors(&self) -> Vec<SensorDescriptor>;

    /// The platform default sensor of `kind`, if the device has one
    fn default_sensor(&self, kind: SensorKind) -> Option<SensorDescriptor> {
        default_of(&self.list_sensors(), kind)
    }

    /// Open an event stream for `sensor`; dropping the stream stops delivery.
    fn subscribe(
        &self,
        sensor: &SensorDescriptor,
        rate: SamplingRate,
    ) -> Result<BoxStream<'static, SensorReading>>;
}
