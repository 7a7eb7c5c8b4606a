//! Linux Industrial I/O sensors (accelerometers, gyroscopes, light, ...)
//!
//! Devices live under `/sys/bus/iio/devices/iio:deviceN`. Each exposes
//! channels as `in_<type>[_<axis>]_raw` (plus optional `_scale` / `_offset`)
//! or as already processed `in_<type>[_<axis>]_input` files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::{SensorDescriptor, SensorKind, SensorReading};

pub const IIO_ROOT: &str = "/sys/bus/iio/devices";

const HANDLE_PREFIX: &str = "iio/";

/// One channel type and how its processed value maps to reported units.
#[derive(Debug)]
struct ChannelGroup {
    prefix: &'static str,
    kind: SensorKind,
    axes: &'static [&'static str],
    /// Multiplier from IIO units to reported units
    factor: f32,
}

const XYZ: &[&str] = &["x", "y", "z"];
const SCALAR: &[&str] = &[""];

static GROUPS: [ChannelGroup; 8] = [
    // m/s^2
    ChannelGroup { prefix: "accel", kind: SensorKind::Accelerometer, axes: XYZ, factor: 1.0 },
    // rad/s
    ChannelGroup { prefix: "anglvel", kind: SensorKind::Gyroscope, axes: XYZ, factor: 1.0 },
    // Gauss -> uT
    ChannelGroup { prefix: "magn", kind: SensorKind::MagneticField, axes: XYZ, factor: 100.0 },
    ChannelGroup { prefix: "illuminance", kind: SensorKind::Light, axes: SCALAR, factor: 1.0 },
    // kPa -> hPa
    ChannelGroup { prefix: "pressure", kind: SensorKind::Pressure, axes: SCALAR, factor: 10.0 },
    // milli degrees C -> degrees C
    ChannelGroup { prefix: "temp", kind: SensorKind::AmbientTemperature, axes: SCALAR, factor: 0.001 },
    // milli percent -> percent
    ChannelGroup { prefix: "humidityrelative", kind: SensorKind::RelativeHumidity, axes: SCALAR, factor: 0.001 },
    ChannelGroup { prefix: "proximity", kind: SensorKind::Proximity, axes: SCALAR, factor: 1.0 },
];

/// View of an IIO device tree rooted at a sysfs directory.
#[derive(Debug, Clone)]
pub struct IioBus {
    root: PathBuf,
}

impl IioBus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn system() -> Self {
        Self::new(IIO_ROOT)
    }

    pub fn owns(handle: &str) -> bool {
        handle.starts_with(HANDLE_PREFIX)
    }

    /// One descriptor per (device, channel group) present on the bus
    pub fn enumerate(&self) -> Vec<SensorDescriptor> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("No IIO bus at {:?}: {}", self.root, e);
                return Vec::new();
            }
        };

        let mut devices: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("iio:device"))
            })
            .collect();
        devices.sort();

        let mut sensors = Vec::new();
        for dir in devices {
            let Some(dir_name) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let device_name = fs::read_to_string(dir.join("name"))
                .map(|n| n.trim().to_string())
                .unwrap_or_else(|_| dir_name.to_string());

            for group in &GROUPS {
                if !group_present(&dir, group) {
                    continue;
                }
                sensors.push(SensorDescriptor {
                    name: format!("{} {}", device_name, group.kind.title()),
                    sensor_type: group.kind.string_type().to_string(),
                    vendor: "Linux IIO".to_string(),
                    handle: format!("{}{}/{}", HANDLE_PREFIX, dir_name, group.prefix),
                });
            }
        }
        sensors
    }

    /// Resolve a descriptor handle back to a readable channel
    pub fn channel(&self, handle: &str) -> Option<IioChannel> {
        let rest = handle.strip_prefix(HANDLE_PREFIX)?;
        let (dir_name, prefix) = rest.rsplit_once('/')?;
        let group = GROUPS.iter().find(|g| g.prefix == prefix)?;
        let dir = self.root.join(dir_name);
        group_present(&dir, group).then_some(IioChannel { dir, group })
    }
}

/// A readable channel group of one IIO device.
#[derive(Debug)]
pub struct IioChannel {
    dir: PathBuf,
    group: &'static ChannelGroup,
}

impl IioChannel {
    /// Read every axis once, in reported units
    pub async fn read(&self) -> io::Result<Vec<f32>> {
        let mut values = Vec::with_capacity(self.group.axes.len());
        for axis in self.group.axes {
            let base = channel_base(self.group.prefix, axis);
            let value = match read_value(&self.dir.join(format!("{}_input", base))).await {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    let raw = read_value(&self.dir.join(format!("{}_raw", base))).await?;
                    let scale = self.attribute(&base, "scale", 1.0).await;
                    let offset = self.attribute(&base, "offset", 0.0).await;
                    (raw + offset) * scale
                }
                Err(e) => return Err(e),
            };
            values.push(value * self.group.factor);
        }
        Ok(values)
    }

    /// Poll the channel every `period` until it stops being readable
    pub fn stream(self, period: Duration) -> BoxStream<'static, SensorReading> {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        stream::unfold((ticker, self), |(mut ticker, channel)| async move {
            ticker.tick().await;
            match channel.read().await {
                Ok(values) => Some((SensorReading::now(values), (ticker, channel))),
                Err(e) => {
                    warn!("IIO channel {:?} stopped: {}", channel.dir, e);
                    None
                }
            }
        })
        .boxed()
    }

    /// Per-axis attribute, falling back to the shared one, then `default`
    async fn attribute(&self, base: &str, name: &str, default: f32) -> f32 {
        let own = self.dir.join(format!("{}_{}", base, name));
        if let Ok(v) = read_value(&own).await {
            return v;
        }
        let shared = self.dir.join(format!("in_{}_{}", self.group.prefix, name));
        read_value(&shared).await.unwrap_or(default)
    }
}

fn channel_base(prefix: &str, axis: &str) -> String {
    if axis.is_empty() {
        format!("in_{}", prefix)
    } else {
        format!("in_{}_{}", prefix, axis)
    }
}

fn group_present(dir: &Path, group: &ChannelGroup) -> bool {
    let base = channel_base(group.prefix, group.axes[0]);
    dir.join(format!("{}_raw", base)).exists() || dir.join(format!("{}_input", base)).exists()
}

async fn read_value(path: &Path) -> io::Result<f32> {
    let text = tokio::fs::read_to_string(path).await?;
    text.trim()
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{:?}: {}", path, e)))
}
