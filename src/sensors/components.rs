//! Hardware temperature components (CPU, GPU, NVMe, ...) via sysinfo

use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use sysinfo::Components;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use super::{SensorDescriptor, SensorKind, SensorReading};

const HANDLE_PREFIX: &str = "component/";

pub fn owns(handle: &str) -> bool {
    handle.starts_with(HANDLE_PREFIX)
}

/// Every component that currently reports a temperature
pub fn enumerate() -> Vec<SensorDescriptor> {
    let components = Components::new_with_refreshed_list();
    components
        .iter()
        .filter(|c| c.temperature().is_some())
        .map(|c| descriptor(c.label()))
        .collect()
}

fn descriptor(label: &str) -> SensorDescriptor {
    SensorDescriptor {
        name: label.to_string(),
        sensor_type: SensorKind::Temperature.string_type().to_string(),
        vendor: "sysinfo".to_string(),
        handle: format!("{}{}", HANDLE_PREFIX, label),
    }
}

fn read_temperature(label: &str) -> Option<f32> {
    let components = Components::new_with_refreshed_list();
    components
        .iter()
        .find(|c| c.label() == label)
        .and_then(|c| c.temperature())
}

/// Poll the component labelled by `handle` every `period`
pub fn stream(handle: &str, period: Duration) -> Option<BoxStream<'static, SensorReading>> {
    let label = handle.strip_prefix(HANDLE_PREFIX)?.to_string();
    read_temperature(&label)?;

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    Some(
        stream::unfold((ticker, label), |(mut ticker, label)| async move {
            ticker.tick().await;
            let lookup = label.clone();
            let temp = tokio::task::spawn_blocking(move || read_temperature(&lookup))
                .await
                .ok()
                .flatten();
            match temp {
                Some(celsius) => Some((SensorReading::now(vec![celsius]), (ticker, label))),
                None => {
                    warn!("Component {} stopped reporting a temperature", label);
                    None
                }
            }
        })
        .boxed(),
    )
}
