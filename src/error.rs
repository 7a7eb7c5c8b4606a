//! Error taxonomy shared by every device lab area

use thiserror::Error;

use crate::sensors::SensorKind;

#[derive(Error, Debug)]
pub enum LabError {
    /// The platform has no default sensor of the requested kind.
    #[error("No {0}")]
    NotFound(SensorKind),

    /// A listed sensor could not be opened for streaming.
    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("Notification failure: {0}")]
    NotificationFailure(String),
}

pub type Result<T> = std::result::Result<T, LabError>;
