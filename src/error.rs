use crate::sensor::SensorError;

/// Failures a tracking operation can surface to the host. Permission and
/// hardware problems abort a start attempt; persistence problems during a
/// running session never reach this type (the checkpointer retries them).
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("step sensor permission was not granted")]
    PermissionDenied,

    #[error("no step sensor is available on this device")]
    SensorUnavailable,

    #[error("persistence failure: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<SensorError> for TrackerError {
    fn from(err: SensorError) -> Self {
        match err {
            SensorError::Unavailable => TrackerError::SensorUnavailable,
            SensorError::PermissionDenied => TrackerError::PermissionDenied,
        }
    }
}
