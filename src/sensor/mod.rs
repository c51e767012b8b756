mod simulated;

pub use simulated::SimulatedSensor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// How a concrete sensor reports steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalMode {
    /// Readings are an absolute, device-lifetime step counter.
    Cumulative,
    /// Each reading announces exactly one detected step.
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    NotDetermined,
}

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("no step sensor is available on this device")]
    Unavailable,
    #[error("step sensor permission was denied")]
    PermissionDenied,
}

/// Capability interface over a platform pedometer. Readings fan out on a
/// broadcast channel so a session can subscribe before the sensor is
/// registered and never miss the first raw value.
#[async_trait]
pub trait StepSensor: Send + Sync {
    fn mode(&self) -> SignalMode;

    /// Stream of raw readings. Cumulative mode: the absolute counter.
    /// Event mode: one message per detected step.
    fn subscribe(&self) -> broadcast::Receiver<u64>;

    async fn start(&self) -> Result<(), SensorError>;

    async fn stop(&self) -> Result<(), SensorError>;

    /// Last raw value the sensor has reported.
    async fn current_value(&self) -> u64;

    async fn check_permission(&self) -> PermissionState;

    async fn request_permission(&self) -> PermissionState;
}
