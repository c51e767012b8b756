#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::broadcast;

use stepmate_lib::db::Database;
use stepmate_lib::sensor::{PermissionState, SensorError, SignalMode, StepSensor};
use stepmate_lib::tracking::TrackerEvent;

/// Deterministic sensor double: tests feed raw readings by hand and script
/// the permission/availability behavior.
pub struct ScriptedSensor {
    mode: SignalMode,
    readings: broadcast::Sender<u64>,
    last_value: AtomicU64,
    start_calls: AtomicUsize,
    permission: PermissionState,
    available: bool,
}

impl ScriptedSensor {
    pub fn new(mode: SignalMode) -> Arc<Self> {
        Self::build(mode, PermissionState::Granted, true)
    }

    pub fn denying_permission(mode: SignalMode) -> Arc<Self> {
        Self::build(mode, PermissionState::Denied, true)
    }

    pub fn unavailable(mode: SignalMode) -> Arc<Self> {
        Self::build(mode, PermissionState::Granted, false)
    }

    fn build(mode: SignalMode, permission: PermissionState, available: bool) -> Arc<Self> {
        let (readings, _) = broadcast::channel(64);
        Arc::new(Self {
            mode,
            readings,
            last_value: AtomicU64::new(0),
            start_calls: AtomicUsize::new(0),
            permission,
            available,
        })
    }

    /// Push one raw reading, as the platform callback would.
    pub fn emit(&self, raw: u64) {
        self.last_value.store(raw, Ordering::SeqCst);
        let _ = self.readings.send(raw);
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StepSensor for ScriptedSensor {
    fn mode(&self) -> SignalMode {
        self.mode
    }

    fn subscribe(&self) -> broadcast::Receiver<u64> {
        self.readings.subscribe()
    }

    async fn start(&self) -> Result<(), SensorError> {
        if !self.available {
            return Err(SensorError::Unavailable);
        }
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), SensorError> {
        Ok(())
    }

    async fn current_value(&self) -> u64 {
        self.last_value.load(Ordering::SeqCst)
    }

    async fn check_permission(&self) -> PermissionState {
        self.permission
    }

    async fn request_permission(&self) -> PermissionState {
        self.permission
    }
}

pub fn temp_database() -> (TempDir, Database) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let db = Database::new(dir.path().join("stepmate-test.sqlite3"))
        .expect("failed to open test database");
    (dir, db)
}

/// Block until a steps-changed notification carrying at least `expected`
/// steps arrives.
pub async fn wait_for_total(events: &mut broadcast::Receiver<TrackerEvent>, expected: u64) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match events.recv().await {
                Ok(TrackerEvent::StepsChanged(payload)) if payload.total_today >= expected => {
                    break;
                }
                Ok(_) => continue,
                Err(err) => panic!("event stream ended early: {err}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for step total {expected}"));
}
