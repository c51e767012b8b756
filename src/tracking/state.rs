use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ledger::StepLedger;
use crate::sensor::SignalMode;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TrackingStatus {
    Idle,
    /// Transient; serializes overlapping start calls. No sensor readings
    /// are folded while in this state.
    Starting,
    Active,
    /// Transient; same role as `Starting` for stop calls.
    Stopping,
}

impl Default for TrackingStatus {
    fn default() -> Self {
        TrackingStatus::Idle
    }
}

#[derive(Debug)]
pub struct TrackerState {
    pub status: TrackingStatus,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ledger: StepLedger,
}

impl TrackerState {
    pub fn new(mode: SignalMode) -> Self {
        Self {
            status: TrackingStatus::Idle,
            session_id: None,
            started_at: None,
            ledger: StepLedger::new(mode),
        }
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            status: self.status,
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            date_key: self.ledger.date_key().to_string(),
            session_steps: self.ledger.session_steps(),
            total_today: self.ledger.total_today(),
        }
    }
}

/// Immutable view handed to the host; safe to read without blocking the
/// writers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    pub status: TrackingStatus,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub date_key: String,
    pub session_steps: u64,
    pub total_today: u64,
}
