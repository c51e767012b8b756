use chrono::Utc;
use serde::Serialize;
use tauri::State;

use crate::error::TrackerError;
use crate::metrics::{self, DailySummary};
use crate::models::{DailyStepRecord, UserSettings};
use crate::AppState;

use super::{TrackerController, TrackerSnapshot};

const DEFAULT_HISTORY_DAYS: u32 = 14;

/// User-facing result of a start/stop request. Failures are folded into
/// the message instead of surfacing as command errors.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingOutcome {
    pub success: bool,
    pub message: String,
}

impl TrackingOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn from_error(err: TrackerError) -> Self {
        let message = match &err {
            TrackerError::PermissionDenied => {
                "Step sensor permission was not granted. Please allow access in your system settings."
                    .to_string()
            }
            TrackerError::SensorUnavailable => {
                "This device does not provide a step sensor.".to_string()
            }
            TrackerError::Persistence(source) => {
                format!("Could not load saved steps: {source}")
            }
            TrackerError::Internal(source) => format!("Internal error: {source}"),
        };
        Self {
            success: false,
            message,
        }
    }
}

fn controller_from_state(state: &State<'_, AppState>) -> TrackerController {
    state.tracker.clone()
}

#[tauri::command]
pub async fn start_tracking(state: State<'_, AppState>) -> Result<TrackingOutcome, String> {
    let controller = controller_from_state(&state);
    Ok(match controller.start_tracking().await {
        Ok(_) => TrackingOutcome::ok("Tracking started"),
        Err(err) => TrackingOutcome::from_error(err),
    })
}

#[tauri::command]
pub async fn stop_tracking(state: State<'_, AppState>) -> Result<TrackingOutcome, String> {
    let controller = controller_from_state(&state);
    Ok(match controller.stop_tracking().await {
        Ok(_) => TrackingOutcome::ok("Tracking stopped"),
        Err(err) => TrackingOutcome::from_error(err),
    })
}

#[tauri::command]
pub async fn get_tracking_state(state: State<'_, AppState>) -> Result<TrackerSnapshot, String> {
    let controller = controller_from_state(&state);
    Ok(controller.get_snapshot().await)
}

#[tauri::command]
pub async fn get_today_summary(state: State<'_, AppState>) -> Result<DailySummary, String> {
    let controller = controller_from_state(&state);
    let total = controller.total_today().await;
    let settings = state.db.get_settings().await.map_err(|e| e.to_string())?;
    Ok(metrics::summarize(total, &settings))
}

#[tauri::command]
pub async fn get_recent_history(
    state: State<'_, AppState>,
    days: Option<u32>,
) -> Result<Vec<DailyStepRecord>, String> {
    state
        .db
        .get_recent(days.unwrap_or(DEFAULT_HISTORY_DAYS))
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_settings(state: State<'_, AppState>) -> Result<UserSettings, String> {
    state.db.get_settings().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn save_settings(
    state: State<'_, AppState>,
    mut settings: UserSettings,
) -> Result<UserSettings, String> {
    settings.updated_at = Utc::now();
    state
        .db
        .save_settings(&settings)
        .await
        .map_err(|e| e.to_string())?;
    Ok(settings)
}
