pub mod db;
pub mod error;
pub mod metrics;
pub mod models;
pub mod sensor;
pub mod tracking;

use std::sync::Arc;

use db::Database;
use log::{error, warn};
use sensor::{SignalMode, SimulatedSensor, StepSensor};
use tauri::{Emitter, Manager};
use tracking::{
    commands::{
        get_recent_history, get_settings, get_today_summary, get_tracking_state, save_settings,
        start_tracking, stop_tracking,
    },
    TrackerController, TrackerEvent,
};

pub(crate) struct AppState {
    pub(crate) db: Database,
    pub(crate) tracker: TrackerController,
}

fn sensor_mode_from_env() -> SignalMode {
    match std::env::var("STEPMATE_SENSOR").as_deref() {
        Ok("event") => SignalMode::Event,
        Ok("cumulative") => SignalMode::Cumulative,
        Ok(other) => {
            warn!("unknown STEPMATE_SENSOR value '{other}', defaulting to cumulative");
            SignalMode::Cumulative
        }
        Err(_) => SignalMode::Cumulative,
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Stepmate starting up...");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let result = (|| -> anyhow::Result<()> {
                let app_data_dir = app
                    .path()
                    .app_data_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&app_data_dir)?;

                let db_path = app_data_dir.join("stepmate.sqlite3");
                let database = Database::new(db_path)?;

                let sensor: Arc<dyn StepSensor> =
                    Arc::new(SimulatedSensor::new(sensor_mode_from_env()));
                let tracker = TrackerController::new(database.clone(), sensor);

                // Forward tracker notifications to the webview.
                let mut events = tracker.subscribe_events();
                let app_handle = app.handle().clone();
                tauri::async_runtime::spawn(async move {
                    loop {
                        match events.recv().await {
                            Ok(TrackerEvent::StepsChanged(payload)) => {
                                let _ = app_handle.emit("steps-changed", payload);
                            }
                            Ok(TrackerEvent::StateChanged(snapshot)) => {
                                let _ = app_handle.emit("tracking-state-changed", snapshot);
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        }
                    }
                });

                // Surface today's persisted total before any session starts.
                tauri::async_runtime::block_on(tracker.hydrate_today())?;

                let settings = tauri::async_runtime::block_on(database.get_settings())?;
                if settings.auto_start_tracking {
                    let tracker_for_autostart = tracker.clone();
                    tauri::async_runtime::spawn(async move {
                        if let Err(err) = tracker_for_autostart.start_tracking().await {
                            error!("auto-start tracking failed: {err}");
                        }
                    });
                }

                app.manage(AppState {
                    db: database,
                    tracker,
                });

                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .invoke_handler(tauri::generate_handler![
            start_tracking,
            stop_tracking,
            get_tracking_state,
            get_today_summary,
            get_recent_history,
            get_settings,
            save_settings,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
