use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::Database;
use crate::error::TrackerError;
use crate::models::today_key;
use crate::sensor::{PermissionState, StepSensor};

use super::checkpoint::{checkpoint_loop, collect_writes};
use super::state::{TrackerSnapshot, TrackerState, TrackingStatus};

const DEFAULT_CHECKPOINT_INTERVAL: Duration = Duration::from_secs(30);
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepsChangedEvent {
    pub total_today: u64,
    pub date_key: String,
}

/// Notifications fanned out to the host layer.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    StepsChanged(StepsChangedEvent),
    StateChanged(TrackerSnapshot),
}

struct SessionTasks {
    cancel: CancellationToken,
    drain: JoinHandle<()>,
    checkpoint: JoinHandle<()>,
}

/// Owns the tracking lifecycle. At most one session is ever Active, start
/// and stop are idempotent, and all ledger mutations are serialized behind
/// the state mutex.
#[derive(Clone)]
pub struct TrackerController {
    state: Arc<Mutex<TrackerState>>,
    db: Database,
    sensor: Arc<dyn StepSensor>,
    events: broadcast::Sender<TrackerEvent>,
    /// Serializes whole start/stop operations; the state lock alone only
    /// covers individual mutations.
    lifecycle: Arc<Mutex<()>>,
    tasks: Arc<Mutex<Option<SessionTasks>>>,
    checkpoint_interval: Duration,
}

impl TrackerController {
    pub fn new(db: Database, sensor: Arc<dyn StepSensor>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(TrackerState::new(sensor.mode()))),
            db,
            sensor,
            events,
            lifecycle: Arc::new(Mutex::new(())),
            tasks: Arc::new(Mutex::new(None)),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
        }
    }

    /// Shorter checkpoint cadence, for tests.
    pub fn with_checkpoint_interval(mut self, interval: Duration) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    pub async fn get_snapshot(&self) -> TrackerSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn total_today(&self) -> u64 {
        self.state.lock().await.ledger.total_today()
    }

    /// Load today's persisted total into the ledger so reads are correct
    /// before the first session starts. No-op while a session is live.
    pub async fn hydrate_today(&self) -> Result<(), TrackerError> {
        let _gate = self.lifecycle.lock().await;

        {
            let state = self.state.lock().await;
            if state.status != TrackingStatus::Idle {
                return Ok(());
            }
        }

        let today = today_key();
        let persisted = self
            .db
            .get_steps(&today)
            .await
            .map_err(TrackerError::Persistence)?;

        let mut state = self.state.lock().await;
        if state.status == TrackingStatus::Idle {
            state.ledger.begin_session(today, persisted);
        }
        Ok(())
    }

    pub async fn start_tracking(&self) -> Result<TrackerSnapshot, TrackerError> {
        let _gate = self.lifecycle.lock().await;

        {
            let mut state = self.state.lock().await;
            match state.status {
                TrackingStatus::Active => {
                    debug!("start requested while already active; nothing to do");
                    return Ok(state.snapshot());
                }
                TrackingStatus::Idle => {
                    state.status = TrackingStatus::Starting;
                    state.session_id = Some(Uuid::new_v4().to_string());
                    state.started_at = Some(Utc::now());
                }
                TrackingStatus::Starting | TrackingStatus::Stopping => {
                    // transitions run wholly under the lifecycle gate, so a
                    // caller can only observe Idle or Active here
                    return Err(TrackerError::Internal(anyhow::anyhow!(
                        "lifecycle transition observed mid-flight"
                    )));
                }
            }
        }

        let mut permission = self.sensor.check_permission().await;
        if permission != PermissionState::Granted {
            permission = self.sensor.request_permission().await;
        }
        if permission != PermissionState::Granted {
            warn!("step sensor permission not granted; aborting start");
            self.revert_to_idle().await;
            return Err(TrackerError::PermissionDenied);
        }

        let today = today_key();
        let persisted = match self.db.get_steps(&today).await {
            Ok(steps) => steps,
            Err(err) => {
                self.revert_to_idle().await;
                return Err(TrackerError::Persistence(err));
            }
        };

        {
            let mut state = self.state.lock().await;
            state.ledger.begin_session(today.clone(), persisted);
        }

        // Subscribe before registering so the first raw reading cannot slip
        // past the drain task.
        let readings = self.sensor.subscribe();

        if let Err(err) = self.sensor.start().await {
            self.revert_to_idle().await;
            return Err(err.into());
        }

        info!(
            "tracking session started: {persisted} steps already persisted for {today}, \
             sensor at raw {}",
            self.sensor.current_value().await
        );

        let cancel = CancellationToken::new();
        let drain = tokio::spawn(drain_readings(
            readings,
            Arc::clone(&self.state),
            self.events.clone(),
            cancel.clone(),
        ));
        let checkpoint = tokio::spawn(checkpoint_loop(
            Arc::clone(&self.state),
            self.db.clone(),
            self.events.clone(),
            cancel.clone(),
            self.checkpoint_interval,
        ));

        {
            let mut tasks = self.tasks.lock().await;
            if let Some(stale) = tasks.take() {
                // stop() always clears this slot; a leftover means a bug
                // upstream, so at least don't leak the tasks
                error!("stale session tasks found on start; aborting them");
                stale.cancel.cancel();
                stale.drain.abort();
                stale.checkpoint.abort();
            }
            *tasks = Some(SessionTasks {
                cancel,
                drain,
                checkpoint,
            });
        }

        let snapshot = {
            let mut state = self.state.lock().await;
            state.status = TrackingStatus::Active;
            state.snapshot()
        };

        let _ = self
            .events
            .send(TrackerEvent::StateChanged(snapshot.clone()));
        let _ = self.events.send(TrackerEvent::StepsChanged(StepsChangedEvent {
            total_today: snapshot.total_today,
            date_key: snapshot.date_key.clone(),
        }));

        Ok(snapshot)
    }

    pub async fn stop_tracking(&self) -> Result<TrackerSnapshot, TrackerError> {
        let _gate = self.lifecycle.lock().await;

        {
            let mut state = self.state.lock().await;
            if state.status == TrackingStatus::Idle {
                debug!("stop requested while idle; nothing to do");
                return Ok(state.snapshot());
            }
            state.status = TrackingStatus::Stopping;
        }

        // Disarm the periodic tasks first: after these joins no further
        // tick or reading can touch the ledger.
        if let Some(tasks) = self.tasks.lock().await.take() {
            tasks.cancel.cancel();
            if let Err(err) = tasks.drain.await {
                error!("reading drain task failed to join: {err}");
            }
            if let Err(err) = tasks.checkpoint.await {
                error!("checkpoint task failed to join: {err}");
            }
        }

        // Best-effort teardown; the session converges to Idle regardless.
        if let Err(err) = self.sensor.stop().await {
            error!("sensor stop failed: {err}");
        }

        let writes = {
            let mut state = self.state.lock().await;
            collect_writes(&mut state.ledger)
        };
        for (date_key, steps) in writes {
            if let Err(err) = self.db.upsert_steps(&date_key, steps).await {
                error!("final checkpoint for {date_key} failed: {err:#}");
            }
        }

        let snapshot = {
            let mut state = self.state.lock().await;
            state.status = TrackingStatus::Idle;
            state.session_id = None;
            state.started_at = None;
            state.snapshot()
        };
        info!(
            "tracking session stopped at {} steps for {}",
            snapshot.total_today, snapshot.date_key
        );

        let _ = self
            .events
            .send(TrackerEvent::StateChanged(snapshot.clone()));

        Ok(snapshot)
    }

    async fn revert_to_idle(&self) {
        let mut state = self.state.lock().await;
        state.status = TrackingStatus::Idle;
        state.session_id = None;
        state.started_at = None;
    }
}

/// Drains raw sensor readings into the ledger. Readings that arrive while
/// the session is not Active (they can race a start or stop on the
/// sensor's own notification channel) are discarded.
async fn drain_readings(
    mut readings: broadcast::Receiver<u64>,
    state: Arc<Mutex<TrackerState>>,
    events: broadcast::Sender<TrackerEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            received = readings.recv() => {
                let raw = match received {
                    Ok(raw) => raw,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("sensor reading stream lagged; {missed} readings dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                let accepted = {
                    let mut guard = state.lock().await;
                    if guard.status != TrackingStatus::Active {
                        debug!("discarding sensor reading {raw} while {:?}", guard.status);
                        None
                    } else {
                        guard.ledger.observe(raw);
                        Some(StepsChangedEvent {
                            total_today: guard.ledger.total_today(),
                            date_key: guard.ledger.date_key().to_string(),
                        })
                    }
                };

                if let Some(event) = accepted {
                    let _ = events.send(TrackerEvent::StepsChanged(event));
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
}
