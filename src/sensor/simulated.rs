use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use log::{debug, info};
use rand::Rng;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{PermissionState, SensorError, SignalMode, StepSensor};

const FIRST_BURST_DELAY_SECS: u64 = 2;
const BURST_INTERVAL_SECS: u64 = 3;
const MIN_BURST_STEPS: u64 = 4;
const MAX_BURST_STEPS: u64 = 10;

/// Development stand-in for a hardware pedometer: emits a walking-pace
/// burst of steps every few seconds. Supports both signal modes so the
/// whole reconciliation path can be exercised without device hardware.
pub struct SimulatedSensor {
    mode: SignalMode,
    readings: broadcast::Sender<u64>,
    counter: Arc<AtomicU64>,
    worker: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl SimulatedSensor {
    pub fn new(mode: SignalMode) -> Self {
        let (readings, _) = broadcast::channel(256);
        Self {
            mode,
            readings,
            counter: Arc::new(AtomicU64::new(0)),
            worker: Mutex::new(None),
        }
    }
}

#[async_trait]
impl StepSensor for SimulatedSensor {
    fn mode(&self) -> SignalMode {
        self.mode
    }

    fn subscribe(&self) -> broadcast::Receiver<u64> {
        self.readings.subscribe()
    }

    async fn start(&self) -> Result<(), SensorError> {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let readings = self.readings.clone();
        let counter = Arc::clone(&self.counter);
        let mode = self.mode;

        let handle = tokio::spawn(async move {
            let start = Instant::now() + Duration::from_secs(FIRST_BURST_DELAY_SECS);
            let mut ticker = interval_at(start, Duration::from_secs(BURST_INTERVAL_SECS));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let burst =
                            rand::thread_rng().gen_range(MIN_BURST_STEPS..=MAX_BURST_STEPS);
                        match mode {
                            SignalMode::Cumulative => {
                                let total =
                                    counter.fetch_add(burst, Ordering::Relaxed) + burst;
                                let _ = readings.send(total);
                                debug!("simulated sensor: +{burst} steps (raw {total})");
                            }
                            SignalMode::Event => {
                                for _ in 0..burst {
                                    let total = counter.fetch_add(1, Ordering::Relaxed) + 1;
                                    let _ = readings.send(total);
                                }
                                debug!("simulated sensor: {burst} step events");
                            }
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
        });

        *worker = Some((cancel, handle));
        info!("Simulated step sensor started ({mode:?} mode)");
        Ok(())
    }

    async fn stop(&self) -> Result<(), SensorError> {
        if let Some((cancel, handle)) = self.worker.lock().await.take() {
            cancel.cancel();
            let _ = handle.await;
            info!(
                "Simulated step sensor stopped at raw value {}",
                self.counter.load(Ordering::Relaxed)
            );
        }
        Ok(())
    }

    async fn current_value(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    async fn check_permission(&self) -> PermissionState {
        PermissionState::Granted
    }

    async fn request_permission(&self) -> PermissionState {
        PermissionState::Granted
    }
}
