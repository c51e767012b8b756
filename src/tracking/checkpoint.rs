use std::sync::Arc;
use std::time::Duration;

use log::{debug, error};
use tokio::sync::{broadcast, Mutex};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::db::Database;
use crate::models::today_key;

use super::controller::{StepsChangedEvent, TrackerEvent};
use super::ledger::StepLedger;
use super::state::{TrackerState, TrackingStatus};

/// Durable writes owed right now: normally just today's bucket, but when
/// local midnight has passed since the last write this also finalizes the
/// old day and rolls the ledger into the new one.
pub(crate) fn collect_writes(ledger: &mut StepLedger) -> Vec<(String, u64)> {
    let today = today_key();
    let mut writes = Vec::with_capacity(2);

    if ledger.date_key() != today {
        writes.push((ledger.date_key().to_string(), ledger.total_today()));
        ledger.roll_to(today);
    }

    writes.push((ledger.date_key().to_string(), ledger.total_today()));
    writes
}

/// Periodic checkpoint task, armed for the lifetime of one Active session.
/// Persistence failures are logged and retried on the next tick; every
/// write carries the full current total, so a failed tick delays
/// durability without losing steps.
pub(crate) async fn checkpoint_loop(
    state: Arc<Mutex<TrackerState>>,
    db: Database,
    events: broadcast::Sender<TrackerEvent>,
    cancel: CancellationToken,
    period: Duration,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let (writes, rolled) = {
                    let mut guard = state.lock().await;
                    if guard.status != TrackingStatus::Active {
                        break;
                    }
                    let bucket_before = guard.ledger.date_key().to_string();
                    let writes = collect_writes(&mut guard.ledger);
                    let rolled = if guard.ledger.date_key() != bucket_before {
                        Some(StepsChangedEvent {
                            total_today: guard.ledger.total_today(),
                            date_key: guard.ledger.date_key().to_string(),
                        })
                    } else {
                        None
                    };
                    (writes, rolled)
                };

                if let Some(event) = rolled {
                    let _ = events.send(TrackerEvent::StepsChanged(event));
                }

                for (date_key, steps) in writes {
                    match db.upsert_steps(&date_key, steps).await {
                        Ok(()) => debug!("checkpointed {steps} steps for {date_key}"),
                        Err(err) => error!(
                            "checkpoint for {date_key} failed, will retry next tick: {err:#}"
                        ),
                    }
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
}
