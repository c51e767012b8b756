use std::{
    convert::TryFrom,
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::oneshot;

mod migrations;

use crate::models::{cutoff_key, DailyStepRecord, UserSettings};
use migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

fn to_u64(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("value {value} is negative"))
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

/// Handle to the record store. All statements run on a dedicated worker
/// thread that owns the SQLite connection; callers await the result over a
/// oneshot channel, so connection access never blocks the async runtime.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("stepmate-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(
                            Err(anyhow::Error::new(err).context("failed to open SQLite database")),
                        );
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    /// Persisted total for one day bucket; 0 when no row exists yet.
    pub async fn get_steps(&self, date_key: &str) -> Result<u64> {
        let date_key = date_key.to_string();
        self.execute(move |conn| {
            let steps: Option<i64> = conn
                .query_row(
                    "SELECT steps FROM daily_steps WHERE date_key = ?1",
                    params![date_key],
                    |row| row.get(0),
                )
                .optional()
                .with_context(|| "failed to read daily steps")?;

            match steps {
                Some(value) => to_u64(value),
                None => Ok(0),
            }
        })
        .await
    }

    /// Insert-or-update the total for one day bucket. `created_at` is set on
    /// the first write, `updated_at` refreshed on every write.
    pub async fn upsert_steps(&self, date_key: &str, steps: u64) -> Result<()> {
        let date_key = date_key.to_string();
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO daily_steps (date_key, steps, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(date_key) DO UPDATE
                 SET steps = excluded.steps,
                     updated_at = excluded.updated_at",
                params![date_key, to_i64(steps)?, now],
            )
            .with_context(|| "failed to upsert daily steps")?;
            Ok(())
        })
        .await
    }

    /// Day rows for the last `days` days, most recent first.
    pub async fn get_recent(&self, days: u32) -> Result<Vec<DailyStepRecord>> {
        let cutoff = cutoff_key(days);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT date_key, steps, created_at, updated_at
                 FROM daily_steps
                 WHERE date_key >= ?1
                 ORDER BY date_key DESC",
            )?;

            let mut rows = stmt.query(params![cutoff])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(DailyStepRecord {
                    date_key: row.get(0)?,
                    steps: to_u64(row.get::<_, i64>(1)?)?,
                    created_at: parse_datetime(&row.get::<_, String>(2)?)?,
                    updated_at: parse_datetime(&row.get::<_, String>(3)?)?,
                });
            }

            Ok(records)
        })
        .await
    }

    /// The settings singleton. Created with defaults on first read.
    pub async fn get_settings(&self) -> Result<UserSettings> {
        self.execute(|conn| {
            let existing = conn
                .query_row(
                    "SELECT daily_goal, weight_kg, step_length_m, notifications_enabled,
                            auto_start_tracking, created_at, updated_at
                     FROM user_settings
                     WHERE id = 1",
                    [],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, f64>(1)?,
                            row.get::<_, f64>(2)?,
                            row.get::<_, bool>(3)?,
                            row.get::<_, bool>(4)?,
                            row.get::<_, String>(5)?,
                            row.get::<_, String>(6)?,
                        ))
                    },
                )
                .optional()
                .with_context(|| "failed to read user settings")?;

            match existing {
                Some((goal, weight, step_length, notifications, auto_start, created, updated)) => {
                    Ok(UserSettings {
                        daily_goal: u32::try_from(goal)
                            .map_err(|_| anyhow!("daily_goal {goal} out of range"))?,
                        weight_kg: weight,
                        step_length_m: step_length,
                        notifications_enabled: notifications,
                        auto_start_tracking: auto_start,
                        created_at: parse_datetime(&created)?,
                        updated_at: parse_datetime(&updated)?,
                    })
                }
                None => {
                    let defaults = UserSettings::default();
                    write_settings(conn, &defaults)?;
                    Ok(defaults)
                }
            }
        })
        .await
    }

    /// Replace the settings singleton wholesale.
    pub async fn save_settings(&self, settings: &UserSettings) -> Result<()> {
        let record = settings.clone();
        self.execute(move |conn| write_settings(conn, &record)).await
    }
}

fn write_settings(conn: &Connection, settings: &UserSettings) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO user_settings
         (id, daily_goal, weight_kg, step_length_m, notifications_enabled,
          auto_start_tracking, created_at, updated_at)
         VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            i64::from(settings.daily_goal),
            settings.weight_kg,
            settings.step_length_m,
            settings.notifications_enabled,
            settings.auto_start_tracking,
            settings.created_at.to_rfc3339(),
            settings.updated_at.to_rfc3339(),
        ],
    )
    .with_context(|| "failed to save user settings")?;
    Ok(())
}
