use log::{info, warn};

use crate::sensor::SignalMode;

/// In-memory authoritative counters for "today". Folds raw sensor
/// observations into a total comparable with the persisted day bucket.
#[derive(Debug, Clone)]
pub struct StepLedger {
    mode: SignalMode,
    date_key: String,
    persisted_before_session: u64,
    baseline: Option<u64>,
    /// Session steps frozen across a mid-session counter restart.
    session_offset: u64,
    session_steps: u64,
    raw_current: Option<u64>,
}

impl StepLedger {
    pub fn new(mode: SignalMode) -> Self {
        Self {
            mode,
            date_key: crate::models::today_key(),
            persisted_before_session: 0,
            baseline: None,
            session_offset: 0,
            session_steps: 0,
            raw_current: None,
        }
    }

    /// Called once per `Starting -> Active` transition, with the steps
    /// already stored for the day before this session began.
    pub fn begin_session(&mut self, date_key: String, persisted_before: u64) {
        self.date_key = date_key;
        self.persisted_before_session = persisted_before;
        self.baseline = None;
        self.session_offset = 0;
        self.session_steps = 0;
        self.raw_current = None;
    }

    /// Fold one raw observation. Cumulative readings are measured against
    /// the session baseline; the first reading after (re)registration only
    /// establishes that baseline and never counts as steps. A reading below
    /// the baseline means the hardware counter restarted: progress so far
    /// is frozen and the new value adopted as a fresh baseline.
    pub fn observe(&mut self, raw: u64) {
        match self.mode {
            SignalMode::Cumulative => match self.baseline {
                None => {
                    self.baseline = Some(raw);
                }
                Some(baseline) if raw >= baseline => {
                    self.session_steps = self.session_offset + (raw - baseline);
                }
                Some(baseline) => {
                    warn!(
                        "raw step counter fell from {baseline} to {raw}; \
                         re-baselining with {} session steps frozen",
                        self.session_steps
                    );
                    self.session_offset = self.session_steps;
                    self.baseline = Some(raw);
                }
            },
            SignalMode::Event => {
                self.session_steps += 1;
            }
        }
        self.raw_current = Some(raw);
    }

    /// The single authoritative value exposed to consumers.
    pub fn total_today(&self) -> u64 {
        self.persisted_before_session + self.session_steps
    }

    pub fn date_key(&self) -> &str {
        &self.date_key
    }

    pub fn session_steps(&self) -> u64 {
        self.session_steps
    }

    /// Local midnight passed: start a fresh day bucket. The new day carries
    /// no persisted steps, and in cumulative mode the last observed raw
    /// value becomes the new baseline so later readings count from here.
    pub fn roll_to(&mut self, date_key: String) {
        info!("day rollover: {} -> {date_key}", self.date_key);
        self.date_key = date_key;
        self.persisted_before_session = 0;
        self.session_offset = 0;
        self.session_steps = 0;
        self.baseline = match self.mode {
            SignalMode::Cumulative => self.raw_current,
            SignalMode::Event => None,
        };
    }
}
