mod checkpoint;
pub(crate) mod commands;
mod controller;
mod ledger;
mod state;

pub use controller::{StepsChangedEvent, TrackerController, TrackerEvent};
pub use ledger::StepLedger;
pub use state::{TrackerSnapshot, TrackingStatus};
