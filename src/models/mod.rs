mod daily_record;
mod settings;

pub use daily_record::{cutoff_key, today_key, DailyStepRecord};
pub use settings::{
    UserSettings, DEFAULT_DAILY_GOAL, DEFAULT_STEP_LENGTH_M, DEFAULT_WEIGHT_KG,
};
