use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DAILY_GOAL: u32 = 10_000;
pub const DEFAULT_WEIGHT_KG: f64 = 70.0;
pub const DEFAULT_STEP_LENGTH_M: f64 = 0.8;

/// Singleton settings record. Saved wholesale; there is no partial-field
/// update path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub daily_goal: u32,
    pub weight_kg: f64,
    pub step_length_m: f64,
    pub notifications_enabled: bool,
    pub auto_start_tracking: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for UserSettings {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            daily_goal: DEFAULT_DAILY_GOAL,
            weight_kg: DEFAULT_WEIGHT_KG,
            step_length_m: DEFAULT_STEP_LENGTH_M,
            notifications_enabled: true,
            auto_start_tracking: false,
            created_at: now,
            updated_at: now,
        }
    }
}
