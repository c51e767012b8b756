use serde::Serialize;

/// Derived fitness numbers for one day, assembled for the host on demand.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub total_steps: u64,
    pub daily_goal: u32,
    pub progress_pct: f64,
    pub calories: f64,
    pub distance_km: f64,
}
