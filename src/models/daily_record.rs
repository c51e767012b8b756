use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// One persisted row per calendar day. Owned by the record store; the
/// tracker only ever caches the value for "today".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStepRecord {
    pub date_key: String,
    pub steps: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Bucket key for "today" in the device's local timezone.
pub fn today_key() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Bucket key for the local date `days` days before today. Used to bound
/// history queries.
pub fn cutoff_key(days: u32) -> String {
    let cutoff = Local::now().date_naive() - chrono::Duration::days(i64::from(days));
    cutoff.format("%Y-%m-%d").to_string()
}
