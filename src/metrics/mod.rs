mod types;

pub use types::DailySummary;

use crate::models::{UserSettings, DEFAULT_DAILY_GOAL};

/// kcal burned per kg of body weight per 1000 steps.
const KCAL_PER_KG_PER_KSTEPS: f64 = 0.57;
/// Flat kcal-per-step estimate when no usable weight is configured.
const FALLBACK_KCAL_PER_STEP: f64 = 0.04;
/// Kilometers per step (80 cm stride) when no usable step length is
/// configured.
const FALLBACK_KM_PER_STEP: f64 = 0.0008;

pub fn estimated_calories(total_steps: u64, settings: &UserSettings) -> f64 {
    let steps = total_steps as f64;
    if settings.weight_kg > 0.0 {
        settings.weight_kg * KCAL_PER_KG_PER_KSTEPS * steps / 1000.0
    } else {
        steps * FALLBACK_KCAL_PER_STEP
    }
}

pub fn estimated_distance_km(total_steps: u64, settings: &UserSettings) -> f64 {
    let steps = total_steps as f64;
    if settings.step_length_m > 0.0 {
        steps * settings.step_length_m / 1000.0
    } else {
        steps * FALLBACK_KM_PER_STEP
    }
}

/// Progress toward the daily goal, clamped to 100. A zero goal falls back
/// to the default so the division stays defined.
pub fn goal_progress_pct(total_steps: u64, settings: &UserSettings) -> f64 {
    let goal = if settings.daily_goal > 0 {
        settings.daily_goal
    } else {
        DEFAULT_DAILY_GOAL
    };
    let pct = total_steps as f64 / f64::from(goal) * 100.0;
    pct.min(100.0)
}

pub fn summarize(total_steps: u64, settings: &UserSettings) -> DailySummary {
    DailySummary {
        total_steps,
        daily_goal: settings.daily_goal,
        progress_pct: goal_progress_pct(total_steps, settings),
        calories: estimated_calories(total_steps, settings),
        distance_km: estimated_distance_km(total_steps, settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(goal: u32, weight_kg: f64, step_length_m: f64) -> UserSettings {
        UserSettings {
            daily_goal: goal,
            weight_kg,
            step_length_m,
            ..UserSettings::default()
        }
    }

    #[test]
    fn short_walk_with_default_settings() {
        let s = settings(10_000, 70.0, 0.8);
        assert!((estimated_calories(5, &s) - 0.1995).abs() < 1e-9);
        assert!((estimated_distance_km(5, &s) - 0.004).abs() < 1e-9);
        assert!((goal_progress_pct(5, &s) - 0.05).abs() < 1e-9);
    }

    #[test]
    fn missing_weight_uses_flat_per_step_estimate() {
        let s = settings(10_000, 0.0, 0.8);
        assert!((estimated_calories(100, &s) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn missing_step_length_uses_default_stride() {
        let s = settings(10_000, 70.0, 0.0);
        assert!((estimated_distance_km(1000, &s) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn progress_is_clamped_at_one_hundred() {
        let s = settings(1_000, 70.0, 0.8);
        assert_eq!(goal_progress_pct(2_500, &s), 100.0);
    }

    #[test]
    fn zero_goal_does_not_divide_by_zero() {
        let s = settings(0, 70.0, 0.8);
        assert!((goal_progress_pct(5_000, &s) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn summary_combines_all_derived_values() {
        let s = settings(10_000, 70.0, 0.8);
        let summary = summarize(4_000, &s);
        assert_eq!(summary.total_steps, 4_000);
        assert_eq!(summary.daily_goal, 10_000);
        assert!((summary.progress_pct - 40.0).abs() < 1e-9);
        assert!((summary.distance_km - 3.2).abs() < 1e-9);
        assert!((summary.calories - 159.6).abs() < 1e-9);
    }
}
