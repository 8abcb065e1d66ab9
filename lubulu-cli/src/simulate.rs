//! Monte Carlo sweep of the pity mechanic over seeded runs.
use chrono::{Days, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use lubulu_core::{
    FixedClock, MemoryHistory, MemoryProfile, SeededRandom, Settings, SettingsPatch, SpinError,
    SpinService,
};

#[derive(Debug, Clone, Copy)]
pub struct SimulationParams {
    pub lu_probability: i64,
    pub pity_days: i64,
    pub days: u32,
    pub seed: u64,
    pub runs: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub lu_probability: u8,
    pub pity_days: u16,
    pub days: u32,
    pub runs: u32,
    pub seed: u64,
    pub spins: u64,
    pub lu_count: u64,
    pub forced_count: u64,
    /// Lu days over all simulated days.
    pub observed_lu_rate: f64,
    /// Forced Lu days over all Lu days.
    pub forced_share: f64,
    pub longest_failure_streak: u32,
}

/// Run `runs` independent users for `days` consecutive days each.
///
/// # Errors
///
/// Returns an error if the parameters fail settings validation.
pub fn run_simulation(params: &SimulationParams) -> Result<SimulationSummary, SpinError> {
    let mut settings = Settings::default();
    settings.apply(&SettingsPatch {
        lu_probability: Some(params.lu_probability),
        pity_days: Some(params.pity_days),
        ..SettingsPatch::default()
    })?;

    let mut summary = SimulationSummary {
        lu_probability: settings.lu_probability,
        pity_days: settings.pity_days,
        days: params.days,
        runs: params.runs,
        seed: params.seed,
        ..SimulationSummary::default()
    };
    let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default();
    let noon = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).single().unwrap_or_default();

    for run in 0..params.runs {
        let mut service = SpinService::new(
            MemoryProfile::with_settings(settings.clone()),
            MemoryHistory::new(),
            SeededRandom::for_stream(params.seed, &run.to_le_bytes()),
            FixedClock::new(start.to_string(), noon),
        )?;
        let mut streak = 0u32;
        for offset in 0..params.days {
            let Some(day) = start.checked_add_days(Days::new(u64::from(offset))) else {
                break;
            };
            let verdict = service.spin(&day.format("%Y-%m-%d").to_string())?;
            let Some(receipt) = verdict.receipt() else {
                continue;
            };
            summary.spins += 1;
            if receipt.result.is_success() {
                summary.lu_count += 1;
                if receipt.pity_triggered {
                    summary.forced_count += 1;
                }
                streak = 0;
            } else {
                streak += 1;
                summary.longest_failure_streak = summary.longest_failure_streak.max(streak);
            }
        }
        log::debug!("simulation run {run} finished with streak {streak}");
    }

    summary.observed_lu_rate = ratio(summary.lu_count, summary.spins);
    summary.forced_share = ratio(summary.forced_count, summary.lu_count);
    Ok(summary)
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
