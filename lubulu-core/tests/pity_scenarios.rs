use chrono::{TimeZone, Utc};
use lubulu_core::{
    DailyState, FixedClock, HistoryRecord, HistoryStore, MemoryHistory, MemoryProfile,
    ScriptedRandom, Settings, SettingsPatch, SpinMode, SpinResult, SpinService,
    recompute_from_history,
};

fn clock() -> FixedClock {
    FixedClock::new("2025-03-01", Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap())
}

fn settings(lu_probability: u8, pity_days: u16, mode: SpinMode) -> Settings {
    Settings {
        lu_probability,
        pity_days,
        mode,
        ..Settings::default()
    }
}

#[test]
fn third_failure_is_unforced_and_fourth_day_is_forced() {
    let mut profile = MemoryProfile::with_settings(settings(1, 3, SpinMode::Single));
    let mut history = MemoryHistory::new();
    // Draws 50, 60, 70 all land outside the single Lu slice; the last draw
    // feeds the forced spin.
    let rng = ScriptedRandom::new([50, 60, 70, 0]);
    let mut service = SpinService::new(&mut profile, &mut history, rng, clock()).unwrap();

    for (day, date) in ["2025-03-01", "2025-03-02", "2025-03-03"].iter().enumerate() {
        let verdict = service.spin(date).unwrap();
        let receipt = verdict.receipt().unwrap();
        assert_eq!(receipt.result, SpinResult::Failure, "day {}", day + 1);
        assert!(!receipt.pity_triggered, "day {}", day + 1);
    }
    assert!(service.pity().should_trigger());

    let fourth = service.spin("2025-03-04").unwrap();
    let receipt = fourth.receipt().unwrap();
    assert_eq!(receipt.result, SpinResult::Success);
    assert!(receipt.pity_triggered);
    assert_eq!(receipt.slice_index, 0);
    assert_eq!(receipt.consecutive_failures, 0);
    drop(service);

    assert!(!history.get("2025-03-03").unwrap().unwrap().pity_triggered);
    assert!(history.get("2025-03-04").unwrap().unwrap().pity_triggered);
    assert_eq!(profile.pity.unwrap().consecutive_failures(), 0);
}

#[test]
fn multi_mode_ledger_keeps_first_outcome() {
    let mut profile = MemoryProfile::with_settings(settings(50, 0, SpinMode::Multi));
    let mut history = MemoryHistory::new();
    let rng = ScriptedRandom::new([90, 10, 20]);
    let mut service = SpinService::new(&mut profile, &mut history, rng, clock()).unwrap();

    let first = service.spin("2025-03-01").unwrap();
    assert_eq!(first.receipt().unwrap().result, SpinResult::Failure);
    for _ in 0..2 {
        let extra = service.spin("2025-03-01").unwrap();
        assert_eq!(extra.receipt().unwrap().result, SpinResult::Success);
    }
    let today = service.daily().unwrap();
    assert_eq!(today.spin_count(), 3);
    assert!(today.can_spin(SpinMode::Multi));
    assert_eq!(today.final_result(), Some(SpinResult::Success));
    drop(service);

    let stored = history.get("2025-03-01").unwrap().unwrap();
    assert_eq!(stored.result, SpinResult::Failure);
}

#[test]
fn switching_to_single_mode_closes_the_day() {
    let mut profile = MemoryProfile::with_settings(settings(50, 0, SpinMode::Multi));
    let mut history = MemoryHistory::new();
    let rng = ScriptedRandom::new([10, 10]);
    let mut service = SpinService::new(&mut profile, &mut history, rng, clock()).unwrap();
    service.spin("2025-03-01").unwrap();

    let patch = SettingsPatch {
        mode: Some(SpinMode::Single),
        ..SettingsPatch::default()
    };
    service.update_settings(&patch).unwrap();
    let verdict = service.spin("2025-03-01").unwrap();
    assert!(verdict.is_already_spun());
    drop(service);

    assert_eq!(profile.settings.unwrap().mode, SpinMode::Single);
}

#[test]
fn recompute_skips_today_even_when_it_failed() {
    let ts = Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap();
    let history: MemoryHistory = [
        ("2025-03-07", SpinResult::Failure),
        ("2025-03-08", SpinResult::Failure),
        ("2025-03-09", SpinResult::Success),
        ("2025-03-10", SpinResult::Failure),
    ]
    .into_iter()
    .map(|(date, result)| (date.to_string(), HistoryRecord::new(result, false, ts)))
    .collect();
    assert_eq!(recompute_from_history(&history, "2025-03-10").unwrap(), 0);
}

#[test]
fn repeated_set_is_idempotent() {
    let ts = Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap();
    let record = HistoryRecord::new(SpinResult::Failure, false, ts);
    let mut once = MemoryHistory::new();
    once.set("2025-03-01", record.clone()).unwrap();
    let mut twice = once.clone();
    twice.set("2025-03-01", record).unwrap();
    assert_eq!(once, twice);
    assert_eq!(twice.list_descending().unwrap().len(), 1);
}

#[test]
fn edits_rebuild_the_counter_used_by_the_next_spin() {
    let mut profile = MemoryProfile::with_settings(settings(1, 2, SpinMode::Single));
    let mut history = MemoryHistory::new();
    let rng = ScriptedRandom::new([0, 50]);
    let mut service = SpinService::new(&mut profile, &mut history, rng, clock()).unwrap();

    service
        .edit_history("2025-03-01", Some(SpinResult::Failure), "2025-03-03")
        .unwrap();
    service
        .edit_history("2025-03-02", Some(SpinResult::Failure), "2025-03-03")
        .unwrap();
    assert_eq!(service.pity().consecutive_failures(), 2);

    let forced = service.spin("2025-03-03").unwrap();
    assert!(forced.receipt().unwrap().pity_triggered);

    // Overriding today's forced win keeps today in the counter.
    let streak = service
        .edit_history("2025-03-03", Some(SpinResult::Failure), "2025-03-03")
        .unwrap();
    assert_eq!(streak, 3);
    assert_eq!(
        service.daily(),
        Some(&DailyState::from_record(
            "2025-03-03",
            history_record(SpinResult::Failure).as_ref()
        ))
    );
}

fn history_record(result: SpinResult) -> Option<HistoryRecord> {
    Some(HistoryRecord::new(
        result,
        false,
        Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap(),
    ))
}
