use lubulu_core::constants::{MAX_LU_PROBABILITY, MIN_LU_PROBABILITY, TOTAL_SLICES};
use lubulu_core::{
    FixedClock, MemoryHistory, MemoryProfile, ProbabilityConfig, SeededRandom, Settings,
    SpinService, force_result, resolve,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};

const SAMPLE_SIZE: u32 = 10_000;
const TOLERANCE: f64 = 0.02;
const FORCED_TRIALS: u32 = 200;

#[test]
fn observed_lu_rate_tracks_configured_probability() {
    for p in MIN_LU_PROBABILITY..=MAX_LU_PROBABILITY {
        let config = ProbabilityConfig::new(p);
        let mut rng = SeededRandom::for_stream(0x00C0_FFEE, &[p]);
        let mut hits = 0u32;
        for _ in 0..SAMPLE_SIZE {
            let outcome = resolve(&mut rng, &config);
            assert!(outcome.slice_index < TOTAL_SLICES);
            assert_eq!(outcome.is_success, outcome.slice_index < u32::from(p));
            if outcome.is_success {
                hits += 1;
            }
        }
        let observed = f64::from(hits) / f64::from(SAMPLE_SIZE);
        let expected = f64::from(p) / 100.0;
        assert!(
            (observed - expected).abs() <= TOLERANCE,
            "p={p}: observed {observed:.4}"
        );
    }
}

#[test]
fn forced_results_stay_in_their_region() {
    for p in MIN_LU_PROBABILITY..=MAX_LU_PROBABILITY {
        let config = ProbabilityConfig::new(p);
        let bound = u32::from(p);
        let mut rng = SeededRandom::for_stream(42, &[p, 0xF0]);
        for _ in 0..FORCED_TRIALS {
            let win = force_result(&mut rng, &config, true);
            assert!(win.is_success && win.is_forced);
            assert!(win.slice_index < bound, "p={p}: forced win at {}", win.slice_index);

            let miss = force_result(&mut rng, &config, false);
            assert!(!miss.is_success && miss.is_forced);
            assert!((bound..TOTAL_SLICES).contains(&miss.slice_index));
        }
    }
}

#[test]
fn pity_caps_every_failure_streak() {
    let pity_days = 7u16;
    let settings = Settings {
        lu_probability: 1,
        pity_days,
        ..Settings::default()
    };
    let start = NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date");
    let now = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
    let mut service = SpinService::new(
        MemoryProfile::with_settings(settings),
        MemoryHistory::new(),
        SeededRandom::new(2024),
        FixedClock::new("2025-01-01", now),
    )
    .expect("service opens");

    let mut streak = 0u32;
    let mut longest = 0u32;
    let mut forced = 0u32;
    for offset in 0..730 {
        let day = (start + Duration::days(offset)).format("%Y-%m-%d").to_string();
        let verdict = service.spin(&day).expect("spin succeeds");
        let receipt = verdict.receipt().expect("new day admits a spin");
        if receipt.pity_triggered {
            forced += 1;
            assert_eq!(streak, u32::from(pity_days));
        }
        if receipt.result.is_success() {
            streak = 0;
        } else {
            streak += 1;
            longest = longest.max(streak);
        }
    }
    assert!(longest <= u32::from(pity_days));
    assert!(forced >= 60, "forced wins: {forced}");
}
