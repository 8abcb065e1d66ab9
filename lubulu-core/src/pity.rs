//! Pity counter: forces a Lu after a configured run of failures.
//!
//! The counter is armed once `consecutive_failures >= threshold > 0`. A
//! threshold of zero disables pity entirely, no matter how long the streak.
//! The live counter is advanced by [`PityCounter::record`]; after manual
//! ledger edits it is rebuilt with [`recompute_from_history`].
use serde::{Deserialize, Serialize};

use crate::history::{HistoryStore, SpinResult};
use crate::resolver::SpinOutcome;
use crate::store::StoreError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PityCounter {
    #[serde(default)]
    threshold: u16,
    #[serde(default, rename = "consecutiveFails")]
    consecutive_failures: u32,
}

impl PityCounter {
    #[must_use]
    pub const fn new(threshold: u16) -> Self {
        Self {
            threshold,
            consecutive_failures: 0,
        }
    }

    /// Rebuild a counter from persisted parts.
    #[must_use]
    pub const fn from_parts(threshold: u16, consecutive_failures: u32) -> Self {
        Self {
            threshold,
            consecutive_failures,
        }
    }

    #[must_use]
    pub const fn threshold(&self) -> u16 {
        self.threshold
    }

    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Advance the streak. Forced successes reset it like any other success.
    pub fn record(&mut self, outcome: &SpinOutcome) {
        self.record_result(SpinResult::from_success(outcome.is_success));
    }

    pub fn record_result(&mut self, result: SpinResult) {
        match result {
            SpinResult::Success => self.consecutive_failures = 0,
            SpinResult::Failure => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            }
        }
    }

    #[must_use]
    pub fn should_trigger(&self) -> bool {
        self.threshold > 0 && self.consecutive_failures >= u32::from(self.threshold)
    }

    /// Change sensitivity without losing streak progress.
    pub fn set_threshold(&mut self, threshold: u16) {
        self.threshold = threshold;
    }

    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Replace the streak with a value recomputed from the ledger.
    pub fn set_consecutive_failures(&mut self, consecutive_failures: u32) {
        self.consecutive_failures = consecutive_failures;
    }
}

/// Count the failure streak that ends before `today`.
///
/// Walks the ledger newest first, skipping every date `>= today`, and counts
/// failures until the first success or the end of the stored history. Keys
/// are compared as opaque strings.
///
/// # Errors
///
/// Returns an error if the ledger cannot be listed.
pub fn recompute_from_history<H: HistoryStore + ?Sized>(
    history: &H,
    today: &str,
) -> Result<u32, StoreError> {
    let mut streak = 0u32;
    for (date, record) in history.list_descending()? {
        if date.as_str() >= today {
            continue;
        }
        if record.result != SpinResult::Failure {
            break;
        }
        streak += 1;
    }
    log::debug!("recomputed pity streak before {today}: {streak}");
    Ok(streak)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{HistoryRecord, MemoryHistory};
    use chrono::{TimeZone, Utc};

    const FAIL: SpinOutcome = SpinOutcome {
        is_success: false,
        slice_index: 50,
        is_forced: false,
    };
    const WIN: SpinOutcome = SpinOutcome {
        is_success: true,
        slice_index: 0,
        is_forced: false,
    };
    const FORCED_WIN: SpinOutcome = SpinOutcome {
        is_success: true,
        slice_index: 0,
        is_forced: true,
    };

    fn ledger(entries: &[(&str, SpinResult)]) -> MemoryHistory {
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        entries
            .iter()
            .map(|(date, result)| ((*date).to_string(), HistoryRecord::new(*result, false, ts)))
            .collect()
    }

    #[test]
    fn seventh_failure_arms_and_success_disarms() {
        let mut counter = PityCounter::new(7);
        for _ in 0..6 {
            counter.record(&FAIL);
            assert!(!counter.should_trigger());
        }
        counter.record(&FAIL);
        assert!(counter.should_trigger());

        counter.record(&WIN);
        assert_eq!(counter.consecutive_failures(), 0);
        assert!(!counter.should_trigger());
    }

    #[test]
    fn zero_threshold_never_triggers() {
        let mut counter = PityCounter::new(0);
        for _ in 0..150 {
            counter.record(&FAIL);
        }
        assert_eq!(counter.consecutive_failures(), 150);
        assert!(!counter.should_trigger());
    }

    #[test]
    fn forced_success_restarts_countdown() {
        let mut counter = PityCounter::new(2);
        counter.record(&FAIL);
        counter.record(&FAIL);
        assert!(counter.should_trigger());
        counter.record(&FORCED_WIN);
        assert!(!counter.should_trigger());
        assert_eq!(counter.consecutive_failures(), 0);
    }

    #[test]
    fn threshold_change_keeps_progress() {
        let mut counter = PityCounter::new(5);
        counter.record(&FAIL);
        counter.record(&FAIL);
        counter.set_threshold(2);
        assert_eq!(counter.consecutive_failures(), 2);
        assert!(counter.should_trigger());

        counter.reset();
        assert_eq!(counter.threshold(), 2);
        assert_eq!(counter.consecutive_failures(), 0);
    }

    #[test]
    fn threshold_one_triggers_after_single_failure() {
        let mut counter = PityCounter::new(1);
        counter.record(&FAIL);
        assert!(counter.should_trigger());
    }

    #[test]
    fn serde_uses_stored_field_names_and_defaults() {
        let counter = PityCounter::from_parts(7, 3);
        let json = serde_json::to_value(&counter).unwrap();
        assert_eq!(json["threshold"], 7);
        assert_eq!(json["consecutiveFails"], 3);

        let empty: PityCounter = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, PityCounter::default());

        let armed: PityCounter =
            serde_json::from_str(r#"{"threshold":7,"consecutiveFails":7}"#).unwrap();
        assert!(armed.should_trigger());
    }

    #[test]
    fn recompute_ignores_today_and_stops_at_success() {
        let history = ledger(&[
            ("2025-01-07", SpinResult::Failure),
            ("2025-01-08", SpinResult::Failure),
            ("2025-01-09", SpinResult::Success),
            ("2025-01-10", SpinResult::Failure),
        ]);
        assert_eq!(recompute_from_history(&history, "2025-01-10").unwrap(), 0);
        assert_eq!(recompute_from_history(&history, "2025-01-09").unwrap(), 2);
    }

    #[test]
    fn recompute_counts_to_start_of_history() {
        let history = ledger(&[
            ("2025-01-01", SpinResult::Failure),
            ("2025-01-02", SpinResult::Failure),
            ("2025-01-03", SpinResult::Failure),
            ("2025-01-05", SpinResult::Failure),
        ]);
        assert_eq!(recompute_from_history(&history, "2025-01-04").unwrap(), 3);
        assert_eq!(recompute_from_history(&MemoryHistory::new(), "2025-01-04").unwrap(), 0);
    }
}
