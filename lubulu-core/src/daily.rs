//! Today's spins and the mode-dependent admission rule.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::constants::TOTAL_SLICES;
use crate::history::{HistoryRecord, SpinResult};
use crate::resolver::SpinOutcome;
use crate::settings::SpinMode;

/// Most days see a single spin; multi mode rarely needs more than a handful.
pub type SpinSet = SmallVec<[SpinOutcome; 4]>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyState {
    date: String,
    #[serde(default)]
    spins: SpinSet,
}

impl DailyState {
    #[must_use]
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            spins: SpinSet::new(),
        }
    }

    /// Rebuild today's state from the stored ledger entry, if any.
    #[must_use]
    pub fn from_record(date: impl Into<String>, record: Option<&HistoryRecord>) -> Self {
        let mut state = Self::new(date);
        if let Some(record) = record {
            let is_success = record.result.is_success();
            // The ledger keeps the result only; pick a slice on the matching side.
            let slice_index = if is_success { 0 } else { TOTAL_SLICES - 1 };
            state.spins.push(SpinOutcome {
                is_success,
                slice_index,
                is_forced: record.pity_triggered,
            });
        }
        state
    }

    #[must_use]
    pub fn date(&self) -> &str {
        &self.date
    }

    #[must_use]
    pub fn spins(&self) -> &[SpinOutcome] {
        &self.spins
    }

    #[must_use]
    pub fn spin_count(&self) -> usize {
        self.spins.len()
    }

    #[must_use]
    pub fn has_spun(&self) -> bool {
        !self.spins.is_empty()
    }

    /// Result of the latest spin today.
    #[must_use]
    pub fn final_result(&self) -> Option<SpinResult> {
        self.spins
            .last()
            .map(|outcome| SpinResult::from_success(outcome.is_success))
    }

    #[must_use]
    pub fn can_spin(&self, mode: SpinMode) -> bool {
        match mode {
            SpinMode::Single => self.spins.is_empty(),
            SpinMode::Multi => true,
        }
    }

    pub fn add_spin(&mut self, outcome: SpinOutcome) {
        self.spins.push(outcome);
    }

    pub fn reset(&mut self) {
        self.spins.clear();
    }

    /// Whether this state still describes `today`.
    #[must_use]
    pub fn is_for(&self, today: &str) -> bool {
        self.date == today
    }

    /// Discard the state when `today` is a different day.
    #[must_use]
    pub fn roll_over(self, today: &str) -> Self {
        if self.is_for(today) {
            self
        } else {
            Self::new(today)
        }
    }
}
