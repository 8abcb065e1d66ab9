//! Single-spin resolution against the 100-slice wheel.
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_LU_PROBABILITY, MIN_LU_PROBABILITY, TOTAL_SLICES};
use crate::random::RandomSource;

/// Probability setting for one resolution. Slices `[0, lu_probability)` are Lu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbabilityConfig {
    lu_probability: u8,
    total_slices: u32,
}

impl ProbabilityConfig {
    /// Build a config, clamping the probability into `[1, 98]`.
    #[must_use]
    pub fn new(lu_probability: u8) -> Self {
        Self {
            lu_probability: lu_probability.clamp(MIN_LU_PROBABILITY, MAX_LU_PROBABILITY),
            total_slices: TOTAL_SLICES,
        }
    }

    /// Replace the probability, clamping into `[1, 98]`.
    pub fn set_probability(&mut self, lu_probability: u8) {
        *self = Self::new(lu_probability);
    }

    #[must_use]
    pub const fn lu_probability(&self) -> u8 {
        self.lu_probability
    }

    #[must_use]
    pub const fn total_slices(&self) -> u32 {
        self.total_slices
    }

    /// Slice layout for wheel renderers.
    #[must_use]
    pub fn layout(&self) -> WheelLayout {
        let lu_slices = u32::from(self.lu_probability);
        WheelLayout {
            total_slices: self.total_slices,
            lu_slices,
            no_lu_slices: self.total_slices - lu_slices,
        }
    }

    fn success_bound(self) -> u32 {
        u32::from(self.lu_probability)
    }
}

impl Default for ProbabilityConfig {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_LU_PROBABILITY)
    }
}

/// Slice counts handed to whatever draws the wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WheelLayout {
    pub total_slices: u32,
    pub lu_slices: u32,
    pub no_lu_slices: u32,
}

/// Result of a single spin. The slice index always agrees with `is_success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinOutcome {
    pub is_success: bool,
    pub slice_index: u32,
    pub is_forced: bool,
}

/// Random draw: `idx < lu_probability` is a success.
pub fn resolve<R: RandomSource + ?Sized>(rng: &mut R, config: &ProbabilityConfig) -> SpinOutcome {
    let slice_index = rng.uniform_int(0, config.total_slices);
    SpinOutcome {
        is_success: slice_index < config.success_bound(),
        slice_index,
        is_forced: false,
    }
}

/// Predetermined result with a slice drawn from the matching region.
pub fn force_result<R: RandomSource + ?Sized>(
    rng: &mut R,
    config: &ProbabilityConfig,
    force_success: bool,
) -> SpinOutcome {
    let bound = config.success_bound();
    let slice_index = if force_success {
        rng.uniform_int(0, bound)
    } else {
        rng.uniform_int(bound, config.total_slices)
    };
    SpinOutcome {
        is_success: force_success,
        slice_index,
        is_forced: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{ScriptedRandom, SeededRandom};

    #[test]
    fn probability_is_clamped_on_every_write() {
        assert_eq!(ProbabilityConfig::new(0).lu_probability(), 1);
        assert_eq!(ProbabilityConfig::new(99).lu_probability(), 98);
        let mut config = ProbabilityConfig::new(50);
        config.set_probability(200);
        assert_eq!(config.lu_probability(), 98);
        assert_eq!(config.total_slices(), 100);
    }

    #[test]
    fn resolve_splits_on_probability_boundary() {
        let config = ProbabilityConfig::new(30);
        let mut rng = ScriptedRandom::new([29, 30]);
        let hit = resolve(&mut rng, &config);
        assert!(hit.is_success);
        assert!(!hit.is_forced);
        let miss = resolve(&mut rng, &config);
        assert!(!miss.is_success);
        assert_eq!(miss.slice_index, 30);
    }

    #[test]
    fn forced_indices_respect_region_at_range_edges() {
        let mut rng = SeededRandom::new(7);
        let low = ProbabilityConfig::new(1);
        let high = ProbabilityConfig::new(98);
        for _ in 0..2000 {
            let fail = force_result(&mut rng, &low, false);
            assert!(!fail.is_success && fail.is_forced);
            assert!((1..100).contains(&fail.slice_index));

            let win = force_result(&mut rng, &high, true);
            assert!(win.is_success && win.is_forced);
            assert!(win.slice_index < 98);

            let win_low = force_result(&mut rng, &low, true);
            assert_eq!(win_low.slice_index, 0);
        }
    }

    #[test]
    fn layout_counts_both_regions() {
        let layout = ProbabilityConfig::new(12).layout();
        assert_eq!(layout.lu_slices, 12);
        assert_eq!(layout.no_lu_slices, 88);
        assert_eq!(layout.total_slices, 100);
    }
}
