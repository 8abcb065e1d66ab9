//! User settings and their validation.
//!
//! Persisted settings are validated, never clamped: an out-of-range
//! probability or pity window is rejected before anything is written.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DEFAULT_LU_PROBABILITY, DEFAULT_PITY_DAYS, MAX_LU_PROBABILITY, MAX_PITY_DAYS,
    MIN_LU_PROBABILITY, MIN_PITY_DAYS,
};
use crate::resolver::ProbabilityConfig;

/// How many spins a day admits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpinMode {
    /// One spin per day.
    #[default]
    Single,
    /// Unlimited spins; only the first of the day is recorded.
    Multi,
}

impl SpinMode {
    #[must_use]
    pub const fn from_multi_flag(multi: bool) -> Self {
        if multi { Self::Multi } else { Self::Single }
    }

    #[must_use]
    pub const fn is_multi(self) -> bool {
        matches!(self, Self::Multi)
    }
}

/// Validation failures for user-supplied settings.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Lu probability must be between {min} and {max} (got {value})")]
    ProbabilityOutOfRange { value: i64, min: u8, max: u8 },
    #[error("pity days must be between {min} and {max} (got {value})")]
    PityDaysOutOfRange { value: i64, min: u16, max: u16 },
}

/// Per-user settings. Stored with the legacy `multiMode` flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "Settings::default_lu_probability")]
    pub lu_probability: u8,
    #[serde(default)]
    pub pity_days: u16,
    #[serde(default, rename = "multiMode", with = "multi_mode_flag")]
    pub mode: SpinMode,
    #[serde(default = "Settings::default_enabled")]
    pub sound_enabled: bool,
    #[serde(default = "Settings::default_enabled")]
    pub animation_enabled: bool,
}

impl Settings {
    const fn default_lu_probability() -> u8 {
        DEFAULT_LU_PROBABILITY
    }

    const fn default_enabled() -> bool {
        true
    }

    /// Check both ranges.
    ///
    /// # Errors
    ///
    /// Returns the first violated range.
    pub fn validate(&self) -> Result<(), SettingsError> {
        validate_probability(i64::from(self.lu_probability))?;
        validate_pity_days(i64::from(self.pity_days))?;
        Ok(())
    }

    /// Probability config derived from these settings.
    #[must_use]
    pub fn probability(&self) -> ProbabilityConfig {
        ProbabilityConfig::new(self.lu_probability)
    }

    /// Apply a partial update. Nothing changes unless every supplied field is valid.
    ///
    /// # Errors
    ///
    /// Returns the first violated range; `self` is left untouched.
    pub fn apply(&mut self, patch: &SettingsPatch) -> Result<(), SettingsError> {
        let lu_probability = patch
            .lu_probability
            .map(validate_probability)
            .transpose()?;
        let pity_days = patch.pity_days.map(validate_pity_days).transpose()?;

        if let Some(value) = lu_probability {
            self.lu_probability = value;
        }
        if let Some(value) = pity_days {
            self.pity_days = value;
        }
        if let Some(mode) = patch.mode {
            self.mode = mode;
        }
        if let Some(flag) = patch.sound_enabled {
            self.sound_enabled = flag;
        }
        if let Some(flag) = patch.animation_enabled {
            self.animation_enabled = flag;
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lu_probability: DEFAULT_LU_PROBABILITY,
            pity_days: DEFAULT_PITY_DAYS,
            mode: SpinMode::Single,
            sound_enabled: true,
            animation_enabled: true,
        }
    }
}

/// Partial settings update. Numeric fields are wide so that out-of-range
/// input reaches validation instead of failing to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default)]
    pub lu_probability: Option<i64>,
    #[serde(default)]
    pub pity_days: Option<i64>,
    #[serde(default)]
    pub mode: Option<SpinMode>,
    #[serde(default)]
    pub sound_enabled: Option<bool>,
    #[serde(default)]
    pub animation_enabled: Option<bool>,
}

impl SettingsPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

fn validate_probability(value: i64) -> Result<u8, SettingsError> {
    let err = SettingsError::ProbabilityOutOfRange {
        value,
        min: MIN_LU_PROBABILITY,
        max: MAX_LU_PROBABILITY,
    };
    let narrowed = u8::try_from(value).map_err(|_| err)?;
    if (MIN_LU_PROBABILITY..=MAX_LU_PROBABILITY).contains(&narrowed) {
        Ok(narrowed)
    } else {
        Err(err)
    }
}

fn validate_pity_days(value: i64) -> Result<u16, SettingsError> {
    let err = SettingsError::PityDaysOutOfRange {
        value,
        min: MIN_PITY_DAYS,
        max: MAX_PITY_DAYS,
    };
    let narrowed = u16::try_from(value).map_err(|_| err)?;
    if (MIN_PITY_DAYS..=MAX_PITY_DAYS).contains(&narrowed) {
        Ok(narrowed)
    } else {
        Err(err)
    }
}

mod multi_mode_flag {
    use super::SpinMode;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(mode: &SpinMode, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(mode.is_multi())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SpinMode, D::Error> {
        bool::deserialize(deserializer).map(SpinMode::from_multi_flag)
    }
}
