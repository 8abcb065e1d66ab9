//! Persistence seams for per-user settings and pity state.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pity::PityCounter;
use crate::settings::Settings;

/// Failures raised by persistence collaborators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A concurrent writer touched the same key; retrying the overwrite is safe.
    #[error("write conflict on {key}")]
    Conflict { key: String },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
}

impl StoreError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Key-value side of persistence: settings and the pity counter for one user.
pub trait ProfileStore {
    /// Load saved settings; `None` when the user has never saved any.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be read.
    fn load_settings(&self) -> Result<Option<Settings>, StoreError>;

    /// Persist settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be written.
    fn save_settings(&mut self, settings: &Settings) -> Result<(), StoreError>;

    /// Load the saved pity counter; `None` when nothing has been saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter cannot be read.
    fn load_pity(&self) -> Result<Option<PityCounter>, StoreError>;

    /// Persist the pity counter.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter cannot be written.
    fn save_pity(&mut self, pity: &PityCounter) -> Result<(), StoreError>;
}

impl<P: ProfileStore + ?Sized> ProfileStore for &mut P {
    fn load_settings(&self) -> Result<Option<Settings>, StoreError> {
        (**self).load_settings()
    }

    fn save_settings(&mut self, settings: &Settings) -> Result<(), StoreError> {
        (**self).save_settings(settings)
    }

    fn load_pity(&self) -> Result<Option<PityCounter>, StoreError> {
        (**self).load_pity()
    }

    fn save_pity(&mut self, pity: &PityCounter) -> Result<(), StoreError> {
        (**self).save_pity(pity)
    }
}

/// In-memory profile. Serializes as `{ settings, pity }` with absent keys omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pity: Option<PityCounter>,
}

impl MemoryProfile {
    #[must_use]
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: Some(settings),
            pity: None,
        }
    }
}

impl ProfileStore for MemoryProfile {
    fn load_settings(&self) -> Result<Option<Settings>, StoreError> {
        Ok(self.settings.clone())
    }

    fn save_settings(&mut self, settings: &Settings) -> Result<(), StoreError> {
        self.settings = Some(settings.clone());
        Ok(())
    }

    fn load_pity(&self) -> Result<Option<PityCounter>, StoreError> {
        Ok(self.pity.clone())
    }

    fn save_pity(&mut self, pity: &PityCounter) -> Result<(), StoreError> {
        self.pity = Some(pity.clone());
        Ok(())
    }
}
