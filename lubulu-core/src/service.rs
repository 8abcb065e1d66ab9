//! Orchestration of one user's spins: admit, decide pity, resolve, persist,
//! update the counter, absorb into today's state.
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::clock::Clock;
use crate::constants::{DEFAULT_HISTORY_LIMIT, PERSIST_BASE_BACKOFF_MS, PERSIST_MAX_ATTEMPTS};
use crate::daily::DailyState;
use crate::history::{HistoryRecord, HistoryStats, HistoryStore, SpinResult};
use crate::pity::{PityCounter, recompute_from_history};
use crate::random::RandomSource;
use crate::resolver::{SpinOutcome, force_result, resolve};
use crate::settings::{Settings, SettingsError, SettingsPatch};
use crate::store::{ProfileStore, StoreError};

/// Bounded exponential backoff for conflicting writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// Retry without sleeping between attempts.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_backoff: Duration::ZERO,
        }
    }

    /// Delay after the failed attempt `attempt` (zero-based): 50ms, 100ms, 200ms...
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: PERSIST_MAX_ATTEMPTS,
            base_backoff: Duration::from_millis(PERSIST_BASE_BACKOFF_MS),
        }
    }
}

/// What a spin produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinReceipt {
    pub result: SpinResult,
    pub slice_index: u32,
    pub pity_triggered: bool,
    pub date: String,
    /// False for extra multi-mode spins and for writes still pending.
    pub persisted: bool,
    pub consecutive_failures: u32,
}

/// Rejection for a day that already has its spin. Not a fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlreadySpun {
    already_spun: bool,
    pub date: String,
    /// Today's stored record, so the caller can show it again.
    pub cached: Option<HistoryRecord>,
}

impl AlreadySpun {
    #[must_use]
    pub fn new(date: impl Into<String>, cached: Option<HistoryRecord>) -> Self {
        Self {
            already_spun: true,
            date: date.into(),
            cached,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpinVerdict {
    AlreadySpun(AlreadySpun),
    Spun(SpinReceipt),
}

impl SpinVerdict {
    #[must_use]
    pub const fn receipt(&self) -> Option<&SpinReceipt> {
        match self {
            Self::Spun(receipt) => Some(receipt),
            Self::AlreadySpun(_) => None,
        }
    }

    #[must_use]
    pub const fn is_already_spun(&self) -> bool {
        matches!(self, Self::AlreadySpun(_))
    }
}

#[derive(Debug, Error)]
pub enum SpinError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    /// Conflicting writers kept winning. The result is kept and saved later.
    #[error("today's spin could not be saved after {attempts} attempts; it will be saved on the next request")]
    PersistenceExhausted { attempts: u32, receipt: SpinReceipt },
    /// The ledger refused the write. The result is kept and saved later.
    #[error("today's spin could not be saved ({source}); it will be saved on the next request")]
    Unsaved {
        source: StoreError,
        receipt: SpinReceipt,
    },
    /// The ledger holds the spin but the counter write failed; it is saved on the next request.
    #[error("today's spin was saved but the pity counter was not ({source}); it will be saved on the next request")]
    PityUnsaved {
        source: StoreError,
        receipt: SpinReceipt,
    },
}

impl SpinError {
    /// Receipt of a spin whose outcome was computed but not yet stored.
    #[must_use]
    pub const fn pending_receipt(&self) -> Option<&SpinReceipt> {
        match self {
            Self::PersistenceExhausted { receipt, .. }
            | Self::Unsaved { receipt, .. }
            | Self::PityUnsaved { receipt, .. } => Some(receipt),
            Self::Settings(_) | Self::Store(_) => None,
        }
    }
}

/// Anything that can answer a spin request for one user.
pub trait SpinSession {
    /// Attempt today's spin.
    ///
    /// # Errors
    ///
    /// Returns an error when storage fails; see [`SpinError`].
    fn spin(&mut self, today: &str) -> Result<SpinVerdict, SpinError>;
}

#[derive(Debug, Clone)]
struct PendingWrite {
    date: String,
    record: HistoryRecord,
    outcome: SpinOutcome,
    receipt: SpinReceipt,
}

#[derive(Debug)]
struct WriteFailure {
    attempts: u32,
    error: StoreError,
}

impl WriteFailure {
    fn into_spin_error(self, receipt: SpinReceipt) -> SpinError {
        if self.error.is_retryable() {
            SpinError::PersistenceExhausted {
                attempts: self.attempts,
                receipt,
            }
        } else {
            SpinError::Unsaved {
                source: self.error,
                receipt,
            }
        }
    }
}

impl From<WriteFailure> for SpinError {
    fn from(failure: WriteFailure) -> Self {
        Self::Store(failure.error)
    }
}

fn with_retry<T>(
    policy: &RetryPolicy,
    key: &str,
    mut op: impl FnMut() -> Result<T, StoreError>,
) -> Result<T, WriteFailure> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(error) if error.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt - 1);
                log::warn!("write to {key} conflicted (attempt {attempt}); retrying in {delay:?}");
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
            Err(error) => {
                return Err(WriteFailure {
                    attempts: attempt,
                    error,
                });
            }
        }
    }
}

/// Spin orchestrator for a single user.
///
/// Taking `&mut self` on every mutating call keeps the counter's
/// read-modify-write from ever interleaving within a session.
#[derive(Debug)]
pub struct SpinService<P, H, R, C> {
    profile: P,
    history: H,
    rng: R,
    clock: C,
    retry: RetryPolicy,
    settings: Settings,
    pity: PityCounter,
    daily: Option<DailyState>,
    pending: Option<PendingWrite>,
    /// The in-memory counter is ahead of the stored one.
    pity_unsaved: bool,
}

impl<P, H, R, C> SpinService<P, H, R, C>
where
    P: ProfileStore,
    H: HistoryStore,
    R: RandomSource,
    C: Clock,
{
    /// Load settings and the pity counter from `profile`.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile cannot be read or holds invalid settings.
    pub fn new(profile: P, history: H, rng: R, clock: C) -> Result<Self, SpinError> {
        let settings = profile.load_settings()?.unwrap_or_default();
        settings.validate()?;
        let mut pity = profile
            .load_pity()?
            .unwrap_or_else(|| PityCounter::new(settings.pity_days));
        pity.set_threshold(settings.pity_days);
        Ok(Self {
            profile,
            history,
            rng,
            clock,
            retry: RetryPolicy::default(),
            settings,
            pity,
            daily: None,
            pending: None,
            pity_unsaved: false,
        })
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Seed today's state explicitly instead of hydrating it from the ledger.
    #[must_use]
    pub fn with_daily(mut self, daily: DailyState) -> Self {
        self.daily = Some(daily);
        self
    }

    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub const fn pity(&self) -> &PityCounter {
        &self.pity
    }

    #[must_use]
    pub const fn daily(&self) -> Option<&DailyState> {
        self.daily.as_ref()
    }

    #[must_use]
    pub fn pending_receipt(&self) -> Option<&SpinReceipt> {
        self.pending.as_ref().map(|pending| &pending.receipt)
    }

    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Give back the stores, e.g. to write them to disk.
    #[must_use]
    pub fn into_stores(self) -> (P, H) {
        (self.profile, self.history)
    }

    /// Attempt today's spin.
    ///
    /// # Errors
    ///
    /// Storage failures surface after retries. When the outcome was already
    /// computed the error carries its receipt and the write stays pending.
    pub fn spin(&mut self, today: &str) -> Result<SpinVerdict, SpinError> {
        self.flush_pending()?;
        let mode = self.settings.mode;
        let daily = self.enter_day(today)?;
        let admitted = daily.can_spin(mode);
        let first_today = !daily.has_spun();
        if !admitted {
            log::debug!("spin refused for {today}: already spun");
            let cached = self.history.get(today)?;
            return Ok(SpinVerdict::AlreadySpun(AlreadySpun::new(today, cached)));
        }

        let config = self.settings.probability();
        let pity_triggered = self.pity.should_trigger();
        let outcome = if pity_triggered {
            log::debug!(
                "pity armed after {} failures; forcing Lu",
                self.pity.consecutive_failures()
            );
            force_result(&mut self.rng, &config, true)
        } else {
            resolve(&mut self.rng, &config)
        };
        let result = SpinResult::from_success(outcome.is_success);
        let mut receipt = SpinReceipt {
            result,
            slice_index: outcome.slice_index,
            pity_triggered,
            date: today.to_string(),
            persisted: false,
            consecutive_failures: self.pity.consecutive_failures(),
        };

        if !first_today {
            // Extra multi-mode spins are for show: no ledger write, no counter change.
            self.absorb(outcome);
            return Ok(SpinVerdict::Spun(receipt));
        }

        let record = HistoryRecord::new(result, pity_triggered, self.clock.now());
        let history = &mut self.history;
        let written = with_retry(&self.retry, today, || history.set(today, record.clone()));
        self.absorb(outcome);
        match written {
            Ok(()) => {
                self.pity.record(&outcome);
                receipt.persisted = true;
                receipt.consecutive_failures = self.pity.consecutive_failures();
                log::info!(
                    "spin for {today}: {} (slice {}, pity {})",
                    result.label(),
                    outcome.slice_index,
                    pity_triggered
                );
                match self.save_pity() {
                    Ok(()) => Ok(SpinVerdict::Spun(receipt)),
                    Err(failure) => Err(SpinError::PityUnsaved {
                        source: failure.error,
                        receipt,
                    }),
                }
            }
            Err(failure) => {
                log::warn!(
                    "spin for {today} kept pending after {} attempts: {}",
                    failure.attempts,
                    failure.error
                );
                self.pending = Some(PendingWrite {
                    date: today.to_string(),
                    record,
                    outcome,
                    receipt: receipt.clone(),
                });
                Err(failure.into_spin_error(receipt))
            }
        }
    }

    /// Retry writes left behind by an earlier failure: the ledger entry,
    /// then the pity counter. Returns whether anything was flushed.
    ///
    /// # Errors
    ///
    /// Returns the same error shape as [`Self::spin`] if a write fails again.
    pub fn flush_pending(&mut self) -> Result<bool, SpinError> {
        let Some(pending) = self.pending.take() else {
            if !self.pity_unsaved {
                return Ok(false);
            }
            self.save_pity()?;
            log::info!("flushed pending pity counter");
            return Ok(true);
        };
        let history = &mut self.history;
        let written = with_retry(&self.retry, &pending.date, || {
            history.set(&pending.date, pending.record.clone())
        });
        match written {
            Ok(()) => {
                log::info!("flushed pending spin for {}", pending.date);
                self.pity.record(&pending.outcome);
                self.save_pity().map_err(|failure| SpinError::PityUnsaved {
                    source: failure.error,
                    receipt: SpinReceipt {
                        persisted: true,
                        ..pending.receipt
                    },
                })?;
                Ok(true)
            }
            Err(failure) => {
                let receipt = pending.receipt.clone();
                self.pending = Some(pending);
                Err(failure.into_spin_error(receipt))
            }
        }
    }

    /// Validate and apply a settings update, then persist it.
    ///
    /// # Errors
    ///
    /// Returns [`SpinError::Settings`] before any mutation when a value is out
    /// of range, or a storage error if saving fails.
    pub fn update_settings(&mut self, patch: &SettingsPatch) -> Result<&Settings, SpinError> {
        let mut next = self.settings.clone();
        next.apply(patch)?;
        let profile = &mut self.profile;
        with_retry(&self.retry, "settings", || profile.save_settings(&next))?;
        self.settings = next;
        self.pity.set_threshold(self.settings.pity_days);
        self.save_pity()?;
        Ok(&self.settings)
    }

    /// Manually override (`Some`) or clear (`None`) the ledger entry for
    /// `date`, then rebuild the pity streak from the ledger.
    /// Returns the new streak length.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the ledger cannot be updated or read.
    pub fn edit_history(
        &mut self,
        date: &str,
        result: Option<SpinResult>,
        today: &str,
    ) -> Result<u32, SpinError> {
        if self.pending.as_ref().is_some_and(|pending| pending.date == date) {
            // A manual edit supersedes the unsaved spin for that day.
            self.pending = None;
        }
        let history = &mut self.history;
        match result {
            Some(result) => {
                let record = HistoryRecord::new(result, false, self.clock.now());
                with_retry(&self.retry, date, || history.set(date, record.clone()))?;
            }
            None => with_retry(&self.retry, date, || history.delete(date))?,
        }
        if date == today {
            let stored = self.history.get(today)?;
            self.daily = Some(DailyState::from_record(today, stored.as_ref()));
        }
        self.recompute_pity(today)
    }

    /// Rebuild the counter from the ledger: the streak before `today`, then
    /// today's stored result if there is one.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the ledger cannot be read or the counter saved.
    pub fn recompute_pity(&mut self, today: &str) -> Result<u32, SpinError> {
        let streak = recompute_from_history(&self.history, today)?;
        self.pity.set_consecutive_failures(streak);
        if let Some(record) = self.history.get(today)? {
            self.pity.record_result(record.result);
        }
        self.save_pity()?;
        Ok(self.pity.consecutive_failures())
    }

    /// Newest records first, at most `limit` (default page size when `None`).
    ///
    /// # Errors
    ///
    /// Returns a storage error if the ledger cannot be read.
    pub fn history(&self, limit: Option<usize>) -> Result<Vec<(String, HistoryRecord)>, SpinError> {
        let mut records = self.history.list_descending()?;
        records.truncate(limit.unwrap_or(DEFAULT_HISTORY_LIMIT));
        Ok(records)
    }

    /// Counts over the whole ledger.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the ledger cannot be read.
    pub fn stats(&self) -> Result<HistoryStats, SpinError> {
        let records = self.history.list_descending()?;
        Ok(HistoryStats::from_records(records.iter().map(|(_, record)| record)))
    }

    fn enter_day(&mut self, today: &str) -> Result<&mut DailyState, SpinError> {
        let state = match self.daily.take().map(|state| state.roll_over(today)) {
            Some(state) if state.has_spun() => state,
            _ => DailyState::from_record(today, self.history.get(today)?.as_ref()),
        };
        Ok(self.daily.insert(state))
    }

    fn absorb(&mut self, outcome: SpinOutcome) {
        if let Some(daily) = self.daily.as_mut() {
            daily.add_spin(outcome);
        }
    }

    fn save_pity(&mut self) -> Result<(), WriteFailure> {
        let profile = &mut self.profile;
        let pity = &self.pity;
        let saved = with_retry(&self.retry, "pity", || profile.save_pity(pity));
        if let Err(failure) = &saved {
            log::warn!("pity counter left unsaved: {}", failure.error);
        }
        self.pity_unsaved = saved.is_err();
        saved
    }
}

impl<P, H, R, C> SpinSession for SpinService<P, H, R, C>
where
    P: ProfileStore,
    H: HistoryStore,
    R: RandomSource,
    C: Clock,
{
    fn spin(&mut self, today: &str) -> Result<SpinVerdict, SpinError> {
        Self::spin(self, today)
    }
}
