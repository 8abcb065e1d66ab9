//! Date-keyed outcome ledger.
//!
//! Dates are opaque `YYYY-MM-DD` strings supplied by the caller; ordering is
//! plain string ordering, which matches calendar order for that format.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::store::StoreError;

/// Outcome persisted for a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpinResult {
    #[serde(alias = "lu")]
    Success,
    #[serde(alias = "no_lu")]
    Failure,
}

impl SpinResult {
    #[must_use]
    pub const fn from_success(is_success: bool) -> Self {
        if is_success {
            Self::Success
        } else {
            Self::Failure
        }
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Success => "Lu",
            Self::Failure => "not Lu",
        }
    }
}

/// One ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub result: SpinResult,
    #[serde(default, alias = "isPityTriggered")]
    pub pity_triggered: bool,
    pub timestamp: DateTime<Utc>,
}

impl HistoryRecord {
    #[must_use]
    pub const fn new(result: SpinResult, pity_triggered: bool, timestamp: DateTime<Utc>) -> Self {
        Self {
            result,
            pity_triggered,
            timestamp,
        }
    }
}

/// Ledger of at most one record per date. `set` always overwrites.
pub trait HistoryStore {
    /// Fetch the record for `date`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, date: &str) -> Result<Option<HistoryRecord>, StoreError>;

    /// Insert or fully replace the record for `date`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when a concurrent writer raced this
    /// one; the write is an idempotent overwrite and may be retried.
    fn set(&mut self, date: &str, record: HistoryRecord) -> Result<(), StoreError>;

    /// Remove the record for `date`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store rejects the deletion.
    fn delete(&mut self, date: &str) -> Result<(), StoreError>;

    /// All records, newest date first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn list_descending(&self) -> Result<Vec<(String, HistoryRecord)>, StoreError>;
}

impl<H: HistoryStore + ?Sized> HistoryStore for &mut H {
    fn get(&self, date: &str) -> Result<Option<HistoryRecord>, StoreError> {
        (**self).get(date)
    }

    fn set(&mut self, date: &str, record: HistoryRecord) -> Result<(), StoreError> {
        (**self).set(date, record)
    }

    fn delete(&mut self, date: &str) -> Result<(), StoreError> {
        (**self).delete(date)
    }

    fn list_descending(&self) -> Result<Vec<(String, HistoryRecord)>, StoreError> {
        (**self).list_descending()
    }
}

/// In-memory ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryHistory {
    records: BTreeMap<String, HistoryRecord>,
}

impl MemoryHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<(String, HistoryRecord)> for MemoryHistory {
    fn from_iter<T: IntoIterator<Item = (String, HistoryRecord)>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl HistoryStore for MemoryHistory {
    fn get(&self, date: &str) -> Result<Option<HistoryRecord>, StoreError> {
        Ok(self.records.get(date).cloned())
    }

    fn set(&mut self, date: &str, record: HistoryRecord) -> Result<(), StoreError> {
        self.records.insert(date.to_string(), record);
        Ok(())
    }

    fn delete(&mut self, date: &str) -> Result<(), StoreError> {
        self.records.remove(date);
        Ok(())
    }

    fn list_descending(&self) -> Result<Vec<(String, HistoryRecord)>, StoreError> {
        Ok(self
            .records
            .iter()
            .rev()
            .map(|(date, record)| (date.clone(), record.clone()))
            .collect())
    }
}

/// Aggregate counts over a ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total: u32,
    pub lu_count: u32,
    pub no_lu_count: u32,
    pub pity_count: u32,
    /// Share of not-Lu days in percent, rounded to one decimal.
    pub restraint_rate: f64,
}

impl HistoryStats {
    #[must_use]
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a HistoryRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.total += 1;
            match record.result {
                SpinResult::Success => stats.lu_count += 1,
                SpinResult::Failure => stats.no_lu_count += 1,
            }
            if record.pity_triggered {
                stats.pity_count += 1;
            }
        }
        if stats.total > 0 {
            let rate = f64::from(stats.no_lu_count) / f64::from(stats.total) * 100.0;
            stats.restraint_rate = (rate * 10.0).round() / 10.0;
        }
        stats
    }
}
