//! Centralized tuning constants for the Lubulu spin core.
//!
//! Probability and pity bounds are shared between validation of persisted
//! settings and the clamping applied to derived wheel configuration.

// Wheel --------------------------------------------------------------------
/// Number of equally weighted slices on the wheel (1% granularity).
pub const TOTAL_SLICES: u32 = 100;
pub const MIN_LU_PROBABILITY: u8 = 1;
pub const MAX_LU_PROBABILITY: u8 = 98;
pub const DEFAULT_LU_PROBABILITY: u8 = 1;

// Pity ---------------------------------------------------------------------
/// A threshold of zero disables pity.
pub const MIN_PITY_DAYS: u16 = 0;
pub const MAX_PITY_DAYS: u16 = 365;
pub const DEFAULT_PITY_DAYS: u16 = 0;

// Persistence --------------------------------------------------------------
/// Attempts made for a single ledger write before surfacing a conflict.
pub const PERSIST_MAX_ATTEMPTS: u32 = 3;
/// Backoff before the second attempt; doubles for every further attempt.
pub const PERSIST_BASE_BACKOFF_MS: u64 = 50;
/// Default page size when listing history (mirrors the ledger query limit).
pub const DEFAULT_HISTORY_LIMIT: usize = 100;
