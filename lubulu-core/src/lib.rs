//! Lubulu spin core
//!
//! Platform-agnostic logic for the Lubulu daily roulette: a 100-slice wheel
//! with a configurable chance of landing on "Lu", a pity counter that forces
//! a Lu after a run of failures, and a date-keyed ledger of daily outcomes.
//! Storage, entropy, and the calendar are injected through traits so the same
//! engine runs behind a CLI, a server, or a test harness.

pub mod clock;
pub mod constants;
pub mod daily;
pub mod desk;
pub mod history;
pub mod pity;
pub mod random;
pub mod resolver;
pub mod service;
pub mod settings;
pub mod store;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use daily::DailyState;
pub use desk::SpinDesk;
pub use history::{HistoryRecord, HistoryStats, HistoryStore, MemoryHistory, SpinResult};
pub use pity::{PityCounter, recompute_from_history};
pub use random::{RandomSource, ScriptedRandom, SecureRandom, SeededRandom};
pub use resolver::{ProbabilityConfig, SpinOutcome, WheelLayout, force_result, resolve};
pub use service::{
    AlreadySpun, RetryPolicy, SpinError, SpinReceipt, SpinService, SpinSession, SpinVerdict,
};
pub use settings::{Settings, SettingsError, SettingsPatch, SpinMode};
pub use store::{MemoryProfile, ProfileStore, StoreError};
