//! Calendar collaborator. The core only ever sees "today" as an opaque key.
use chrono::{DateTime, Local, Utc};

pub trait Clock {
    /// Today's date key, `YYYY-MM-DD` in the caller's calendar.
    fn today(&self) -> String;

    /// Timestamp stamped onto ledger records.
    fn now(&self) -> DateTime<Utc>;
}

/// Local calendar date, UTC timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> String {
        Local::now().format("%Y-%m-%d").to_string()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a single instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    pub today: String,
    pub now: DateTime<Utc>,
}

impl FixedClock {
    #[must_use]
    pub fn new(today: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            today: today.into(),
            now,
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> String {
        self.today.clone()
    }

    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn today(&self) -> String {
        (**self).today()
    }

    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn system_clock_formats_date_key() {
        let key = SystemClock.today();
        assert_eq!(key.len(), 10);
        assert_eq!(key.as_bytes()[4], b'-');
        assert_eq!(key.as_bytes()[7], b'-');
    }

    #[test]
    fn fixed_clock_is_stable() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let clock = FixedClock::new("2025-06-01", now);
        assert_eq!(clock.today(), "2025-06-01");
        assert_eq!((&clock).now(), now);
    }
}
