//! Front desk for concurrent spin requests across many users.
//!
//! Each user gets one session behind its own mutex, so two requests for the
//! same user never interleave while requests for different users proceed in
//! parallel. Sessions are opened outside the desk lock and can be closed
//! once nobody holds them.
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::clock::Clock;
use crate::service::{SpinError, SpinSession, SpinVerdict};

type Shared<S> = Arc<Mutex<S>>;

pub struct SpinDesk<S, F, C> {
    sessions: Mutex<HashMap<String, Shared<S>>>,
    open: F,
    clock: C,
}

impl<S, F, C> SpinDesk<S, F, C>
where
    S: SpinSession,
    F: Fn(&str) -> Result<S, SpinError>,
    C: Clock,
{
    /// `open` builds a session the first time a user shows up.
    pub fn new(open: F, clock: C) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            open,
            clock,
        }
    }

    /// Spin for `user_id`. `client_date` wins over the desk clock when present.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be opened or the spin fails.
    pub fn spin(&self, user_id: &str, client_date: Option<&str>) -> Result<SpinVerdict, SpinError> {
        let today = client_date.map_or_else(|| self.clock.today(), str::to_string);
        self.with_session(user_id, |session| session.spin(&today))
    }

    /// Run `f` with exclusive access to the user's session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be opened, or whatever `f` returns.
    pub fn with_session<T>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut S) -> Result<T, SpinError>,
    ) -> Result<T, SpinError> {
        let session = self.session(user_id)?;
        let mut guard = session.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.lock_sessions().len()
    }

    /// Drop the user's session if no request is using it.
    /// Returns whether it was removed; the next request reopens it.
    pub fn close(&self, user_id: &str) -> bool {
        let mut sessions = self.lock_sessions();
        match sessions.entry(user_id.to_string()) {
            Entry::Occupied(entry) if Arc::strong_count(entry.get()) == 1 => {
                entry.remove();
                log::debug!("closed spin session for {user_id}");
                true
            }
            _ => false,
        }
    }

    /// Drop every session no request is using. Returns how many were dropped.
    pub fn close_idle(&self) -> usize {
        let mut sessions = self.lock_sessions();
        let before = sessions.len();
        sessions.retain(|_, session| Arc::strong_count(session) > 1);
        let closed = before - sessions.len();
        if closed > 0 {
            log::debug!("closed {closed} idle spin sessions");
        }
        closed
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<String, Shared<S>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session(&self, user_id: &str) -> Result<Shared<S>, SpinError> {
        if let Some(existing) = self.lock_sessions().get(user_id) {
            return Ok(Arc::clone(existing));
        }
        log::debug!("opening spin session for {user_id}");
        // Opening only reads storage, so a session that loses the race to a
        // concurrent open for the same user is simply dropped.
        let opened = Arc::new(Mutex::new((self.open)(user_id)?));
        let mut sessions = self.lock_sessions();
        Ok(Arc::clone(
            sessions.entry(user_id.to_string()).or_insert(opened),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::history::MemoryHistory;
    use crate::random::SeededRandom;
    use crate::service::SpinService;
    use crate::settings::{Settings, SpinMode};
    use crate::store::MemoryProfile;
    use chrono::{TimeZone, Utc};

    type Session = SpinService<MemoryProfile, MemoryHistory, SeededRandom, FixedClock>;

    fn clock() -> FixedClock {
        FixedClock::new("2025-08-01", Utc.with_ymd_and_hms(2025, 8, 1, 8, 0, 0).unwrap())
    }

    fn desk(mode: SpinMode) -> SpinDesk<Session, impl Fn(&str) -> Result<Session, SpinError>, FixedClock> {
        SpinDesk::new(
            move |user: &str| {
                let settings = Settings {
                    lu_probability: 30,
                    mode,
                    ..Settings::default()
                };
                SpinService::new(
                    MemoryProfile::with_settings(settings),
                    MemoryHistory::new(),
                    SeededRandom::for_stream(7, user.as_bytes()),
                    clock(),
                )
            },
            clock(),
        )
    }

    #[test]
    fn concurrent_requests_for_one_user_admit_one_spin() {
        let desk = desk(SpinMode::Single);
        let verdicts: Vec<SpinVerdict> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| desk.spin("ada", None).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let spun = verdicts.iter().filter(|v| !v.is_already_spun()).count();
        assert_eq!(spun, 1);
        assert_eq!(desk.session_count(), 1);
    }

    #[test]
    fn users_are_isolated() {
        let desk = desk(SpinMode::Single);
        assert!(!desk.spin("ada", None).unwrap().is_already_spun());
        assert!(!desk.spin("grace", None).unwrap().is_already_spun());
        assert!(desk.spin("ada", Some("2025-08-01")).unwrap().is_already_spun());
        assert!(!desk.spin("ada", Some("2025-08-02")).unwrap().is_already_spun());
    }

    #[test]
    fn multi_mode_records_first_spin_only() {
        let desk = desk(SpinMode::Multi);
        let first = desk.spin("ada", None).unwrap();
        for _ in 0..5 {
            let extra = desk.spin("ada", None).unwrap();
            assert!(!extra.receipt().unwrap().persisted);
        }
        let stored = desk
            .with_session("ada", |session| session.history(None))
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].1.result, first.receipt().unwrap().result);
    }

    #[test]
    fn closed_sessions_reopen_on_next_request() {
        let opened = std::sync::atomic::AtomicUsize::new(0);
        let desk = SpinDesk::new(
            |user: &str| {
                opened.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                SpinService::new(
                    MemoryProfile::with_settings(Settings::default()),
                    MemoryHistory::new(),
                    SeededRandom::for_stream(7, user.as_bytes()),
                    clock(),
                )
            },
            clock(),
        );
        desk.spin("ada", None).unwrap();
        desk.spin("grace", None).unwrap();
        desk.spin("ada", None).unwrap();
        assert_eq!(opened.load(std::sync::atomic::Ordering::SeqCst), 2);

        assert!(desk.close("ada"));
        assert!(!desk.close("ada"));
        assert_eq!(desk.session_count(), 1);
        desk.spin("ada", None).unwrap();
        assert_eq!(opened.load(std::sync::atomic::Ordering::SeqCst), 3);

        assert_eq!(desk.close_idle(), 2);
        assert_eq!(desk.session_count(), 0);
    }

    #[test]
    fn busy_session_is_not_closed() {
        let desk = desk(SpinMode::Single);
        desk.with_session("ada", |_| {
            assert!(!desk.close("ada"));
            assert_eq!(desk.close_idle(), 0);
            Ok(())
        })
        .unwrap();
        assert!(desk.close("ada"));
    }
}
