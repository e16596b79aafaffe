use std::time::{Duration, Instant};

/// Tracks the dispatch history of a single host
///
/// The rate gate keeps one of these per host and reserves dispatch slots
/// through [`HostState::reserve`].
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Dispatch time of the most recently reserved request
    pub last_dispatch: Option<Instant>,

    /// Number of requests dispatched to this host
    pub request_count: u64,
}

impl HostState {
    /// Creates a new HostState with no history
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates the time until the next request may be dispatched
    ///
    /// Returns `Duration::ZERO` if a request may be dispatched now.
    pub fn time_until_next_request(&self, delay: Duration, now: Instant) -> Duration {
        match self.last_dispatch {
            Some(last) => (last + delay).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Reserves the next dispatch slot and returns how long the caller must wait
    ///
    /// The reserved slot is `max(now, last_dispatch + delay)`. Committing it
    /// before the caller sleeps means a concurrent caller for the same host
    /// is queued behind this slot instead of reading a stale timestamp.
    pub fn reserve(&mut self, delay: Duration, now: Instant) -> Duration {
        let wait = self.time_until_next_request(delay, now);
        self.last_dispatch = Some(now + wait);
        self.request_count += 1;
        wait
    }
}
