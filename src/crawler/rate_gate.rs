//! Per-host request spacing
//!
//! Each host keeps a [`HostState`]. A caller reserves its dispatch slot
//! under the lock and sleeps outside it, so concurrent callers for the same
//! host queue up behind each other while other hosts proceed independently.

use crate::state::HostState;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Enforces a minimum delay between requests to the same host
#[derive(Debug)]
pub struct RateGate {
    base_delay: Duration,
    hosts: Mutex<HashMap<String, HostState>>,
}

impl RateGate {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            base_delay,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Effective spacing for a host: `max(base_delay, host_delay)`
    ///
    /// Negative or non-finite host delays are ignored.
    pub fn effective_delay(&self, host_delay: Option<f64>) -> Duration {
        let host_delay = host_delay
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or(Duration::ZERO);
        self.base_delay.max(host_delay)
    }

    /// Waits until a request to `host` may be dispatched
    ///
    /// # Arguments
    ///
    /// * `host` - Host key of the request
    /// * `host_delay` - Crawl delay declared by the host's robots.txt, in seconds
    pub async fn acquire(&self, host: &str, host_delay: Option<f64>) {
        let wait = self.reserve(host, host_delay, Instant::now());

        if !wait.is_zero() {
            tracing::trace!("Waiting {:?} before next request to {}", wait, host);
            tokio::time::sleep(wait).await;
        }
    }

    /// Reserves the next slot for `host` and returns the required wait
    fn reserve(&self, host: &str, host_delay: Option<f64>, now: Instant) -> Duration {
        let delay = self.effective_delay(host_delay);
        let mut hosts = match self.hosts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        hosts
            .entry(host.to_string())
            .or_insert_with(HostState::new)
            .reserve(delay, now)
    }

    /// Number of requests dispatched to `host`
    pub fn request_count(&self, host: &str) -> u64 {
        let hosts = match self.hosts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        hosts.get(host).map(|s| s.request_count).unwrap_or(0)
    }
}
