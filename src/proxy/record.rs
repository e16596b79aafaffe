use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Minimum number of requests before a proxy may be disabled
pub const MIN_REQUESTS_FOR_DISABLE: u64 = 5;

/// Failure ratio above which a proxy is disabled
pub const MAX_FAILURE_RATE: f64 = 0.5;

/// Weight of the previous mean when folding in a new latency sample
const LATENCY_SMOOTHING: f64 = 0.7;

/// Health bookkeeping for a single proxy
#[derive(Debug, Clone, Serialize)]
pub struct ProxyRecord {
    pub address: String,
    pub requests_count: u64,
    pub failure_count: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    /// Exponentially smoothed latency of successful requests
    pub mean_latency: Option<Duration>,
    pub active: bool,
}

impl ProxyRecord {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            requests_count: 0,
            failure_count: 0,
            last_used_at: None,
            mean_latency: None,
            active: true,
        }
    }

    /// Failures divided by requests (0 before the first request)
    pub fn failure_rate(&self) -> f64 {
        self.failure_count as f64 / self.requests_count.max(1) as f64
    }

    /// Whether the record has crossed the disable threshold
    ///
    /// Both conditions must hold: more than half of the requests failed and
    /// more than [`MIN_REQUESTS_FOR_DISABLE`] requests were made.
    pub fn is_unhealthy(&self) -> bool {
        self.failure_rate() > MAX_FAILURE_RATE && self.requests_count > MIN_REQUESTS_FOR_DISABLE
    }

    pub(crate) fn mark_used(&mut self) {
        self.requests_count += 1;
        self.last_used_at = Some(Utc::now());
    }

    pub(crate) fn record_latency(&mut self, latency: Duration) {
        self.mean_latency = Some(match self.mean_latency {
            Some(mean) => mean.mul_f64(LATENCY_SMOOTHING) + latency.mul_f64(1.0 - LATENCY_SMOOTHING),
            None => latency,
        });
    }
}
