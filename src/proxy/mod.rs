//! Egress proxy rotation
//!
//! # Components
//!
//! - `ProxyRecord`: per-proxy request, failure and latency bookkeeping
//! - `ProxyPool`: round-robin or random selection over active proxies, with
//!   permanent disablement of unhealthy ones

mod pool;
mod record;

pub use crate::config::RotationMode;
pub use pool::ProxyPool;
pub use record::{ProxyRecord, MAX_FAILURE_RATE, MIN_REQUESTS_FOR_DISABLE};
