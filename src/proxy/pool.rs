//! Proxy rotation and health tracking
//!
//! Each proxy record sits behind its own lock so reports for different
//! proxies never contend. Selection reads the active subset at call time.

use crate::config::{ProxyConfig, RotationMode};
use crate::proxy::ProxyRecord;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Rotating pool of egress proxies
#[derive(Debug)]
pub struct ProxyPool {
    records: Vec<Mutex<ProxyRecord>>,
    index: HashMap<String, usize>,
    cursor: AtomicUsize,
    mode: RotationMode,
}

fn lock(record: &Mutex<ProxyRecord>) -> MutexGuard<'_, ProxyRecord> {
    match record.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl ProxyPool {
    /// Creates a pool from a list of proxy addresses
    ///
    /// Duplicate addresses are kept once.
    pub fn new<I, S>(addresses: I, mode: RotationMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut records = Vec::new();
        let mut index = HashMap::new();

        for address in addresses {
            let address = address.into();
            if index.contains_key(&address) {
                continue;
            }
            index.insert(address.clone(), records.len());
            records.push(Mutex::new(ProxyRecord::new(address)));
        }

        Self {
            records,
            index,
            cursor: AtomicUsize::new(0),
            mode,
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(config.proxy_list.iter().cloned(), config.rotation_mode)
    }

    pub fn mode(&self) -> RotationMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.records.iter().filter(|r| lock(r).active).count()
    }

    /// Picks the next proxy from the active subset
    ///
    /// Returns None when the pool is empty or every proxy is disabled. The
    /// chosen proxy's request count and last-used time are updated.
    pub fn next(&self) -> Option<String> {
        let active: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| lock(r).active)
            .map(|(i, _)| i)
            .collect();

        let chosen = match self.mode {
            RotationMode::RoundRobin => {
                if active.is_empty() {
                    return None;
                }
                let position = self.cursor.fetch_add(1, Ordering::Relaxed) % active.len();
                active[position]
            }
            RotationMode::Random => *active.choose(&mut rand::thread_rng())?,
        };

        let mut record = lock(&self.records[chosen]);
        record.mark_used();
        Some(record.address.clone())
    }

    /// Records a successful request through `address`
    pub fn report_success(&self, address: &str, latency: Duration) {
        if let Some(&i) = self.index.get(address) {
            lock(&self.records[i]).record_latency(latency);
        }
    }

    /// Records a transport failure through `address`
    ///
    /// The proxy is disabled for the rest of the run once more than half of
    /// its requests failed after more than five requests.
    pub fn report_failure(&self, address: &str) {
        let Some(&i) = self.index.get(address) else {
            return;
        };

        let mut record = lock(&self.records[i]);
        record.failure_count += 1;

        if record.active && record.is_unhealthy() {
            record.active = false;
            tracing::warn!(
                "Disabling proxy {} ({}/{} requests failed)",
                record.address,
                record.failure_count,
                record.requests_count
            );
        }
    }

    /// Returns a snapshot of every proxy record
    pub fn stats(&self) -> Vec<ProxyRecord> {
        self.records.iter().map(|r| lock(r).clone()).collect()
    }

    /// Returns a snapshot of one proxy record
    pub fn record(&self, address: &str) -> Option<ProxyRecord> {
        self.index.get(address).map(|&i| lock(&self.records[i]).clone())
    }
}
