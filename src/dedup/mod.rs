//! Content-fingerprint deduplication
//!
//! A fingerprint is the SHA-256 digest of a value's canonical JSON form.
//! `serde_json` maps are ordered by key, so two values with the same content
//! always serialize identically. Only digests are retained.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Computes the fingerprint of a record
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use sumi_sift::dedup::fingerprint;
///
/// let a = fingerprint(&json!({"title": "x", "price": 1})).unwrap();
/// let b = fingerprint(&json!({"price": 1, "title": "x"})).unwrap();
/// assert_eq!(a, b);
/// ```
pub fn fingerprint<T: Serialize + ?Sized>(record: &T) -> Result<String, serde_json::Error> {
    // Round-tripping through Value sorts the keys of every nested object.
    let canonical = serde_json::to_value(record)?;
    let bytes = serde_json::to_vec(&canonical)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Set of fingerprints seen during a run
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: Mutex<HashSet<String>>,
    duplicates: AtomicUsize,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    fn seen(&self) -> MutexGuard<'_, HashSet<String>> {
        match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Admits a record, returning false if an identical one was seen before
    pub fn admit<T: Serialize + ?Sized>(&self, record: &T) -> Result<bool, serde_json::Error> {
        let digest = fingerprint(record)?;
        let fresh = self.seen().insert(digest);
        if !fresh {
            self.duplicates.fetch_add(1, Ordering::Relaxed);
        }
        Ok(fresh)
    }

    /// Checks membership without recording anything
    pub fn is_duplicate<T: Serialize + ?Sized>(&self, record: &T) -> Result<bool, serde_json::Error> {
        let digest = fingerprint(record)?;
        Ok(self.seen().contains(&digest))
    }

    /// Forgets every fingerprint and the duplicate count
    pub fn reset(&self) {
        self.seen().clear();
        self.duplicates.store(0, Ordering::Relaxed);
    }

    /// Number of distinct fingerprints held
    pub fn len(&self) -> usize {
        self.seen().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen().is_empty()
    }

    /// Number of rejected admissions since creation or the last reset
    pub fn duplicate_count(&self) -> usize {
        self.duplicates.load(Ordering::Relaxed)
    }
}
