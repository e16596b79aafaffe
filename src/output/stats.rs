//! Run statistics
//!
//! This module folds the outcomes of a run into summary counters and
//! prints them for the command line.

use crate::crawler::FetchOutcome;
use crate::state::FetchStatus;
use std::collections::HashMap;
use std::time::Duration;

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Number of URLs that produced an outcome
    pub total_urls: u64,

    /// Count of outcomes by terminal status
    pub outcomes_by_status: HashMap<FetchStatus, u64>,

    /// Fetch attempts made across all URLs, retries included
    pub total_attempts: u64,

    /// Records kept after deduplication
    pub records: u64,

    /// Records rejected as duplicates
    pub duplicates: u64,

    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl CrawlStatistics {
    /// Builds statistics from the outcomes of a run
    ///
    /// # Arguments
    ///
    /// * `outcomes` - Every outcome the run produced
    /// * `records` - Number of records kept
    /// * `duplicates` - Number of records rejected as duplicates
    /// * `elapsed` - Duration of the run
    pub fn from_outcomes(
        outcomes: &[FetchOutcome],
        records: usize,
        duplicates: usize,
        elapsed: Duration,
    ) -> Self {
        let mut stats = Self {
            records: records as u64,
            duplicates: duplicates as u64,
            elapsed,
            ..Self::default()
        };
        for outcome in outcomes {
            stats.record_outcome(outcome);
        }
        stats
    }

    /// Adds one outcome to the counters
    pub fn record_outcome(&mut self, outcome: &FetchOutcome) {
        self.total_urls += 1;
        self.total_attempts += u64::from(outcome.attempts);
        *self.outcomes_by_status.entry(outcome.status).or_insert(0) += 1;
    }

    /// Adds the counters of another run
    pub fn merge(&mut self, other: &CrawlStatistics) {
        self.total_urls += other.total_urls;
        self.total_attempts += other.total_attempts;
        self.records += other.records;
        self.duplicates += other.duplicates;
        self.elapsed += other.elapsed;
        for (status, count) in &other.outcomes_by_status {
            *self.outcomes_by_status.entry(*status).or_insert(0) += count;
        }
    }

    /// Number of outcomes with the given status
    pub fn count(&self, status: FetchStatus) -> u64 {
        self.outcomes_by_status.get(&status).copied().unwrap_or(0)
    }

    /// Number of outcomes that are not successes
    pub fn failures(&self) -> u64 {
        self.total_urls - self.count(FetchStatus::Success)
    }

    /// Fetch attempts per second of wall-clock time
    pub fn requests_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.total_attempts as f64 / secs
    }

    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_urls == 0 {
            return 0.0;
        }
        (self.count(FetchStatus::Success) as f64 / self.total_urls as f64) * 100.0
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  URLs processed: {}", stats.total_urls);
    println!("  Fetch attempts: {}", stats.total_attempts);
    println!("  Records kept: {}", stats.records);
    println!("  Duplicates dropped: {}", stats.duplicates);
    println!("  Elapsed: {:.1}s", stats.elapsed.as_secs_f64());
    println!("  Requests/second: {:.2}", stats.requests_per_second());
    println!();

    println!("Outcomes by Status:");
    let mut status_counts: Vec<_> = FetchStatus::all()
        .into_iter()
        .map(|status| (status, stats.count(status)))
        .filter(|(_, count)| *count > 0)
        .collect();
    status_counts.sort_by(|a, b| b.1.cmp(&a.1));

    for (status, count) in status_counts {
        let percentage = if stats.total_urls > 0 {
            (count as f64 / stats.total_urls as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} URLs fetched successfully)",
        stats.success_rate(),
        stats.count(FetchStatus::Success),
        stats.total_urls
    );
}
