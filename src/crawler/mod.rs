//! Crawler module for fetching pages and harvesting records
//!
//! This module contains the core harvesting logic, including:
//! - The fetch capability and its HTTP and render-service implementations
//! - Per-host rate limiting
//! - Bounded-concurrency scheduling with robots, proxy and retry handling
//! - Overall harvest coordination

mod coordinator;
mod fetcher;
mod outcome;
mod rate_gate;
mod scheduler;

pub use coordinator::{CrawlError, CrawlReport, Harvester, MAX_SITEMAPS};
pub use fetcher::{
    build_fetcher, build_http_client, FetchError, FetchRequest, FetchResponse, Fetcher,
    HttpFetcher, RenderServiceFetcher,
};
pub use outcome::{CrawlTarget, FetchOutcome};
pub use rate_gate::RateGate;
pub use scheduler::{FetchScheduler, OutcomeStream, SchedulerOptions};

use crate::config::Config;
use crate::Result;
use tokio_util::sync::CancellationToken;

/// Runs a complete harvest of the configured seeds
///
/// This is the main entry point for a harvest. It will:
/// 1. Validate the configuration and build every component
/// 2. Fetch the seeds, in batch or following pagination from each seed
/// 3. Extract and deduplicate records
///
/// # Arguments
///
/// * `config` - The harvest configuration
/// * `cancel` - Token that stops the harvest early
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Records, errors and statistics of the run
/// * `Err(SiftError)` - The configuration or a seed URL is invalid
pub async fn harvest(config: &Config, cancel: CancellationToken) -> Result<CrawlReport> {
    let harvester = Harvester::from_config(config)?;
    harvester
        .harvest(&config.seeds.urls, config.seeds.paginate, cancel)
        .await
}
