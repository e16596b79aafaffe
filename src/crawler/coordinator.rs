//! Harvest coordinator - end-to-end orchestration
//!
//! The [`Harvester`] wires every component together from a [`Config`]:
//! fetch capability, robots gate, rate gate, proxy pool, scheduler, query
//! capability and deduplicator. It turns fetch outcomes into extracted
//! records and collects everything that did not yield a record as errors.

use crate::config::{validate, Config};
use crate::crawler::{
    build_fetcher, FetchOutcome, FetchScheduler, Fetcher, RateGate, SchedulerOptions,
};
use crate::dedup::Deduplicator;
use crate::extract::{default_field_map, FieldMap, HtmlQuery, Query, Record};
use crate::output::CrawlStatistics;
use crate::pagination::PaginationWalker;
use crate::proxy::{ProxyPool, ProxyRecord};
use crate::robots::RobotsGate;
use crate::sitemap::{expand_entries, EntryKind};
use crate::state::FetchStatus;
use crate::url::{normalize_url, parse_seed};
use crate::Result;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Upper bound on sitemap documents fetched by one discovery
pub const MAX_SITEMAPS: usize = 100;

/// A URL that did not yield a record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrawlError {
    pub url: String,
    pub status: FetchStatus,
    pub status_code: Option<u16>,
    pub message: String,
    pub attempts: u32,
}

impl From<&FetchOutcome> for CrawlError {
    fn from(outcome: &FetchOutcome) -> Self {
        Self {
            url: outcome.url.clone(),
            status: outcome.status,
            status_code: outcome.status_code,
            message: outcome
                .error
                .clone()
                .unwrap_or_else(|| outcome.status.to_string()),
            attempts: outcome.attempts,
        }
    }
}

/// Result of one harvest run
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// Unique records in input (or visitation) order
    pub records: Vec<Record>,

    /// URLs that ended in any status other than success
    pub errors: Vec<CrawlError>,

    /// Records dropped because an identical one was already kept
    pub duplicates: usize,

    pub statistics: CrawlStatistics,
}

impl CrawlReport {
    /// Appends the results of another run to this one
    pub fn merge(&mut self, other: CrawlReport) {
        self.records.extend(other.records);
        self.errors.extend(other.errors);
        self.duplicates += other.duplicates;
        self.statistics.merge(&other.statistics);
    }
}

/// Orchestrates fetching, extraction and deduplication
pub struct Harvester {
    scheduler: FetchScheduler,
    query: Arc<dyn Query>,
    dedup: Deduplicator,
    fields: FieldMap,
    /// Records carry their page URL; set when no fields are configured
    record_url: bool,
    max_pages: usize,
}

impl Harvester {
    /// Creates a harvester using the fetch capability selected by the config
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Harvester)` - Every component was constructed
    /// * `Err(SiftError)` - The configuration is invalid or the HTTP client
    ///   could not be built
    pub fn from_config(config: &Config) -> Result<Self> {
        validate(config)?;
        let fetcher = build_fetcher(config)?;
        Self::with_fetcher(config, fetcher)
    }

    /// Creates a harvester that fetches through `fetcher`
    ///
    /// The same capability serves robots.txt, page and sitemap requests.
    pub fn with_fetcher(config: &Config, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        validate(config)?;

        let crawler = &config.crawler;
        let robots = if crawler.respect_robots {
            RobotsGate::new(
                fetcher.clone(),
                config.user_agent.robots_token.clone(),
                crawler.robots_timeout().min(crawler.timeout()),
            )
        } else {
            RobotsGate::disabled(fetcher.clone())
        };
        let rate_gate = RateGate::new(crawler.base_delay());

        let mut scheduler = FetchScheduler::new(
            fetcher,
            Arc::new(robots),
            Arc::new(rate_gate),
            SchedulerOptions::from_config(crawler),
        );

        let proxies = ProxyPool::from_config(&config.proxy);
        if !proxies.is_empty() {
            tracing::info!(
                "Routing requests through {} proxy address(es), {:?} rotation",
                proxies.len(),
                proxies.mode()
            );
            scheduler = scheduler.with_proxies(Arc::new(proxies));
        }

        let record_url = config.fields.is_empty();
        let fields = if record_url {
            tracing::info!("No fields configured, recording page URL and title");
            default_field_map()
        } else {
            config.fields.clone()
        };

        Ok(Self {
            scheduler,
            query: Arc::new(HtmlQuery::new()),
            dedup: Deduplicator::new(),
            fields,
            record_url,
            max_pages: crawler.max_pages as usize,
        })
    }

    /// Replaces the query capability used for extraction and pagination
    pub fn with_query(mut self, query: Arc<dyn Query>) -> Self {
        self.query = query;
        self
    }

    pub fn scheduler(&self) -> &FetchScheduler {
        &self.scheduler
    }

    pub fn robots(&self) -> &Arc<RobotsGate> {
        self.scheduler.robots()
    }

    pub fn deduplicator(&self) -> &Deduplicator {
        &self.dedup
    }

    /// Snapshot of every proxy's health counters
    pub fn proxy_stats(&self) -> Vec<ProxyRecord> {
        self.scheduler
            .proxies()
            .map(|pool| pool.stats())
            .unwrap_or_default()
    }

    /// Fetches every seed and extracts one record per successful page
    ///
    /// Outcomes are processed in input order, so when two pages yield the
    /// same record the earlier seed keeps it.
    ///
    /// # Errors
    ///
    /// Fails before fetching anything if a seed is not an absolute http(s)
    /// URL.
    pub async fn run<I, S>(&self, seeds: I, cancel: CancellationToken) -> Result<CrawlReport>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let started = Instant::now();
        let stream = self.scheduler.run(seeds, cancel)?;

        tracing::info!("Harvesting {} URL(s)", stream.total());
        let outcomes = stream.collect_ordered().await;

        let mut report = CrawlReport::default();
        for outcome in &outcomes {
            self.absorb(outcome, &mut report)?;
        }
        self.finish(&mut report, &outcomes, started);

        Ok(report)
    }

    /// Harvests `seeds` in batch mode, or walks pagination from each seed
    pub async fn harvest(&self, seeds: &[String], paginate: bool, cancel: CancellationToken) -> Result<CrawlReport> {
        if !paginate {
            return self.run(seeds, cancel).await;
        }

        let mut report = CrawlReport::default();
        for seed in seeds {
            if cancel.is_cancelled() {
                tracing::info!("Cancelled before paginating from {}", seed);
                break;
            }
            report.merge(self.run_paginated(seed, cancel.clone()).await?);
        }
        Ok(report)
    }

    /// Follows pagination from `seed`, extracting one record per page
    ///
    /// Pages are fetched one at a time; records keep visitation order. A
    /// page that fails to fetch ends the walk and is reported as an error.
    pub async fn run_paginated(&self, seed: &str, cancel: CancellationToken) -> Result<CrawlReport> {
        let started = Instant::now();
        let mut walker = PaginationWalker::new(parse_seed(seed)?, self.max_pages);
        let mut outcomes: Vec<FetchOutcome> = Vec::new();
        let mut report = CrawlReport::default();

        loop {
            let outcome = self
                .scheduler
                .fetch_one(outcomes.len(), walker.current_url().clone(), &cancel)
                .await;

            let next = match outcome.payload.as_deref() {
                Some(markup) if outcome.is_success() => walker.advance(markup, self.query.as_ref()),
                _ => {
                    walker.abort();
                    None
                }
            };

            self.absorb(&outcome, &mut report)?;
            outcomes.push(outcome);

            if next.is_none() {
                break;
            }
        }

        self.finish(&mut report, &outcomes, started);
        Ok(report)
    }

    /// Collects page URLs from a sitemap and every sitemap nested in it
    ///
    /// Each sitemap document is fetched once, at most [`MAX_SITEMAPS`] in
    /// total. Sitemaps that fail to fetch are skipped. Page URLs are returned
    /// in discovery order without repeats.
    pub async fn discover_from_sitemap(&self, sitemap_url: &str, cancel: &CancellationToken) -> Result<Vec<String>> {
        let mut queue = VecDeque::from([parse_seed(sitemap_url)?]);
        let mut visited: HashSet<String> = HashSet::new();
        let mut seen_pages: HashSet<String> = HashSet::new();
        let mut pages = Vec::new();

        while let Some(sitemap) = queue.pop_front() {
            if cancel.is_cancelled() {
                break;
            }
            if visited.len() >= MAX_SITEMAPS {
                tracing::warn!(
                    "Sitemap limit of {} reached; {} sitemap(s) not fetched",
                    MAX_SITEMAPS,
                    queue.len() + 1
                );
                break;
            }
            if !visited.insert(normalize_url(&sitemap).to_string()) {
                continue;
            }

            let outcome = self.scheduler.fetch_one(visited.len() - 1, sitemap.clone(), cancel).await;
            let body = match outcome.payload {
                Some(body) if outcome.status.is_success() => body,
                _ => {
                    tracing::warn!(
                        "Skipping sitemap {}: {}",
                        sitemap,
                        outcome.error.as_deref().unwrap_or(outcome.status.as_str())
                    );
                    continue;
                }
            };

            for entry in expand_entries(&body) {
                match entry.kind {
                    EntryKind::Page => {
                        if seen_pages.insert(entry.loc.clone()) {
                            pages.push(entry.loc);
                        }
                    }
                    EntryKind::Sitemap => match parse_seed(&entry.loc) {
                        Ok(nested) => queue.push_back(nested),
                        Err(e) => tracing::debug!("Ignoring sitemap entry {}: {}", entry.loc, e),
                    },
                }
            }
        }

        tracing::info!(
            "Discovered {} page URL(s) from {} sitemap(s)",
            pages.len(),
            visited.len()
        );
        Ok(pages)
    }

    /// Sitemap URLs declared in the robots.txt of `url`'s host
    pub async fn robots_sitemaps(&self, url: &Url) -> Vec<String> {
        self.robots()
            .ruling(url)
            .await
            .map(|ruling| ruling.robots.sitemaps().to_vec())
            .unwrap_or_default()
    }

    /// Turns one outcome into a record or an error
    fn absorb(&self, outcome: &FetchOutcome, report: &mut CrawlReport) -> Result<()> {
        let markup = match outcome.payload.as_deref() {
            Some(markup) if outcome.is_success() => markup,
            _ => {
                report.errors.push(CrawlError::from(outcome));
                return Ok(());
            }
        };

        let base = Url::parse(&outcome.effective_url).ok();
        let mut fields = self.query.extract(markup, base.as_ref(), &self.fields);
        if self.record_url {
            fields.insert(
                "url".to_string(),
                Value::String(outcome.effective_url.clone()),
            );
        }
        let record = Record::new(outcome.effective_url.clone(), fields);

        if self.dedup.admit(&record.fields)? {
            report.records.push(record);
        } else {
            tracing::debug!("Dropping duplicate record from {}", record.url);
            report.duplicates += 1;
        }

        Ok(())
    }

    fn finish(&self, report: &mut CrawlReport, outcomes: &[FetchOutcome], started: Instant) {
        report.statistics = CrawlStatistics::from_outcomes(
            outcomes,
            report.records.len(),
            report.duplicates,
            started.elapsed(),
        );

        tracing::info!(
            "Harvest finished: {} record(s), {} duplicate(s), {} error(s)",
            report.records.len(),
            report.duplicates,
            report.errors.len()
        );
    }
}
