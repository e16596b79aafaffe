//! Bounded-concurrency fetch scheduling
//!
//! This module handles:
//! - Global concurrency limiting via a semaphore, dispatching in input order
//! - Robots authorization before any other gate
//! - Per-host rate limiting, including robots crawl delays
//! - Proxy assignment and health reporting
//! - Retries of transient failures
//! - Cooperative cancellation with a grace period for in-flight fetches

use crate::config::{validate_concurrency_limit, CrawlerConfig};
use crate::crawler::{CrawlTarget, FetchError, FetchOutcome, FetchRequest, Fetcher, RateGate};
use crate::proxy::ProxyPool;
use crate::robots::RobotsGate;
use crate::url::{host_key, parse_seed};
use crate::{Result, UrlResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Tunables of a [`FetchScheduler`]
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Maximum number of fetches in flight at once
    pub concurrency_limit: u32,

    /// Retries of transient failures after the first attempt
    pub max_retries: u32,

    /// Timeout of a single fetch attempt
    pub timeout: Duration,

    /// How long in-flight fetches may continue after cancellation
    pub cancel_grace: Duration,
}

impl SchedulerOptions {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            concurrency_limit: config.concurrency_limit,
            max_retries: config.max_retries,
            timeout: config.timeout(),
            cancel_grace: config.cancel_grace(),
        }
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Fetches batches of URLs through the robots, rate and proxy gates
///
/// All components are shared handles, so cloning a scheduler is cheap and
/// clones observe the same robots cache, host timestamps and proxy health.
#[derive(Clone)]
pub struct FetchScheduler {
    fetcher: Arc<dyn Fetcher>,
    robots: Arc<RobotsGate>,
    rate_gate: Arc<RateGate>,
    proxies: Option<Arc<ProxyPool>>,
    options: SchedulerOptions,
}

impl FetchScheduler {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        robots: Arc<RobotsGate>,
        rate_gate: Arc<RateGate>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            fetcher,
            robots,
            rate_gate,
            proxies: None,
            options,
        }
    }

    /// Routes fetches through `proxies`
    pub fn with_proxies(mut self, proxies: Arc<ProxyPool>) -> Self {
        self.proxies = Some(proxies);
        self
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    pub fn proxies(&self) -> Option<&Arc<ProxyPool>> {
        self.proxies.as_ref()
    }

    pub fn robots(&self) -> &Arc<RobotsGate> {
        &self.robots
    }

    /// Starts fetching `urls` and returns the stream of their outcomes
    ///
    /// Exactly one outcome is produced per input URL. Outcomes arrive in
    /// completion order; [`FetchOutcome::index`] gives the input position.
    ///
    /// # Errors
    ///
    /// Fails before fetching anything if the concurrency limit is invalid or
    /// any URL is not an absolute http(s) URL.
    pub fn run<I, S>(&self, urls: I, cancel: CancellationToken) -> Result<OutcomeStream>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        validate_concurrency_limit(self.options.concurrency_limit)?;

        let targets = urls
            .into_iter()
            .map(|u| parse_seed(u.as_ref()))
            .collect::<UrlResult<Vec<Url>>>()?;

        let total = targets.len();
        let (tx, rx) = mpsc::channel(self.options.concurrency_limit as usize);

        tracing::debug!(
            "Scheduling {} URL(s) with concurrency limit {}",
            total,
            self.options.concurrency_limit
        );

        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.dispatch(targets, tx, cancel).await });

        Ok(OutcomeStream { rx, total })
    }

    /// Hands URLs to workers in input order as concurrency slots free up
    async fn dispatch(self, targets: Vec<Url>, tx: mpsc::Sender<FetchOutcome>, cancel: CancellationToken) {
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency_limit as usize));
        let mut workers = JoinSet::new();
        let mut pending = targets.into_iter().enumerate();

        while let Some((index, url)) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                tracing::info!("Cancelled with {} URL(s) not dispatched", pending.len() + 1);
                for (index, url) in std::iter::once((index, url)).chain(pending.by_ref()) {
                    if tx.send(FetchOutcome::cancelled(index, url.as_str())).await.is_err() {
                        break;
                    }
                }
                break;
            };

            let worker = self.clone();
            let tx = tx.clone();
            let cancel = cancel.clone();
            workers.spawn(async move {
                let url_string = url.to_string();
                let fetch = tokio::spawn(async move { worker.fetch_one(index, url, &cancel).await });
                let outcome = match fetch.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!("Fetch worker for {} failed: {}", url_string, e);
                        FetchOutcome::worker_failed(index, &url_string, e.to_string())
                    }
                };
                drop(permit);
                let _ = tx.send(outcome).await;
            });
        }

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                tracing::error!("Fetch worker failed: {}", e);
            }
        }
    }

    /// Fetches a single URL through every gate, with retries
    ///
    /// After cancellation the fetch may continue for the configured grace
    /// period; past that it is abandoned and reported as cancelled.
    pub async fn fetch_one(&self, index: usize, url: Url, cancel: &CancellationToken) -> FetchOutcome {
        if cancel.is_cancelled() {
            return FetchOutcome::cancelled(index, url.as_str());
        }

        let url_string = url.to_string();
        let work = self.fetch_with_retries(index, url, cancel);
        tokio::pin!(work);

        tokio::select! {
            biased;
            outcome = &mut work => outcome,
            _ = cancel.cancelled() => {
                match tokio::time::timeout(self.options.cancel_grace, &mut work).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::debug!("Abandoning in-flight fetch of {}", url_string);
                        FetchOutcome::cancelled(index, &url_string)
                    }
                }
            }
        }
    }

    async fn fetch_with_retries(&self, index: usize, url: Url, cancel: &CancellationToken) -> FetchOutcome {
        let decision = self.robots.authorize(&url).await;
        if !decision.allowed {
            tracing::info!("Skipping {} (disallowed by robots.txt)", url);
            return FetchOutcome::robots_denied(index, url.as_str());
        }

        let host = host_key(&url).unwrap_or_default();
        let max_attempts = self.options.max_retries.saturating_add(1);
        let mut attempt = 1;

        loop {
            self.rate_gate.acquire(&host, decision.crawl_delay).await;

            if cancel.is_cancelled() {
                let mut outcome = FetchOutcome::cancelled(index, url.as_str());
                outcome.attempts = attempt - 1;
                return outcome;
            }

            let target = CrawlTarget {
                index,
                url: url.clone(),
                host: host.clone(),
                attempt,
                proxy: self.proxies.as_ref().and_then(|p| p.next()),
            };
            let outcome = self.attempt(&target).await;

            if outcome.status.is_retryable() && attempt < max_attempts && !cancel.is_cancelled() {
                tracing::debug!(
                    "Retrying {} after {} (attempt {}/{})",
                    url,
                    outcome.status,
                    attempt,
                    max_attempts
                );
                attempt += 1;
                continue;
            }

            if outcome.status.is_retryable() {
                tracing::warn!(
                    "Giving up on {} after {} attempt(s): {}",
                    url,
                    attempt,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }
            return outcome;
        }
    }

    /// Performs one fetch attempt and reports proxy health
    async fn attempt(&self, target: &CrawlTarget) -> FetchOutcome {
        let request = FetchRequest::new(target.url.clone(), self.options.timeout)
            .with_proxy(target.proxy.clone());

        let started = Instant::now();
        let result = match tokio::time::timeout(self.options.timeout, self.fetcher.fetch(request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        };
        let latency = started.elapsed();

        let pool_and_proxy = self.proxies.as_ref().zip(target.proxy.as_deref());

        match result {
            Ok(response) => {
                if response.is_success() {
                    if let Some((pool, proxy)) = pool_and_proxy {
                        pool.report_success(proxy, latency);
                    }
                } else {
                    tracing::warn!("HTTP {} for {}", response.status_code, target.url);
                }
                FetchOutcome::responded(
                    target,
                    response.status_code,
                    response.final_url,
                    response.body,
                    latency,
                )
            }
            Err(e) => {
                if let Some((pool, proxy)) = pool_and_proxy {
                    pool.report_failure(proxy);
                }
                tracing::debug!(
                    "Attempt {} for {} failed: {}",
                    target.attempt,
                    target.url,
                    e
                );
                FetchOutcome::failed(target, e.status(), e.to_string(), latency)
            }
        }
    }
}

/// Outcomes of one [`FetchScheduler::run`] call
///
/// Finite: it ends after one outcome per submitted URL.
pub struct OutcomeStream {
    rx: mpsc::Receiver<FetchOutcome>,
    total: usize,
}

impl OutcomeStream {
    /// Number of URLs submitted
    pub fn total(&self) -> usize {
        self.total
    }

    /// Waits for the next outcome in completion order
    pub async fn next(&mut self) -> Option<FetchOutcome> {
        self.rx.recv().await
    }

    /// Drains the stream in completion order
    pub async fn collect(mut self) -> Vec<FetchOutcome> {
        let mut outcomes = Vec::with_capacity(self.total);
        while let Some(outcome) = self.next().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Drains the stream and sorts the outcomes into input order
    pub async fn collect_ordered(self) -> Vec<FetchOutcome> {
        let mut outcomes = self.collect().await;
        outcomes.sort_by_key(|o| o.index);
        outcomes
    }
}
