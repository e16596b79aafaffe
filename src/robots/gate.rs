//! Per-host robots.txt authorization
//!
//! The first lookup for a host fetches `/robots.txt` once through the fetch
//! capability. Concurrent first lookups for the same host share that fetch.
//! Any failure to fetch yields a permissive ruling.

use crate::crawler::{FetchError, FetchRequest, Fetcher};
use crate::robots::{ParsedRobots, RobotsRuling, RulingSource};
use crate::url::host_key;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

/// Result of a robots lookup for one URL
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotsDecision {
    pub allowed: bool,

    /// Crawl delay in seconds declared for the matched agent group
    pub crawl_delay: Option<f64>,
}

impl RobotsDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            crawl_delay: None,
        }
    }
}

type RulingCell = Arc<OnceCell<Arc<RobotsRuling>>>;

/// Caches robots rulings per host and authorizes URLs against them
pub struct RobotsGate {
    fetcher: Arc<dyn Fetcher>,
    agent: String,
    timeout: Duration,
    enabled: bool,
    rulings: Mutex<HashMap<String, RulingCell>>,
}

impl RobotsGate {
    /// Creates a gate that fetches robots.txt through `fetcher`
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Fetch capability used for `/robots.txt` requests
    /// * `agent` - Agent token matched against `User-agent` groups
    /// * `timeout` - Timeout for the single robots fetch attempt
    pub fn new(fetcher: Arc<dyn Fetcher>, agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            fetcher,
            agent: agent.into(),
            timeout,
            enabled: true,
            rulings: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a gate that allows every URL without fetching anything
    pub fn disabled(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            enabled: false,
            ..Self::new(fetcher, "*", Duration::from_secs(1))
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Authorizes `url` and resolves the host's crawl delay
    pub async fn authorize(&self, url: &Url) -> RobotsDecision {
        if !self.enabled {
            return RobotsDecision::allow();
        }

        let Some(ruling) = self.ruling(url).await else {
            return RobotsDecision::allow();
        };

        let allowed = ruling.is_allowed(url.as_str(), &self.agent);
        if !allowed {
            tracing::debug!("robots.txt disallows {}", url);
        }

        RobotsDecision {
            allowed,
            crawl_delay: ruling.crawl_delay,
        }
    }

    /// Returns the cached ruling for the host of `url`, resolving it if needed
    ///
    /// Returns None for URLs without a host or when the gate is disabled.
    pub async fn ruling(&self, url: &Url) -> Option<Arc<RobotsRuling>> {
        if !self.enabled {
            return None;
        }

        let host = host_key(url)?;
        let cell = self.cell_for(&host);

        let ruling = cell
            .get_or_init(|| async { Arc::new(self.resolve(&host, url).await) })
            .await;

        Some(Arc::clone(ruling))
    }

    /// Number of hosts with a resolved ruling
    pub fn cached_hosts(&self) -> usize {
        match self.rulings.lock() {
            Ok(rulings) => rulings.values().filter(|c| c.initialized()).count(),
            Err(poisoned) => poisoned
                .into_inner()
                .values()
                .filter(|c| c.initialized())
                .count(),
        }
    }

    fn cell_for(&self, host: &str) -> RulingCell {
        let mut rulings = match self.rulings.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(rulings.entry(host.to_string()).or_default())
    }

    /// Fetches and parses robots.txt for a host, failing open
    async fn resolve(&self, host: &str, url: &Url) -> RobotsRuling {
        let robots_url = match url.join("/robots.txt") {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!("Cannot build robots.txt URL for {}: {}", host, e);
                return RobotsRuling::permissive(host, RulingSource::Unavailable);
            }
        };

        tracing::debug!("Fetching {}", robots_url);

        let mut headers = BTreeMap::new();
        headers.insert("Accept".to_string(), "text/plain".to_string());
        let request = FetchRequest::new(robots_url.clone(), self.timeout).with_headers(headers);
        let result = match tokio::time::timeout(self.timeout, self.fetcher.fetch(request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        };

        match result {
            Ok(response) if response.is_success() => {
                let robots = ParsedRobots::from_content(&response.body);
                let ruling = RobotsRuling::new(host, robots, &self.agent, RulingSource::Fetched);
                if let Some(delay) = ruling.crawl_delay {
                    tracing::info!("{} requests a crawl delay of {}s", host, delay);
                }
                ruling
            }
            Ok(response) if matches!(response.status_code, 401 | 403) => {
                tracing::warn!(
                    "robots.txt for {} returned {}; treating host as disallowed",
                    host,
                    response.status_code
                );
                RobotsRuling::new(
                    host,
                    ParsedRobots::disallow_all(),
                    &self.agent,
                    RulingSource::Restricted,
                )
            }
            Ok(response) => {
                tracing::debug!(
                    "robots.txt for {} returned {}; allowing all",
                    host,
                    response.status_code
                );
                RobotsRuling::permissive(host, RulingSource::Missing)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to fetch {}: {}; allowing all URLs for {}",
                    robots_url,
                    e,
                    host
                );
                RobotsRuling::permissive(host, RulingSource::Unavailable)
            }
        }
    }
}
