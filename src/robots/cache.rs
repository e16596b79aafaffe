//! Robots.txt ruling cache entries
//!
//! A ruling is resolved once per host and kept for the lifetime of the
//! owning [`RobotsGate`](super::RobotsGate). There is no expiry.

use crate::robots::ParsedRobots;
use chrono::{DateTime, Duration, Utc};

/// Where a ruling came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulingSource {
    /// robots.txt was fetched and parsed
    Fetched,

    /// The server answered without a usable robots.txt (404, 5xx, ...)
    Missing,

    /// The server refused access to robots.txt (401/403)
    Restricted,

    /// robots.txt could not be fetched at all; the ruling fails open
    Unavailable,

    /// Robots checking is turned off
    Disabled,
}

/// Cached robots decision data for one host
#[derive(Debug, Clone)]
pub struct RobotsRuling {
    /// Host key (`host[:port]`) this ruling applies to
    pub host: String,

    /// The parsed robots.txt content
    pub robots: ParsedRobots,

    /// Disallow rules of the group matched by the configured agent token
    pub disallow_rules: Vec<String>,

    /// Crawl delay in seconds for the matched group
    pub crawl_delay: Option<f64>,

    /// When the ruling was resolved
    pub fetched_at: DateTime<Utc>,

    pub source: RulingSource,
}

impl RobotsRuling {
    /// Builds a ruling from a parsed robots.txt, resolved for `agent`
    pub fn new(host: &str, robots: ParsedRobots, agent: &str, source: RulingSource) -> Self {
        Self {
            host: host.to_string(),
            disallow_rules: robots.disallow_rules(agent),
            crawl_delay: robots.crawl_delay(agent),
            robots,
            fetched_at: Utc::now(),
            source,
        }
    }

    /// A ruling that allows everything and carries no crawl delay
    pub fn permissive(host: &str, source: RulingSource) -> Self {
        Self {
            host: host.to_string(),
            robots: ParsedRobots::allow_all(),
            disallow_rules: Vec::new(),
            crawl_delay: None,
            fetched_at: Utc::now(),
            source,
        }
    }

    /// Checks if a URL is allowed according to this ruling
    pub fn is_allowed(&self, url: &str, agent: &str) -> bool {
        self.robots.is_allowed(url, agent)
    }

    /// Returns the age of the ruling
    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }
}
