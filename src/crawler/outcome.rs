use crate::state::FetchStatus;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// One scheduling decision for a URL
///
/// A new target is issued for every attempt; retries never mutate an
/// existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    /// Position of the URL in the submitted batch
    pub index: usize,
    pub url: Url,
    /// Host key used for rate limiting
    pub host: String,
    /// 1-based attempt number
    pub attempt: u32,
    pub proxy: Option<String>,
}

impl CrawlTarget {
    pub fn new(index: usize, url: Url, host: String) -> Self {
        Self {
            index,
            url,
            host,
            attempt: 1,
            proxy: None,
        }
    }
}

/// Terminal result for one submitted URL
#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    /// Position of the URL in the submitted batch
    pub index: usize,
    pub url: String,
    /// URL after redirects; equals `url` when nothing was fetched
    pub effective_url: String,
    pub status: FetchStatus,
    pub status_code: Option<u16>,
    /// Response body of a successful fetch
    #[serde(skip)]
    pub payload: Option<String>,
    /// Duration of the final attempt
    pub latency: Duration,
    /// Number of fetch attempts made (0 if none)
    pub attempts: u32,
    pub proxy: Option<String>,
    pub error: Option<String>,
}

impl FetchOutcome {
    fn unattempted(index: usize, url: &str, status: FetchStatus, error: Option<String>) -> Self {
        Self {
            index,
            url: url.to_string(),
            effective_url: url.to_string(),
            status,
            status_code: None,
            payload: None,
            latency: Duration::ZERO,
            attempts: 0,
            proxy: None,
            error,
        }
    }

    /// Outcome for a URL the run never got to
    pub fn cancelled(index: usize, url: &str) -> Self {
        Self::unattempted(index, url, FetchStatus::Cancelled, None)
    }

    /// Outcome for a URL refused by robots.txt
    pub fn robots_denied(index: usize, url: &str) -> Self {
        Self::unattempted(
            index,
            url,
            FetchStatus::RobotsDenied,
            Some("disallowed by robots.txt".to_string()),
        )
    }

    /// Outcome for a URL whose worker died before reporting
    pub(crate) fn worker_failed(index: usize, url: &str, error: String) -> Self {
        Self::unattempted(index, url, FetchStatus::NetworkError, Some(error))
    }

    /// Outcome for a target that received a response
    pub(crate) fn responded(
        target: &CrawlTarget,
        status_code: u16,
        final_url: String,
        body: String,
        latency: Duration,
    ) -> Self {
        let success = (200..300).contains(&status_code);
        Self {
            index: target.index,
            url: target.url.to_string(),
            effective_url: final_url,
            status: if success {
                FetchStatus::Success
            } else {
                FetchStatus::HttpError
            },
            status_code: Some(status_code),
            payload: success.then_some(body),
            latency,
            attempts: target.attempt,
            proxy: target.proxy.clone(),
            error: (!success).then(|| format!("HTTP {}", status_code)),
        }
    }

    /// Outcome for a target whose final attempt failed in transport
    pub(crate) fn failed(target: &CrawlTarget, status: FetchStatus, error: String, latency: Duration) -> Self {
        Self {
            index: target.index,
            url: target.url.to_string(),
            effective_url: target.url.to_string(),
            status,
            status_code: None,
            payload: None,
            latency,
            attempts: target.attempt,
            proxy: target.proxy.clone(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
