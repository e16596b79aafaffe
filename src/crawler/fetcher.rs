//! Fetch capability and its implementations
//!
//! The scheduler and the robots gate only see the [`Fetcher`] trait. Two
//! implementations are selected by configuration:
//! - [`HttpFetcher`] talks to the target site directly through reqwest
//! - [`RenderServiceFetcher`] asks an external rendering service for the
//!   rendered markup of the target

use crate::config::{Config, FetchMode, UserAgentConfig};
use crate::state::FetchStatus;
use crate::{ConfigError, SiftError};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum number of redirects followed per request
const MAX_REDIRECTS: usize = 10;

/// Response header a render service uses to report the post-redirect URL
const FINAL_URL_HEADER: &str = "x-final-url";

/// A single fetch invocation
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    /// Proxy address to egress through, if any
    pub proxy: Option<String>,
    pub timeout: Duration,
}

impl FetchRequest {
    pub fn new(url: Url, timeout: Duration) -> Self {
        Self {
            url,
            headers: BTreeMap::new(),
            proxy: None,
            timeout,
        }
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

/// Response returned by a fetch capability
///
/// Any HTTP status is a response; only transport problems are errors.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status_code: u16,
    pub body: String,
    /// URL after redirects
    pub final_url: String,
}

impl FetchResponse {
    /// Returns true for 2xx responses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Transport-level fetch failures
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid proxy '{0}'")]
    InvalidProxy(String),
}

impl FetchError {
    /// Maps the error onto the outcome taxonomy
    pub fn status(&self) -> FetchStatus {
        match self {
            Self::Timeout => FetchStatus::Timeout,
            Self::Network(_) | Self::InvalidProxy(_) => FetchStatus::NetworkError,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// The "fetch page" capability consumed by the crawl core
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The full User-Agent header value
/// * `proxy` - Proxy address every request of this client goes through
///
/// # Example
///
/// ```no_run
/// use sumi_sift::config::UserAgentConfig;
/// use sumi_sift::crawler::build_http_client;
///
/// let config = UserAgentConfig::default();
/// let client = build_http_client(&config.header_value(), None).unwrap();
/// ```
pub fn build_http_client(user_agent: &str, proxy: Option<&str>) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }

    builder.build()
}

/// Per-request headers override defaults of the same name
fn merge_headers(
    defaults: &BTreeMap<String, String>,
    request: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = defaults
        .iter()
        .filter(|(name, _)| {
            !request
                .keys()
                .any(|other| other.eq_ignore_ascii_case(name.as_str()))
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    merged.extend(request.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Keeps one reqwest client per proxy address
///
/// reqwest binds a proxy when the client is built, so proxied requests need
/// their own client. Clients are created on first use.
struct ClientPool {
    user_agent: String,
    direct: Client,
    proxied: Mutex<HashMap<String, Client>>,
}

impl ClientPool {
    fn new(user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        let user_agent = user_agent.header_value();
        let direct = build_http_client(&user_agent, None)?;
        Ok(Self {
            user_agent,
            direct,
            proxied: Mutex::new(HashMap::new()),
        })
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<Client, FetchError> {
        let Some(proxy) = proxy else {
            return Ok(self.direct.clone());
        };

        let mut proxied = match self.proxied.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(client) = proxied.get(proxy) {
            return Ok(client.clone());
        }

        let client = build_http_client(&self.user_agent, Some(proxy))
            .map_err(|_| FetchError::InvalidProxy(proxy.to_string()))?;
        proxied.insert(proxy.to_string(), client.clone());
        Ok(client)
    }
}

/// Fetches pages directly over HTTP(S)
pub struct HttpFetcher {
    clients: ClientPool,
    default_headers: BTreeMap<String, String>,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self {
            clients: ClientPool::new(&config.user_agent)?,
            default_headers: config.headers.clone(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let client = self.clients.client_for(request.proxy.as_deref())?;

        let mut builder = client.get(request.url.clone()).timeout(request.timeout);
        for (name, value) in merge_headers(&self.default_headers, &request.headers) {
            builder = builder.header(name, value);
        }

        let response = builder.send().await?;
        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await?;

        Ok(FetchResponse {
            status_code,
            body,
            final_url,
        })
    }
}

/// Fetches rendered markup from an external rendering service
///
/// The service is called as `GET <endpoint>?url=<target>`; when a proxy is
/// assigned it is forwarded as `&proxy=<address>` so the service egresses
/// through it.
pub struct RenderServiceFetcher {
    clients: ClientPool,
    endpoint: Url,
    default_headers: BTreeMap<String, String>,
}

impl RenderServiceFetcher {
    pub fn new(config: &Config, endpoint: Url) -> Result<Self, reqwest::Error> {
        Ok(Self {
            clients: ClientPool::new(&config.user_agent)?,
            endpoint,
            default_headers: config.headers.clone(),
        })
    }

    fn service_url(&self, request: &FetchRequest) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("url", request.url.as_str());
            if let Some(proxy) = &request.proxy {
                pairs.append_pair("proxy", proxy);
            }
        }
        url
    }
}

#[async_trait]
impl Fetcher for RenderServiceFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let client = self.clients.client_for(None)?;

        let mut builder = client.get(self.service_url(&request)).timeout(request.timeout);
        for (name, value) in merge_headers(&self.default_headers, &request.headers) {
            builder = builder.header(name, value);
        }

        let response = builder.send().await?;
        let status_code = response.status().as_u16();
        let final_url = response
            .headers()
            .get(FINAL_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| request.url.to_string());
        let body = response.text().await?;

        Ok(FetchResponse {
            status_code,
            body,
            final_url,
        })
    }
}

/// Builds the fetch capability selected by `fetch-mode`
pub fn build_fetcher(config: &Config) -> Result<Arc<dyn Fetcher>, SiftError> {
    match config.crawler.fetch_mode {
        FetchMode::Http => Ok(Arc::new(HttpFetcher::new(config)?)),
        FetchMode::RenderService => {
            let endpoint = config.crawler.render_endpoint.as_deref().ok_or_else(|| {
                ConfigError::Validation(
                    "render-endpoint is required when fetch-mode is render-service".to_string(),
                )
            })?;
            let endpoint = Url::parse(endpoint)
                .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", endpoint, e)))?;
            Ok(Arc::new(RenderServiceFetcher::new(config, endpoint)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let config = UserAgentConfig::default();
        assert!(build_http_client(&config.header_value(), None).is_ok());
    }

    #[test]
    fn test_build_proxied_client() {
        let config = UserAgentConfig::default();
        assert!(build_http_client(&config.header_value(), Some("http://10.0.0.1:8080")).is_ok());
    }

    #[test]
    fn test_invalid_proxy_reported() {
        let pool = ClientPool::new(&UserAgentConfig::default()).unwrap();
        let result = pool.client_for(Some("not a proxy url"));
        assert!(matches!(result, Err(FetchError::InvalidProxy(_))));
        assert_eq!(
            FetchError::InvalidProxy("x".into()).status(),
            FetchStatus::NetworkError
        );
    }

    #[test]
    fn test_proxied_clients_reused() {
        let pool = ClientPool::new(&UserAgentConfig::default()).unwrap();
        pool.client_for(Some("http://10.0.0.1:8080")).unwrap();
        pool.client_for(Some("http://10.0.0.1:8080")).unwrap();
        pool.client_for(Some("http://10.0.0.2:8080")).unwrap();
        assert_eq!(pool.proxied.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_render_service_url() {
        let config = Config::default();
        let endpoint = Url::parse("http://127.0.0.1:3000/render").unwrap();
        let fetcher = RenderServiceFetcher::new(&config, endpoint).unwrap();

        let request = FetchRequest::new(
            Url::parse("https://example.com/a?b=1").unwrap(),
            Duration::from_secs(5),
        )
        .with_proxy(Some("http://10.0.0.1:8080".to_string()));

        let url = fetcher.service_url(&request);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("url".to_string(), "https://example.com/a?b=1".to_string()),
                ("proxy".to_string(), "http://10.0.0.1:8080".to_string()),
            ]
        );
    }

    #[test]
    fn test_build_fetcher_requires_endpoint() {
        let mut config = Config::default();
        config.crawler.fetch_mode = FetchMode::RenderService;
        config.crawler.render_endpoint = None;
        assert!(matches!(
            build_fetcher(&config),
            Err(SiftError::Config(ConfigError::Validation(_)))
        ));
    }

    #[test]
    fn test_request_headers_override_defaults() {
        let mut defaults = BTreeMap::new();
        defaults.insert("Accept".to_string(), "text/html".to_string());
        defaults.insert("Accept-Language".to_string(), "en".to_string());
        let mut request = BTreeMap::new();
        request.insert("accept".to_string(), "text/plain".to_string());

        let merged = merge_headers(&defaults, &request);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["accept"], "text/plain");
        assert_eq!(merged["Accept-Language"], "en");
    }

    #[test]
    fn test_response_success_range() {
        let mut response = FetchResponse {
            status_code: 200,
            body: String::new(),
            final_url: String::new(),
        };
        assert!(response.is_success());
        response.status_code = 301;
        assert!(!response.is_success());
        response.status_code = 204;
        assert!(response.is_success());
    }
}
