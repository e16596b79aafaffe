use crate::extract::FieldSpec;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Sumi-Sift
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub seeds: SeedConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Declarative field mappings, keyed by output field name
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Minimum spacing between requests to the same host (seconds)
    #[serde(rename = "base-delay", default = "default_base_delay")]
    pub base_delay: f64,

    /// Retries for transient failures (network errors and timeouts)
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Maximum number of fetches in flight at once
    #[serde(rename = "concurrency-limit", default = "default_concurrency_limit")]
    pub concurrency_limit: u32,

    /// Whether robots.txt directives are honored
    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,

    /// Hard ceiling on pages visited by a pagination walk
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Per-fetch timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    /// Timeout for robots.txt fetches (seconds), capped by `timeout`
    #[serde(rename = "robots-timeout", default = "default_robots_timeout")]
    pub robots_timeout: f64,

    /// How long in-flight fetches may keep running after cancellation (seconds)
    #[serde(rename = "cancel-grace", default = "default_cancel_grace")]
    pub cancel_grace: f64,

    /// Which fetch capability to use
    #[serde(rename = "fetch-mode", default)]
    pub fetch_mode: FetchMode,

    /// Endpoint of the rendering service used by `FetchMode::RenderService`
    #[serde(rename = "render-endpoint", default)]
    pub render_endpoint: Option<String>,
}

impl CrawlerConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs_f64(self.base_delay.max(0.0))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }

    pub fn robots_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.robots_timeout.min(self.timeout))
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_secs_f64(self.cancel_grace.max(0.0))
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_delay: default_base_delay(),
            max_retries: default_max_retries(),
            concurrency_limit: default_concurrency_limit(),
            respect_robots: true,
            max_pages: default_max_pages(),
            timeout: default_timeout(),
            robots_timeout: default_robots_timeout(),
            cancel_grace: default_cancel_grace(),
            fetch_mode: FetchMode::default(),
            render_endpoint: None,
        }
    }
}

/// Fetch strategy selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchMode {
    /// Plain HTTP fetches
    #[default]
    Http,
    /// Pages rendered by an external rendering service
    RenderService,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,

    /// Agent token matched against robots.txt `User-agent` groups
    #[serde(rename = "robots-token", default = "default_robots_token")]
    pub robots_token: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, contact
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SumiSift".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
            robots_token: default_robots_token(),
        }
    }
}

/// Egress proxy configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyConfig {
    /// Proxy addresses (e.g. `http://10.0.0.1:8080`); empty disables proxying
    #[serde(rename = "proxy-list", default)]
    pub proxy_list: Vec<String>,

    #[serde(rename = "rotation-mode", default)]
    pub rotation_mode: RotationMode,
}

/// How the proxy pool picks the next proxy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMode {
    #[default]
    RoundRobin,
    Random,
}

/// Seed URL configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub urls: Vec<String>,

    /// Follow next-page links from each seed instead of a flat batch
    #[serde(default)]
    pub paginate: bool,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory the output files are written to
    #[serde(default = "default_output_directory")]
    pub directory: String,

    #[serde(default = "default_output_formats")]
    pub formats: Vec<OutputFormat>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            formats: default_output_formats(),
        }
    }
}

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Sqlite,
}

fn default_base_delay() -> f64 {
    1.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_concurrency_limit() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_max_pages() -> u32 {
    10
}

fn default_timeout() -> f64 {
    30.0
}

fn default_robots_timeout() -> f64 {
    10.0
}

fn default_cancel_grace() -> f64 {
    5.0
}

fn default_robots_token() -> String {
    "*".to_string()
}

fn default_output_directory() -> String {
    "output".to_string()
}

fn default_output_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Json]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            user_agent: UserAgentConfig::default(),
            headers: BTreeMap::new(),
            proxy: ProxyConfig::default(),
            seeds: SeedConfig::default(),
            output: OutputConfig::default(),
            fields: BTreeMap::new(),
        }
    }
}
