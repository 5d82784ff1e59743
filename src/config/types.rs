use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
///
/// Every section and key is optional in the TOML file; missing values fall
/// back to the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// URL the crawl starts from (the command line may override it)
    pub seed: Option<String>,

    pub crawler: CrawlerConfig,

    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,

    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum link depth from the seed (the seed is depth 0)
    pub max_depth: u32,

    /// Number of concurrent crawl workers
    pub parallelism: u32,

    /// Minimum time between fetch starts to the same host (milliseconds)
    pub per_host_delay_ms: u64,

    /// Maximum number of fetches in flight to the same host
    pub per_host_concurrency: u32,

    /// Timeout for a whole request, body included (milliseconds)
    pub fetch_timeout_ms: u64,

    /// Bodies larger than this are rejected
    pub max_body_bytes: u64,

    /// Stop enqueueing after this many tasks have been accepted
    pub max_pages: Option<u64>,

    /// Host patterns (`example.com`, `*.example.com`) links must match; empty allows all
    pub allowed_domains: Vec<String>,
}

impl CrawlerConfig {
    pub fn per_host_delay(&self) -> Duration {
        Duration::from_millis(self.per_host_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            parallelism: 4,
            per_host_delay_ms: 2000,
            per_host_concurrency: 2,
            fetch_timeout_ms: 30_000,
            max_body_bytes: 10 * 1024 * 1024,
            max_pages: None,
            allowed_domains: Vec::new(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: Option<String>,

    /// Email address for crawler-related contact
    pub contact_email: Option<String>,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// `Name/Version`, followed by `(+ContactURL; ContactEmail)` when either
    /// contact is configured.
    pub fn header_value(&self) -> String {
        let contacts: Vec<String> = self
            .contact_url
            .iter()
            .map(|u| format!("+{}", u))
            .chain(self.contact_email.iter().cloned())
            .collect();

        if contacts.is_empty() {
            format!("{}/{}", self.crawler_name, self.crawler_version)
        } else {
            format!(
                "{}/{} ({})",
                self.crawler_name,
                self.crawler_version,
                contacts.join("; ")
            )
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: env!("CARGO_PKG_NAME").to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
            contact_email: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory persisted pages are written to
    pub output_dir: PathBuf,

    /// SQLite file journaling the crawl; when unset the crawl cannot be resumed
    pub state_path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("raw_dump"),
            state_path: None,
        }
    }
}
