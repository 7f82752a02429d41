use serde::Deserialize;

/// Main configuration structure for Wiki-Graph
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Article titles the crawl starts from
    pub seeds: Vec<String>,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub api: ApiConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of successfully processed titles between checkpoints
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u32,

    /// Pause after a failed fetch (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Failures allowed per title before it is dead-lettered (0 = unlimited)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Upper bound on prefix parse attempts when recovering a damaged checkpoint
    #[serde(default = "default_max_recovery_attempts")]
    pub max_recovery_attempts: usize,

    /// Known size of the wiki, used only for progress reporting
    #[serde(default)]
    pub expected_total_pages: Option<u64>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: default_checkpoint_interval(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retries: default_max_retries(),
            max_recovery_attempts: default_max_recovery_attempts(),
            expected_total_pages: None,
        }
    }
}

/// Wiki query API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApiConfig {
    /// Full URL of the MediaWiki `api.php` endpoint
    pub endpoint: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
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
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the JSON checkpoint document
    pub checkpoint_path: String,

    /// Extra write attempts before a failed checkpoint is fatal
    #[serde(default = "default_checkpoint_retries")]
    pub checkpoint_retries: u32,
}

fn default_checkpoint_interval() -> u32 {
    1
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    5
}

fn default_max_recovery_attempts() -> usize {
    5000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_checkpoint_retries() -> u32 {
    3
}
