//! Runtime configuration.
//!
//! Loaded from an optional YAML file. Every field has a default, so an empty
//! file (or no file at all) gives a working setup:
//!
//! ```yaml
//! http:
//!   page_timeout_secs: 15
//! news:
//!   max_articles: 20
//!   workers: 3
//!   retry:
//!     max_attempts: 5
//!     base_delay: 2000   # milliseconds
//! papers:
//!   endpoint: http://export.arxiv.org/api/query
//! cache:
//!   summary_ttl_secs: 86400
//! llm:
//!   template: tech_insight
//! ```

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub news: NewsConfig,
    pub links: LinksConfig,
    pub papers: PapersConfig,
    pub cache: CacheConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Timeout for listing pages, article pages and search requests.
    pub page_timeout_secs: u64,
    /// Timeout for secondary content fetches.
    pub content_timeout_secs: u64,
    /// Retry budget for secondary content fetches.
    pub content_retry: RetryPolicy,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36".to_string(),
            page_timeout_secs: 15,
            content_timeout_secs: 10,
            content_retry: RetryPolicy::new(2, Duration::from_secs(1)),
        }
    }
}

impl HttpConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn content_timeout(&self) -> Duration {
        Duration::from_secs(self.content_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub listing_url: String,
    /// Articles fetched per refresh. Clamped to `1..=20`.
    pub max_articles: usize,
    /// Concurrent article fetches. Clamped to `1..=5`.
    pub workers: usize,
    /// Sleep 1–3 s before each article request.
    pub polite_delay: bool,
    pub retry: RetryPolicy,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            listing_url: "https://techcrunch.com/latest/".to_string(),
            max_articles: 20,
            workers: 3,
            polite_delay: true,
            retry: RetryPolicy::new(5, Duration::from_secs(2)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    pub listing_url: String,
    pub page_size: usize,
    pub retry: RetryPolicy,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            listing_url: "https://news.ycombinator.com/".to_string(),
            page_size: 10,
            retry: RetryPolicy::new(3, Duration::from_secs(1)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PapersConfig {
    pub endpoint: String,
    pub max_results: usize,
    pub sort_by: String,
    pub sort_order: String,
    /// Categories queried when no search terms are given.
    pub recent_categories: Vec<String>,
    pub retry: RetryPolicy,
}

impl Default for PapersConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://export.arxiv.org/api/query".to_string(),
            max_results: 10,
            sort_by: "submittedDate".to_string(),
            sort_order: "descending".to_string(),
            recent_categories: ["cs.AI", "cs.LG", "cs.CL", "cs.CV"]
                .into_iter()
                .map(String::from)
                .collect(),
            retry: RetryPolicy::new(3, Duration::from_secs(2)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub news_ttl_secs: u64,
    pub links_ttl_secs: u64,
    pub papers_ttl_secs: u64,
    pub summary_ttl_secs: u64,
    pub content_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            news_ttl_secs: 3600,
            links_ttl_secs: 300,
            papers_ttl_secs: 3600,
            summary_ttl_secs: 86_400,
            content_ttl_secs: 3600,
        }
    }
}

/// Language-model backend settings.
///
/// The backend itself (endpoint, model, key) is configured through the
/// `awful_aj` config directory; this only picks the template and retry budget.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    /// `awful_aj` chat template used for every request.
    pub template: String,
    pub max_retries: usize,
    pub base_delay_ms: u64,
    /// Longer inputs are cut before being sent.
    pub max_input_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            template: "tech_insight".to_string(),
            max_retries: 5,
            base_delay_ms: 1000,
            max_input_chars: 12_000,
        }
    }
}

impl LlmConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl Config {
    /// Load from a YAML file, or return the defaults when `path` is `None`.
    #[instrument(level = "info")]
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config = Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        info!(path, "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }
}
