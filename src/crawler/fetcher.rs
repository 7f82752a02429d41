//! Link fetching for wiki pages
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with a proper user agent string
//! - Querying the MediaWiki API for a page's outbound links
//! - Following `plcontinue` continuation until the link list is complete
//! - Classifying failures (transport, HTTP status, API error, bad payload)

use crate::config::{ApiConfig, UserAgentConfig};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Errors from a single link fetch
///
/// The crawl driver treats every variant as transient for the title involved.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} while fetching links for '{title}'")]
    Status { title: String, status: u16 },

    #[error("API error for '{title}': {code}: {info}")]
    Api {
        title: String,
        code: String,
        info: String,
    },

    #[error("Malformed response for '{title}': {message}")]
    Malformed { title: String, message: String },
}

/// Source of a page's outbound links
///
/// Implementations need not be reentrant; the driver awaits one call at a time.
#[async_trait]
pub trait LinkFetcher: Send + Sync {
    /// Returns the titles `title` links to, in the order the source lists them
    async fn fetch_links(&self, title: &str) -> Result<Vec<String>, FetchError>;
}

/// Formats the user agent: `Name/Version (+ContactURL; ContactEmail)`
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use wiki_graph::config::UserAgentConfig;
/// use wiki_graph::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "WikiGraph".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, 30).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout_secs: u64,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(config))
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches outbound links through the MediaWiki `action=query&prop=links` API
pub struct MediaWikiFetcher {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(default, rename = "continue")]
    continuation: Option<Continuation>,
    #[serde(default)]
    query: Option<Query>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct Continuation {
    #[serde(default)]
    plcontinue: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Query {
    #[serde(default)]
    pages: HashMap<String, QueryPage>,
}

#[derive(Debug, Deserialize)]
struct QueryPage {
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    title: String,
}

impl MediaWikiFetcher {
    /// Creates a fetcher for the given API endpoint using `client`
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Creates a fetcher from configuration
    pub fn from_config(api: &ApiConfig, user_agent: &UserAgentConfig) -> Result<Self, FetchError> {
        let client = build_http_client(user_agent, api.request_timeout_secs)?;
        Ok(Self::new(client, api.endpoint.clone()))
    }

    async fn fetch_batch(
        &self,
        title: &str,
        plcontinue: Option<&str>,
    ) -> Result<QueryResponse, FetchError> {
        let mut params = vec![
            ("action", "query"),
            ("titles", title),
            ("prop", "links"),
            ("format", "json"),
            ("pllimit", "max"),
        ];
        if let Some(token) = plcontinue {
            params.push(("plcontinue", token));
        }

        let response = self.client.get(&self.endpoint).query(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                title: title.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let parsed: QueryResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::Malformed {
                title: title.to_string(),
                message: e.to_string(),
            })?;

        if let Some(error) = parsed.error {
            return Err(FetchError::Api {
                title: title.to_string(),
                code: error.code,
                info: error.info,
            });
        }

        Ok(parsed)
    }
}

#[async_trait]
impl LinkFetcher for MediaWikiFetcher {
    async fn fetch_links(&self, title: &str) -> Result<Vec<String>, FetchError> {
        let mut links = Vec::new();
        let mut plcontinue: Option<String> = None;

        loop {
            let batch = self.fetch_batch(title, plcontinue.as_deref()).await?;

            let query = batch.query.ok_or_else(|| FetchError::Malformed {
                title: title.to_string(),
                message: "response has no 'query' section".to_string(),
            })?;

            for page in query.pages.into_values() {
                links.extend(page.links.into_iter().map(|link| link.title));
            }

            match batch.continuation.and_then(|c| c.plcontinue) {
                Some(next) if plcontinue.as_deref() != Some(next.as_str()) => {
                    tracing::trace!("Continuing link query for '{}' at {}", title, next);
                    plcontinue = Some(next);
                }
                Some(next) => {
                    return Err(FetchError::Malformed {
                        title: title.to_string(),
                        message: format!("continuation token '{}' repeated", next),
                    });
                }
                None => break,
            }
        }

        tracing::debug!("Fetched {} links for '{}'", links.len(), title);
        Ok(links)
    }
}
