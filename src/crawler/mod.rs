//! Crawler module for building the wiki link graph
//!
//! This module contains the core crawling logic, including:
//! - Fetching a page's outbound links from the wiki API
//! - Frontier scheduling and deduplication
//! - Overall crawl coordination and checkpointing

mod coordinator;
mod fetcher;
mod scheduler;

pub use coordinator::{run_crawl, Coordinator, CrawlReport, CrawlSettings};
pub use fetcher::{build_http_client, user_agent_string, FetchError, LinkFetcher, MediaWikiFetcher};
pub use scheduler::{RequeueOutcome, Scheduler};
