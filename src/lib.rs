//! Wiki-Graph: an incremental wiki link-graph crawler
//!
//! This crate builds a directed link graph of a wiki by crawling pages through
//! the wiki's query API, checkpointing progress so a crawl can be interrupted
//! and resumed without losing or repeating work.

pub mod config;
pub mod crawler;
pub mod graph;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Wiki-Graph operations
#[derive(Debug, Error)]
pub enum WikiGraphError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Invalid driver transition: {from} -> {to}")]
    InvalidTransition {
        from: state::DriverState,
        to: state::DriverState,
    },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Wiki-Graph operations
pub type Result<T> = std::result::Result<T, WikiGraphError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use graph::{GraphStore, PageRecord};
pub use state::{CrawlState, DriverState};
