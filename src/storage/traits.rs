//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint backends and
//! associated error types.

use crate::graph::GraphStore;
use crate::state::CrawlState;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to persist checkpoint to {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Recovery failed for {path}: no parsable prefix found in {attempts} attempts")]
    RecoveryFailed { path: PathBuf, attempts: usize },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// How a snapshot was obtained from the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    /// Nothing was stored yet
    Missing,

    /// The stored document parsed cleanly
    Clean,

    /// The stored document was damaged and a prefix of it was used
    Recovered {
        /// Byte offset the document was cut at
        cut_offset: usize,
        /// Number of trailing bytes thrown away
        discarded_bytes: usize,
    },

    /// The stored document was damaged beyond recovery; the snapshot is empty
    Unrecoverable,
}

/// Graph and crawl state as read from a checkpoint
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub graph: GraphStore,
    pub state: CrawlState,
    pub origin: LoadOrigin,
}

impl Snapshot {
    /// An empty graph and fresh crawl state
    pub fn empty(origin: LoadOrigin) -> Self {
        Self {
            graph: GraphStore::new(),
            state: CrawlState::new(),
            origin,
        }
    }
}

/// Trait for checkpoint backend implementations
///
/// A checkpoint is always the complete graph plus crawl state; there are no
/// incremental writes.
pub trait CheckpointStore {
    /// Writes a full checkpoint
    ///
    /// # Returns
    ///
    /// The timestamp recorded as `last_save` in the written document
    fn save(&mut self, graph: &GraphStore, state: &CrawlState) -> StorageResult<DateTime<Utc>>;

    /// Reads the latest checkpoint
    ///
    /// A missing or unparsable checkpoint is not an error: the returned
    /// snapshot is empty and its `origin` says why. Only failures to read the
    /// underlying medium are reported as errors.
    fn load(&self) -> StorageResult<Snapshot>;
}
