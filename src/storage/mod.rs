//! Storage module for persisting crawl progress
//!
//! This module handles checkpointing for the crawler, including:
//! - The checkpoint document format (graph section plus metadata section)
//! - Atomic JSON writes
//! - Recovery of truncated documents on load

mod document;
mod json;
mod recovery;
mod traits;

pub use json::{JsonCheckpointStore, DEFAULT_MAX_RECOVERY_ATTEMPTS};
pub use traits::{CheckpointStore, LoadOrigin, Snapshot, StorageError, StorageResult};
