//! JSON file implementation of the checkpoint store
//!
//! Writes go to a temporary file in the target's directory which is then
//! renamed over the target, so readers only ever see a complete document.
//! Documents damaged some other way (an older non-atomic writer, a copy cut
//! short) are salvaged on load by [`recover_prefix`].

use crate::graph::GraphStore;
use crate::state::CrawlState;
use crate::storage::document::{decode, DocumentRef};
use crate::storage::recovery::recover_prefix;
use crate::storage::traits::{CheckpointStore, LoadOrigin, Snapshot, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Default bound on prefix parse attempts during recovery
pub const DEFAULT_MAX_RECOVERY_ATTEMPTS: usize = 5000;

/// Checkpoint store backed by a single JSON document on disk
#[derive(Debug, Clone)]
pub struct JsonCheckpointStore {
    path: PathBuf,
    max_recovery_attempts: usize,
}

impl JsonCheckpointStore {
    /// Creates a store for the document at `path`
    ///
    /// The file is not touched until the first `save` or `load`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_recovery_attempts: DEFAULT_MAX_RECOVERY_ATTEMPTS,
        }
    }

    /// Sets how many cut points recovery may try before giving up
    pub fn with_max_recovery_attempts(mut self, attempts: usize) -> Self {
        self.max_recovery_attempts = attempts;
        self
    }

    /// Path of the checkpoint document
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn recover(&self, raw: &[u8], error: &serde_json::Error) -> Snapshot {
        tracing::warn!(
            "Checkpoint {} is unreadable (line {}, column {}: {}); attempting recovery from {} bytes",
            self.path.display(),
            error.line(),
            error.column(),
            error,
            raw.len()
        );

        match recover_prefix(raw, self.max_recovery_attempts, decode) {
            Some((cut, (mut graph, mut state))) => {
                let discarded_bytes = raw.len() - cut.offset;
                tracing::warn!(
                    "Recovered checkpoint prefix ending at byte {} ({} bytes discarded, {} pages)",
                    cut.offset,
                    discarded_bytes,
                    graph.size()
                );
                state.reconcile(&mut graph);
                state.rescue_frontier(&graph);
                Snapshot {
                    graph,
                    state,
                    origin: LoadOrigin::Recovered {
                        cut_offset: cut.offset,
                        discarded_bytes,
                    },
                }
            }
            None => {
                let failure = StorageError::RecoveryFailed {
                    path: self.path.clone(),
                    attempts: self.max_recovery_attempts,
                };
                tracing::error!("{}; starting from an empty graph", failure);
                Snapshot::empty(LoadOrigin::Unrecoverable)
            }
        }
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn save(&mut self, graph: &GraphStore, state: &CrawlState) -> StorageResult<DateTime<Utc>> {
        let saved_at = Utc::now();
        let document = DocumentRef::new(graph, state, saved_at);

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(file.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &document)?;
            writer.flush()?;
        }
        file.as_file().sync_all()?;

        file.persist(&self.path).map_err(|e| StorageError::Persist {
            path: self.path.clone(),
            source: e.error,
        })?;

        tracing::debug!(
            "Checkpoint written to {} ({} pages, {} visited, {} queued)",
            self.path.display(),
            graph.size(),
            state.visited.len(),
            state.to_visit.len()
        );

        Ok(saved_at)
    }

    fn load(&self) -> StorageResult<Snapshot> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No checkpoint at {}", self.path.display());
                return Ok(Snapshot::empty(LoadOrigin::Missing));
            }
            Err(e) => return Err(e.into()),
        };

        match decode(&raw) {
            Ok((mut graph, mut state)) => {
                state.reconcile(&mut graph);
                tracing::info!(
                    "Loaded checkpoint {} ({} pages, {} visited, {} queued)",
                    self.path.display(),
                    graph.size(),
                    state.visited.len(),
                    state.to_visit.len()
                );
                Ok(Snapshot {
                    graph,
                    state,
                    origin: LoadOrigin::Clean,
                })
            }
            Err(e) => Ok(self.recover(&raw, &e)),
        }
    }
}
