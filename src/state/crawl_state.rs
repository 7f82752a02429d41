use crate::graph::GraphStore;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};

/// Crawl progress as checkpointed alongside the graph
///
/// While a crawl runs the live copy is owned by the frontier scheduler;
/// this type is the snapshot handed to and from the persistence layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlState {
    /// Titles already fetched
    pub visited: BTreeSet<String>,

    /// Titles pending fetch, in crawl order
    pub to_visit: Vec<String>,

    /// Titles abandoned after exhausting their retry budget
    pub dead_letter: Vec<String>,

    /// When this state was last written to disk
    pub last_save: Option<DateTime<Utc>>,

    /// Hash of the configuration the state was produced under
    pub config_hash: Option<String>,
}

impl CrawlState {
    /// Creates an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if nothing has been visited, queued or abandoned
    pub fn is_fresh(&self) -> bool {
        self.visited.is_empty() && self.to_visit.is_empty() && self.dead_letter.is_empty()
    }

    /// Restores the state/graph relationship invariants after a load
    ///
    /// Drops queue entries that are already visited or dead-lettered, drops
    /// duplicate queue entries (first occurrence wins), drops dead-letter
    /// entries that were visited, and makes sure every referenced title has
    /// a record in `graph`. Graph records that appear in no list are left
    /// alone. Returns the number of entries removed.
    pub fn reconcile(&mut self, graph: &mut GraphStore) -> usize {
        let mut removed = 0;

        let before = self.dead_letter.len();
        let mut seen_dead = HashSet::new();
        let visited = &self.visited;
        self.dead_letter
            .retain(|title| !visited.contains(title) && seen_dead.insert(title.clone()));
        removed += before - self.dead_letter.len();

        let before = self.to_visit.len();
        let mut seen = HashSet::new();
        self.to_visit.retain(|title| {
            !visited.contains(title) && !seen_dead.contains(title) && seen.insert(title.clone())
        });
        removed += before - self.to_visit.len();

        for title in self
            .visited
            .iter()
            .chain(self.to_visit.iter())
            .chain(self.dead_letter.iter())
        {
            graph.ensure(title);
        }

        if removed > 0 {
            tracing::warn!("Reconciled crawl state: dropped {} inconsistent entries", removed);
        }

        removed
    }

    /// Rebuilds frontier entries lost when a damaged document was cut short
    ///
    /// Every graph record that is neither visited, queued nor dead-lettered
    /// is placed back: a record with outbound links was already fetched and
    /// is marked visited, anything else is appended to the queue in title
    /// order. Only meant for recovered documents; a clean load keeps its
    /// state exactly as saved. Returns the number of records placed.
    pub fn rescue_frontier(&mut self, graph: &GraphStore) -> usize {
        let queued: HashSet<&String> = self.to_visit.iter().collect();
        let dead: HashSet<&String> = self.dead_letter.iter().collect();

        let mut fetched = Vec::new();
        let mut unfetched = Vec::new();
        for (title, record) in graph.pages() {
            if self.visited.contains(title) || queued.contains(title) || dead.contains(title) {
                continue;
            }
            if record.outbound_links.is_empty() {
                unfetched.push(title.clone());
            } else {
                fetched.push(title.clone());
            }
        }

        let placed = fetched.len() + unfetched.len();
        if placed > 0 {
            tracing::warn!(
                "Rebuilt frontier after recovery: {} pages marked visited, {} requeued",
                fetched.len(),
                unfetched.len()
            );
        }

        self.visited.extend(fetched);
        self.to_visit.extend(unfetched);
        placed
    }
}
