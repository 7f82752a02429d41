//! Statistics generation from a crawl checkpoint
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the persisted graph and frontier.

use crate::graph::GraphStore;
use crate::state::CrawlState;
use crate::storage::{CheckpointStore, LoadOrigin, StorageResult};
use chrono::{DateTime, Utc};

/// Number of most-linked pages reported
pub const TOP_LINKED_LIMIT: usize = 10;

/// Crawl statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlStatistics {
    /// How the checkpoint was obtained
    pub origin: LoadOrigin,

    /// Total number of pages in the graph
    pub total_pages: usize,

    /// Pages whose links have been fetched
    pub visited: usize,

    /// Titles waiting to be fetched
    pub frontier: usize,

    /// Titles given up on after repeated failures
    pub dead_letter: usize,

    /// Total number of outbound edges
    pub total_links: usize,

    /// Pages known only as link targets
    pub unfetched_pages: usize,

    /// When the checkpoint was written
    pub last_save: Option<DateTime<Utc>>,

    /// Pages with the most inbound links, most-linked first
    pub top_linked: Vec<(String, usize)>,
}

impl CrawlStatistics {
    /// Computes statistics from a graph and its crawl state
    pub fn compute(graph: &GraphStore, state: &CrawlState, origin: LoadOrigin) -> Self {
        let unfetched_pages = graph
            .pages()
            .keys()
            .filter(|title| !state.visited.contains(*title))
            .count();

        let mut top_linked: Vec<(String, usize)> = graph
            .pages()
            .iter()
            .filter(|(_, record)| !record.inbound_links.is_empty())
            .map(|(title, record)| (title.clone(), record.inbound_links.len()))
            .collect();
        // Stable sort keeps title order among ties
        top_linked.sort_by(|a, b| b.1.cmp(&a.1));
        top_linked.truncate(TOP_LINKED_LIMIT);

        Self {
            origin,
            total_pages: graph.size(),
            visited: state.visited.len(),
            frontier: state.to_visit.len(),
            dead_letter: state.dead_letter.len(),
            total_links: graph.edge_count(),
            unfetched_pages,
            last_save: state.last_save,
            top_linked,
        }
    }
}

/// Loads statistics from a checkpoint store
///
/// # Arguments
///
/// * `store` - The checkpoint backend to read
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Statistics for the loaded (possibly recovered) snapshot
/// * `Err(StorageError)` - The checkpoint could not be read
pub fn load_statistics(store: &dyn CheckpointStore) -> StorageResult<CrawlStatistics> {
    let snapshot = store.load()?;
    Ok(CrawlStatistics::compute(
        &snapshot.graph,
        &snapshot.state,
        snapshot.origin,
    ))
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
/// * `expected_total_pages` - Known wiki size, if configured
pub fn print_statistics(stats: &CrawlStatistics, expected_total_pages: Option<u64>) {
    println!("=== Crawl Statistics ===\n");

    match &stats.origin {
        LoadOrigin::Missing => println!("No checkpoint found.\n"),
        LoadOrigin::Recovered {
            cut_offset,
            discarded_bytes,
        } => println!(
            "Checkpoint was damaged: recovered up to byte {} ({} bytes discarded)\n",
            cut_offset, discarded_bytes
        ),
        LoadOrigin::Unrecoverable => println!("Checkpoint could not be recovered.\n"),
        LoadOrigin::Clean => {}
    }

    println!("Overview:");
    println!("  Total pages in graph: {}", stats.total_pages);
    println!("  Total links found: {}", stats.total_links);
    println!("  Pages not yet fetched: {}", stats.unfetched_pages);
    match stats.last_save {
        Some(saved) => println!("  Last saved: {}", saved.to_rfc3339()),
        None => println!("  Last saved: never"),
    }
    println!();

    println!("Frontier:");
    println!("  Visited: {}", stats.visited);
    println!("  Queued: {}", stats.frontier);
    println!("  Dead-lettered: {}", stats.dead_letter);
    println!();

    if !stats.top_linked.is_empty() {
        println!("Most Linked Pages:");
        for (title, count) in &stats.top_linked {
            println!("  {} ({} inbound)", title, count);
        }
        println!();
    }

    if let Some(expected) = expected_total_pages {
        let percentage = if expected > 0 {
            (stats.visited as f64 / expected as f64) * 100.0
        } else {
            0.0
        };
        println!(
            "Progress: {:.1}% ({} / {} pages visited)",
            percentage, stats.visited, expected
        );
    }
}
