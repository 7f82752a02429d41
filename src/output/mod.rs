//! Output module for reporting on a checkpointed crawl
//!
//! This module handles:
//! - Computing statistics from a checkpoint snapshot
//! - Printing them for the `--stats` mode

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};
