//! Scheduler for managing the crawl frontier
//!
//! This module handles:
//! - The FIFO queue of titles waiting to be fetched (breadth-first from the seeds)
//! - The visited set and deduplication of newly discovered titles
//! - Requeueing failed titles at the tail, and dead-lettering titles that
//!   keep failing

use crate::state::CrawlState;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// What happened to a title handed back after a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueOutcome {
    /// Appended to the tail of the queue for another attempt
    Requeued { failures: u32 },

    /// Retry budget exhausted; moved to the dead letter list
    DeadLettered { failures: u32 },
}

/// Scheduler owns the visited set and the to-visit queue
///
/// Every title is in at most one of: the queue, the visited set, the dead
/// letter list, or in flight (returned by [`Scheduler::next`] and not yet
/// resolved). That is what keeps each title fetched at most once per
/// successful visit.
#[derive(Debug, Clone)]
pub struct Scheduler {
    /// Titles waiting to be fetched, head first
    to_visit: VecDeque<String>,

    /// Membership index for `to_visit`
    queued: HashSet<String>,

    /// Titles already fetched
    visited: BTreeSet<String>,

    /// Titles given up on, in the order they were abandoned
    dead_letter: Vec<String>,

    /// Membership index for `dead_letter`
    dead: HashSet<String>,

    /// Title most recently returned by `next` and not yet resolved
    in_flight: Option<String>,

    /// Failed attempts per title during this run
    failures: HashMap<String, u32>,

    /// Failures allowed before dead-lettering (0 = unlimited)
    max_retries: u32,
}

impl Scheduler {
    /// Creates an empty scheduler
    ///
    /// # Arguments
    ///
    /// * `max_retries` - Failed fetches allowed per title before it is
    ///   dead-lettered; 0 retries forever
    pub fn new(max_retries: u32) -> Self {
        Self {
            to_visit: VecDeque::new(),
            queued: HashSet::new(),
            visited: BTreeSet::new(),
            dead_letter: Vec::new(),
            dead: HashSet::new(),
            in_flight: None,
            failures: HashMap::new(),
            max_retries,
        }
    }

    /// Restores a scheduler from checkpointed state
    ///
    /// Queue order is kept. Entries that would break the disjointness of
    /// queue, visited set and dead letter list are skipped.
    pub fn from_state(state: &CrawlState, max_retries: u32) -> Self {
        let mut scheduler = Self::new(max_retries);
        scheduler.visited = state.visited.clone();

        for title in &state.dead_letter {
            if !scheduler.visited.contains(title) && scheduler.dead.insert(title.clone()) {
                scheduler.dead_letter.push(title.clone());
            }
        }

        for title in &state.to_visit {
            scheduler.enqueue_if_new(title);
        }

        scheduler
    }

    /// Queues seed titles that are not already known
    ///
    /// # Returns
    ///
    /// The number of seeds actually added
    pub fn seed(&mut self, titles: &[String]) -> usize {
        titles
            .iter()
            .filter(|title| self.enqueue_if_new(title))
            .count()
    }

    /// Pops the head of the queue
    ///
    /// The title stays in flight until [`Scheduler::mark_visited`] or
    /// [`Scheduler::requeue`] is called for it.
    pub fn next(&mut self) -> Option<String> {
        let title = self.to_visit.pop_front()?;
        self.queued.remove(&title);
        self.in_flight = Some(title.clone());
        Some(title)
    }

    /// Records `title` as fetched
    ///
    /// Idempotent. A copy of the title still waiting in the queue is removed.
    pub fn mark_visited(&mut self, title: &str) {
        self.clear_in_flight(title);
        self.failures.remove(title);

        if self.queued.remove(title) {
            self.to_visit.retain(|queued| queued != title);
        }

        if !self.visited.contains(title) {
            self.visited.insert(title.to_string());
        }
    }

    /// Appends `title` to the tail of the queue if it has never been seen
    ///
    /// # Returns
    ///
    /// `true` if the title was queued
    pub fn enqueue_if_new(&mut self, title: &str) -> bool {
        if self.is_known(title) {
            return false;
        }

        self.queued.insert(title.to_string());
        self.to_visit.push_back(title.to_string());
        true
    }

    /// Hands back a title whose fetch failed
    ///
    /// The title goes to the tail of the queue so other work proceeds first,
    /// unless it has now failed `max_retries` times, in which case it is
    /// dead-lettered and never queued again.
    pub fn requeue(&mut self, title: &str) -> RequeueOutcome {
        self.clear_in_flight(title);

        let failures = {
            let count = self.failures.entry(title.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        if self.max_retries > 0 && failures >= self.max_retries {
            self.failures.remove(title);
            if self.queued.remove(title) {
                self.to_visit.retain(|queued| queued != title);
            }
            if !self.visited.contains(title) && self.dead.insert(title.to_string()) {
                self.dead_letter.push(title.to_string());
            }
            return RequeueOutcome::DeadLettered { failures };
        }

        if !self.visited.contains(title) && self.queued.insert(title.to_string()) {
            self.to_visit.push_back(title.to_string());
        }
        RequeueOutcome::Requeued { failures }
    }

    fn clear_in_flight(&mut self, title: &str) {
        if self.in_flight.as_deref() == Some(title) {
            self.in_flight = None;
        }
    }

    fn is_known(&self, title: &str) -> bool {
        self.visited.contains(title)
            || self.queued.contains(title)
            || self.dead.contains(title)
            || self.in_flight.as_deref() == Some(title)
    }

    /// Returns true if `title` has been fetched
    pub fn is_visited(&self, title: &str) -> bool {
        self.visited.contains(title)
    }

    /// Returns the number of titles waiting in the queue
    pub fn frontier_size(&self) -> usize {
        self.to_visit.len()
    }

    /// Returns whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.to_visit.is_empty()
    }

    /// Returns the number of fetched titles
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Returns the number of dead-lettered titles
    pub fn dead_letter_count(&self) -> usize {
        self.dead_letter.len()
    }

    /// Captures the scheduler's state for a checkpoint
    ///
    /// An unresolved in-flight title is written back at the head of the
    /// queue so an interrupted fetch is retried first after a resume.
    pub fn snapshot(&self) -> CrawlState {
        let mut to_visit = Vec::with_capacity(self.to_visit.len() + 1);
        if let Some(title) = &self.in_flight {
            if !self.visited.contains(title) && !self.dead.contains(title) {
                to_visit.push(title.clone());
            }
        }
        to_visit.extend(self.to_visit.iter().cloned());

        CrawlState {
            visited: self.visited.clone(),
            to_visit,
            dead_letter: self.dead_letter.clone(),
            last_save: None,
            config_hash: None,
        }
    }
}
