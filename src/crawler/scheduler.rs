//! Scheduler for managing the crawl frontier and the page budget
//!
//! This module handles:
//! - The FIFO frontier, which makes the crawl breadth-first
//! - URL deduplication and discovery order
//! - Page and depth limits
//! - Per-host request spacing and robots.txt crawl delays
//!
//! The scheduler is plain data; the coordinator keeps it behind a mutex and
//! never holds that lock across an await.

use crate::state::HostState;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use url::Url;

/// A URL queued for fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUrl {
    /// The normalized URL to fetch
    pub url: Url,

    /// Link distance from the root
    pub depth: u32,

    /// Position in which the URL was first discovered (root is 0)
    pub order: u32,
}

/// What a worker should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// Fetch this URL; a budget slot has been reserved for it
    Ready(QueuedUrl),
    /// Nothing to fetch right now, but in-flight pages may add more
    Wait,
    /// The crawl is over
    Done,
}

/// Scheduler manages the frontier, the page budget and per-host spacing
///
/// A URL is claimed only while `parsed + in_flight < max_pages`, so the
/// number of parsed pages can never exceed the budget even with several
/// workers. Failed and skipped pages give their slot back.
#[derive(Debug)]
pub struct Scheduler {
    frontier: VecDeque<QueuedUrl>,
    seen: HashMap<String, u32>,
    next_order: u32,
    host_states: HashMap<String, HostState>,
    max_pages: u32,
    max_depth: u32,
    parsed: u32,
    in_flight: u32,
}

impl Scheduler {
    pub fn new(max_pages: u32, max_depth: u32) -> Self {
        Self {
            frontier: VecDeque::new(),
            seen: HashMap::new(),
            next_order: 0,
            host_states: HashMap::new(),
            max_pages,
            max_depth,
            parsed: 0,
            in_flight: 0,
        }
    }

    /// Enqueues a URL if it is new, within depth and the budget is not spent
    ///
    /// # Returns
    ///
    /// The discovery order assigned to the URL, or None if it was not enqueued
    pub fn offer(&mut self, url: Url, depth: u32) -> Option<u32> {
        if depth > self.max_depth || self.parsed >= self.max_pages {
            return None;
        }
        if self.seen.contains_key(url.as_str()) {
            return None;
        }

        let order = self.next_order;
        self.next_order += 1;
        self.seen.insert(url.as_str().to_string(), order);
        self.frontier.push_back(QueuedUrl { url, depth, order });
        Some(order)
    }

    /// Discovery order of a URL that has been enqueued
    pub fn order_of(&self, url: &str) -> Option<u32> {
        self.seen.get(url).copied()
    }

    /// Takes the next URL off the frontier and reserves a budget slot for it
    pub fn claim(&mut self) -> Claim {
        if self.parsed + self.in_flight >= self.max_pages {
            return if self.in_flight == 0 {
                Claim::Done
            } else {
                Claim::Wait
            };
        }

        match self.frontier.pop_front() {
            Some(queued) => {
                self.in_flight += 1;
                Claim::Ready(queued)
            }
            None if self.in_flight == 0 => Claim::Done,
            None => Claim::Wait,
        }
    }

    /// Releases the slot of a claimed URL
    ///
    /// `parsed` pages keep their slot; everything else gives it back.
    pub fn complete(&mut self, parsed: bool) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if parsed {
            self.parsed += 1;
        }
    }

    /// Reserves the next request slot for a host and returns the wait
    pub fn reserve_slot(&mut self, host: &str, now: Instant, interval: Duration) -> Duration {
        self.host_states
            .entry(host.to_string())
            .or_default()
            .reserve_slot(now, interval)
    }

    pub fn set_crawl_delay(&mut self, host: &str, delay: Duration) {
        self.host_states
            .entry(host.to_string())
            .or_default()
            .crawl_delay = Some(delay);
    }

    pub fn mark_rate_limited(&mut self, host: &str) {
        self.host_states
            .entry(host.to_string())
            .or_default()
            .mark_rate_limited();
    }

    /// Requests reserved across all hosts
    pub fn request_count(&self) -> u32 {
        self.host_states.values().map(|h| h.request_count).sum()
    }

    pub fn parsed(&self) -> u32 {
        self.parsed
    }

    /// URLs still waiting in the frontier
    pub fn pending(&self) -> usize {
        self.frontier.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://example.com{}", path)).unwrap()
    }

    fn ready(claim: Claim) -> QueuedUrl {
        match claim {
            Claim::Ready(q) => q,
            other => panic!("expected Ready, got {:?}", other),
        }
    }

    #[test]
    fn test_fifo_order_and_discovery_numbers() {
        let mut scheduler = Scheduler::new(10, 3);
        assert_eq!(scheduler.offer(url("/"), 0), Some(0));
        assert_eq!(scheduler.offer(url("/a"), 1), Some(1));
        assert_eq!(scheduler.offer(url("/b"), 1), Some(2));

        assert_eq!(ready(scheduler.claim()).url, url("/"));
        assert_eq!(ready(scheduler.claim()).url, url("/a"));
        assert_eq!(ready(scheduler.claim()).order, 2);
    }

    #[test]
    fn test_duplicates_are_not_requeued() {
        let mut scheduler = Scheduler::new(10, 3);
        scheduler.offer(url("/a"), 1);
        assert_eq!(scheduler.offer(url("/a"), 1), None);
        assert_eq!(scheduler.order_of(url("/a").as_str()), Some(0));
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn test_depth_limit() {
        let mut scheduler = Scheduler::new(10, 1);
        assert!(scheduler.offer(url("/a"), 1).is_some());
        assert!(scheduler.offer(url("/a/b"), 2).is_none());
    }

    #[test]
    fn test_budget_is_reserved_while_in_flight() {
        let mut scheduler = Scheduler::new(2, 3);
        for path in ["/", "/a", "/b", "/c"] {
            scheduler.offer(url(path), 1);
        }

        ready(scheduler.claim());
        ready(scheduler.claim());
        // Two slots reserved for in-flight pages
        assert_eq!(scheduler.claim(), Claim::Wait);

        scheduler.complete(true);
        scheduler.complete(true);
        assert_eq!(scheduler.claim(), Claim::Done);
        assert_eq!(scheduler.parsed(), 2);
    }

    #[test]
    fn test_failed_pages_give_their_slot_back() {
        let mut scheduler = Scheduler::new(1, 3);
        scheduler.offer(url("/broken"), 1);
        scheduler.offer(url("/ok"), 1);

        ready(scheduler.claim());
        assert_eq!(scheduler.claim(), Claim::Wait);
        scheduler.complete(false);

        assert_eq!(ready(scheduler.claim()).url, url("/ok"));
        scheduler.complete(true);
        assert_eq!(scheduler.claim(), Claim::Done);
    }

    #[test]
    fn test_no_new_urls_after_budget_is_spent() {
        let mut scheduler = Scheduler::new(1, 3);
        scheduler.offer(url("/"), 0);
        ready(scheduler.claim());
        scheduler.complete(true);
        assert_eq!(scheduler.offer(url("/late"), 1), None);
    }

    #[test]
    fn test_empty_frontier_waits_for_in_flight() {
        let mut scheduler = Scheduler::new(5, 3);
        scheduler.offer(url("/"), 0);
        ready(scheduler.claim());
        assert_eq!(scheduler.claim(), Claim::Wait);
        scheduler.complete(true);
        assert_eq!(scheduler.claim(), Claim::Done);
    }

    #[test]
    fn test_host_spacing_and_crawl_delay() {
        let mut scheduler = Scheduler::new(5, 3);
        let now = Instant::now();
        let interval = Duration::from_millis(100);

        assert_eq!(scheduler.reserve_slot("example.com", now, interval), Duration::ZERO);
        assert_eq!(scheduler.reserve_slot("example.com", now, interval), interval);
        assert_eq!(scheduler.reserve_slot("other.com", now, interval), Duration::ZERO);

        scheduler.set_crawl_delay("slow.com", Duration::from_secs(2));
        scheduler.reserve_slot("slow.com", now, interval);
        assert_eq!(
            scheduler.reserve_slot("slow.com", now, interval),
            Duration::from_secs(2)
        );
        assert_eq!(scheduler.request_count(), 5);
    }
}
