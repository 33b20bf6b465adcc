use std::time::{Duration, Instant};

/// Tracks the politeness state of one host during an audit
///
/// Requests to a host are spaced at least `interval` apart no matter how
/// many workers are running. Workers reserve the next free slot under the
/// crawl lock and sleep outside it.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Number of requests made to this host in the current audit
    pub request_count: u32,

    /// Start time of the most recently reserved request slot
    pub next_slot: Option<Instant>,

    /// Crawl-delay advertised by the host's robots.txt
    pub crawl_delay: Option<Duration>,

    /// Whether the host answered HTTP 429 during this audit
    pub rate_limited: bool,
}

impl HostState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The effective spacing between requests: the configured interval or
    /// the robots.txt crawl-delay, whichever is longer
    pub fn effective_interval(&self, configured: Duration) -> Duration {
        let base = match self.crawl_delay {
            Some(delay) => configured.max(delay),
            None => configured,
        };
        // Back off harder once the host has told us to slow down
        if self.rate_limited {
            base * 2
        } else {
            base
        }
    }

    /// Reserves the next request slot and returns how long to wait for it
    ///
    /// The first request goes out immediately. Each later reservation is
    /// placed one interval after the previous slot, or at `now` if that is
    /// later.
    pub fn reserve_slot(&mut self, now: Instant, configured: Duration) -> Duration {
        let interval = self.effective_interval(configured);
        let slot = match self.next_slot {
            Some(previous) => (previous + interval).max(now),
            None => now,
        };
        self.next_slot = Some(slot);
        self.request_count += 1;
        slot.saturating_duration_since(now)
    }

    /// Marks this host as rate limited (HTTP 429)
    pub fn mark_rate_limited(&mut self) {
        self.rate_limited = true;
    }
}
