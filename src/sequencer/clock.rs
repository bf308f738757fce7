/// Fixed-period step clock
use std::time::{Duration, Instant};

/// Deadlines fall on `start + n * period`, so a slow consumer never
/// shifts the grid of future ticks. Missed ticks stay due until taken.
#[derive(Debug, Clone)]
pub struct Clock {
    period: Duration,
    next: Instant,
    ticks: u64,
}

impl Clock {
    pub fn start(period: Duration, now: Instant) -> Self {
        Self {
            period,
            next: now + period,
            ticks: 0,
        }
    }

    /// When the next tick is due.
    pub fn deadline(&self) -> Instant {
        self.next
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next
    }

    /// Ticks taken so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Take the current tick and schedule the next one. Returns the
    /// zero-based index of the tick just taken.
    pub fn advance(&mut self) -> u64 {
        let index = self.ticks;
        self.ticks += 1;
        self.next += self.period;
        index
    }
}
