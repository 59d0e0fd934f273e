use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use rand::Rng;

/// The minimum election timeout, in milliseconds.
const ELECTION_TIMEOUT_MIN: u64 = 150;
/// The maximum election timeout, in milliseconds.
const ELECTION_TIMEOUT_MAX: u64 = 300;

/// A monotonic millisecond clock anchored at its creation.
#[derive(Clone)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    /// Milliseconds elapsed since the clock was created.
    pub fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Draws a randomized election timeout.
pub fn election_timeout() -> Duration {
    let ms = rand::thread_rng().gen_range(ELECTION_TIMEOUT_MIN..=ELECTION_TIMEOUT_MAX);
    Duration::from_millis(ms)
}

/// Tracks when this node last heard from the cluster.
///
/// Inbound AppendEntries, RequestVote, and local `/healthz` requests all
/// count as signs of life. The timestamp is a plain atomic; readers and
/// writers never need the election lock.
pub struct Pulse {
    clock: Clock,
    last: AtomicU64,
}

impl Pulse {
    pub fn new() -> Self {
        Self { clock: Clock::new(), last: AtomicU64::new(0) }
    }

    /// Records a sign of life at the current instant.
    pub fn touch(&self) {
        self.last.store(self.clock.now_ms(), Ordering::Relaxed);
    }

    /// The clock reading of the most recent sign of life.
    pub fn last_ms(&self) -> u64 {
        self.last.load(Ordering::Relaxed)
    }

    /// Milliseconds since the most recent sign of life.
    pub fn elapsed_ms(&self) -> u64 {
        self.clock.now_ms().saturating_sub(self.last_ms())
    }
}

impl Default for Pulse {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_within_bounds() {
        for _ in 0..100 {
            let timeout = election_timeout();
            assert!(timeout >= Duration::from_millis(ELECTION_TIMEOUT_MIN));
            assert!(timeout <= Duration::from_millis(ELECTION_TIMEOUT_MAX));
        }
    }

    #[test]
    fn clock_is_monotonic() {
        let clock = Clock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }

    #[test]
    fn pulse_touch_advances() {
        let pulse = Pulse::new();
        assert_eq!(pulse.last_ms(), 0);
        std::thread::sleep(Duration::from_millis(5));
        pulse.touch();
        let first = pulse.last_ms();
        std::thread::sleep(Duration::from_millis(5));
        pulse.touch();
        assert!(pulse.last_ms() >= first);
        assert!(pulse.elapsed_ms() < 1000);
    }
}
