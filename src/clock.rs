// Clock sources for the schedulers
// Every engine owns its own monotonic time base; a shared wall clock links engines together

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Monotonic time source, in seconds
pub trait Clock: Send + Sync {
    /// Current time in seconds on this clock's own timeline
    fn now(&self) -> f64;
}

/// Engine clock backed by `Instant`, starting at 0.0 when created
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Wall clock shared between engines (seconds since the Unix epoch)
///
/// Two engine clocks are never comparable directly; both are comparable to this one.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl Clock for WallClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }
}

/// Manually driven clock with microsecond resolution
///
/// Clones share the same underlying position, so a test can hold one handle and
/// give another to an engine.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock already positioned at `seconds`
    pub fn starting_at(seconds: f64) -> Self {
        let clock = Self::new();
        clock.set(seconds);
        clock
    }

    /// Jump to an absolute position (may move backwards)
    pub fn set(&self, seconds: f64) {
        self.micros
            .store(seconds_to_micros(seconds), Ordering::Relaxed);
    }

    /// Move forward by `seconds`
    pub fn advance(&self, seconds: f64) {
        self.micros
            .fetch_add(seconds_to_micros(seconds), Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }
}

fn seconds_to_micros(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1_000_000.0).round() as u64
}

/// Translate a time on `from` into the equivalent time on `to`, as seen right now
///
/// Both clocks are sampled back to back, so the result is accurate to the
/// sampling jitter between the two reads.
pub fn translate(time: f64, from: &dyn Clock, to: &dyn Clock) -> f64 {
    to.now() + (time - from.now())
}
