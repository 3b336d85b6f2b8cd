// Cross-engine bridge
// Lets one scheduler trigger a pattern owned by another engine with its own clock

use crate::clock::{Clock, translate};
use crate::sequencer::pattern::{PatternId, PatternSummary};
use std::fmt;
use std::sync::Arc;

/// An engine that owns patterns other engines may trigger
pub trait PatternHost: Send + Sync {
    /// Dispatch one bar of `pattern` starting at `wall_time` (wall clock), at `bpm`
    ///
    /// Returns false when the pattern does not exist; nothing is dispatched then.
    fn schedule_pattern_bar(&self, pattern: PatternId, wall_time: f64, bpm: f64) -> bool;

    /// Fade out bars scheduled through this host that are still pending at `wall_time`
    ///
    /// Returns false when nothing was left to release.
    fn release_pattern_bars(&self, wall_time: f64) -> bool;

    /// `{id, name}` of every pattern, for binding sections to patterns
    fn pattern_list(&self) -> Vec<PatternSummary>;
}

/// Time-translating link from a local engine to a foreign pattern host
///
/// The two engine clocks are never compared directly. A local time is turned
/// into a wall-clock time here, and the host turns it back into its own clock.
#[derive(Clone)]
pub struct CrossEngineBridge {
    host: Arc<dyn PatternHost>,
    wall_clock: Arc<dyn Clock>,
}

impl CrossEngineBridge {
    pub fn new(host: Arc<dyn PatternHost>, wall_clock: Arc<dyn Clock>) -> Self {
        Self { host, wall_clock }
    }

    /// Ask the host to play one bar of `pattern` at `local_time` on `local_clock`
    pub fn trigger_pattern_bar(
        &self,
        pattern: PatternId,
        local_time: f64,
        local_clock: &dyn Clock,
        bpm: f64,
    ) -> bool {
        let wall_time = translate(local_time, local_clock, self.wall_clock.as_ref());
        let scheduled = self.host.schedule_pattern_bar(pattern, wall_time, bpm);
        if scheduled {
            tracing::debug!(pattern, local_time, wall_time, bpm, "bridged pattern bar");
        } else {
            tracing::debug!(pattern, "bridged pattern missing, bar skipped");
        }
        scheduled
    }

    /// Release the host's pending bars from `local_time` on, e.g. when the local engine stops
    pub fn release_pattern_bars(&self, local_time: f64, local_clock: &dyn Clock) -> bool {
        let wall_time = translate(local_time, local_clock, self.wall_clock.as_ref());
        let released = self.host.release_pattern_bars(wall_time);
        if released {
            tracing::debug!(local_time, wall_time, "bridged bars released");
        }
        released
    }

    pub fn pattern_list(&self) -> Vec<PatternSummary> {
        self.host.pattern_list()
    }
}

impl fmt::Debug for CrossEngineBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossEngineBridge").finish_non_exhaustive()
    }
}
