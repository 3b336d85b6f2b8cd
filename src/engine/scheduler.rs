// Lookahead scheduler
// Decides which events are due inside the horizon and repairs scheduling gaps

/// Lookahead window and gap recovery for one engine
///
/// The scheduler never dispatches itself: the owning engine asks `is_due` in a
/// loop, dispatching at the cursor's absolute time and advancing it, until the
/// cursor leaves the window. Because dispatch times are absolute, jitter of the
/// tick timer never shows up in the audio.
#[derive(Debug, Clone)]
pub struct LookaheadScheduler {
    horizon: f64,
    gap_epsilon: f64,
    last_now: Option<f64>,
    recoveries: u64,
}

impl LookaheadScheduler {
    pub fn new(horizon: f64, gap_epsilon: f64) -> Self {
        Self {
            horizon,
            gap_epsilon,
            last_now: None,
            recoveries: 0,
        }
    }

    /// Lookahead window in seconds
    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    /// True while an event at `next_event_time` falls inside the window
    pub fn is_due(&self, now: f64, next_event_time: f64) -> bool {
        next_event_time < now + self.horizon
    }

    /// Clamp the cursor after a stall or a clock going backwards
    ///
    /// If the loop stalled long enough for the cursor to fall behind `now`, or
    /// the clock moved backwards since the previous tick, the cursor jumps to
    /// `now + gap_epsilon`. Missed events are skipped, never replayed as a burst.
    /// Returns true when the cursor was moved.
    pub fn recover(&mut self, now: f64, next_event_time: &mut f64) -> bool {
        let went_backwards = self.last_now.is_some_and(|last| now < last);
        self.last_now = Some(now);

        if !went_backwards && *next_event_time >= now {
            return false;
        }

        let clamped = now + self.gap_epsilon;
        tracing::warn!(
            now,
            behind = now - *next_event_time,
            went_backwards,
            clamped,
            "scheduling gap, cursor clamped"
        );
        *next_event_time = clamped;
        self.recoveries += 1;
        true
    }

    /// Forget the previous tick (called when the transport starts)
    pub fn reset(&mut self) {
        self.last_now = None;
    }

    /// How many times the cursor was clamped since creation
    pub fn recoveries(&self) -> u64 {
        self.recoveries
    }
}
