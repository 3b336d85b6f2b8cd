// Drum engine - lookahead step scheduler for the drum machine
// Converts patterns and the timeline into absolute-time triggers

use crate::clock::{Clock, translate};
use crate::config::EngineConfig;
use crate::drum::state::DrumState;
use crate::engine::{Engine, LookaheadScheduler, PatternHost, SharedEngine};
use crate::error::{EngineError, EngineResult};
use crate::messaging::{EngineKind, PositionConsumer, PositionSink, PositionUpdate};
use crate::project::types::DrumSnapshot;
use crate::sequencer::pattern::{Pattern, PatternId, PatternSummary};
use crate::sequencer::tempo::{STEPS_PER_BAR, StepCount, Tempo};
use crate::sequencer::transport::{PlayMode, PlaybackCursor, TransportAction, TransportState};
use crate::voice::{InstrumentId, Trigger, Voice};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;

/// Step-sequenced drum machine
pub struct DrumEngine {
    state: DrumState,
    transport: TransportState,
    cursor: Option<PlaybackCursor>,
    scheduler: LookaheadScheduler,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    wall_clock: Arc<dyn Clock>,
    voice: Box<dyn Voice>,
    rng: StdRng,
    positions: PositionSink,
    /// End of the last bar dispatched through `schedule_pattern_bar` (own clock)
    bridged_until: Option<f64>,
}

impl DrumEngine {
    /// Create an engine with the default pattern
    ///
    /// `clock` is this engine's own time base; `wall_clock` is only used to
    /// translate times coming from other engines.
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        wall_clock: Arc<dyn Clock>,
        voice: Box<dyn Voice>,
    ) -> Self {
        Self {
            state: DrumState::with_default_content(),
            transport: TransportState::Stopped,
            cursor: None,
            scheduler: LookaheadScheduler::new(config.drum_horizon, config.gap_epsilon),
            config,
            clock,
            wall_clock,
            voice,
            rng: StdRng::from_entropy(),
            positions: PositionSink::default(),
            bridged_until: None,
        }
    }

    /// Replace the editable state (stops playback)
    pub fn with_state(mut self, state: DrumState) -> Self {
        self.halt();
        self.state = state;
        self
    }

    /// Use a deterministic random source for step probabilities
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn state(&self) -> &DrumState {
        &self.state
    }

    /// Mutable access for editing; edits affect only future occurrences
    pub fn state_mut(&mut self) -> &mut DrumState {
        &mut self.state
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn cursor(&self) -> Option<&PlaybackCursor> {
        self.cursor.as_ref()
    }

    /// Receive position updates; replaces any previous subscriber
    pub fn subscribe(&mut self) -> PositionConsumer {
        self.positions.subscribe(self.config.notification_capacity)
    }

    /// `{id, name}` of every pattern
    pub fn pattern_list(&self) -> Vec<PatternSummary> {
        self.state.pattern_list()
    }

    /// Change the step count of every pattern
    ///
    /// While playing this is a hard stop, resize and restart in the same mode.
    pub fn set_steps_per_pattern(&mut self, steps: u32) -> EngineResult<()> {
        let steps = StepCount::new(steps)?;
        if steps == self.state.steps() {
            return Ok(());
        }

        let resume = self.transport.mode();
        if resume.is_some() {
            self.halt();
        }
        self.state.set_steps(steps);
        tracing::info!(steps = steps.get(), "steps per pattern changed");
        if let Some(mode) = resume {
            self.start(mode);
        }
        Ok(())
    }

    /// Dispatch one bar (16 steps) of `pattern` right away, at `wall_time` and `bpm`
    ///
    /// Used by other engines through the bridge. Longer patterns contribute
    /// their first bar. The engine's own transport is not affected.
    pub fn schedule_pattern_bar(
        &mut self,
        pattern_id: PatternId,
        wall_time: f64,
        bpm: f64,
    ) -> EngineResult<()> {
        let pattern = self
            .state
            .pattern(pattern_id)
            .ok_or(EngineError::UnknownPattern(pattern_id))?;

        let now = self.clock.now();
        let mut time = translate(wall_time, self.wall_clock.as_ref(), self.clock.as_ref());
        if time < now {
            tracing::debug!(late_by = now - time, "bridged bar late, starting now");
            time = now;
        }

        let tempo = Tempo::new(bpm);
        let swing = self.state.swing();
        for i in 0..STEPS_PER_BAR {
            for trigger in step_triggers(&self.state, pattern, i, time, &tempo, &mut self.rng) {
                self.voice.trigger(trigger);
            }
            time += swing.step_duration(&tempo, i);
        }
        self.bridged_until = Some(self.bridged_until.map_or(time, |until| until.max(time)));
        Ok(())
    }

    /// Fade out bridged bars still pending at `wall_time`
    ///
    /// Called when the engine that scheduled them stops. Returns false when
    /// every bridged bar already finished, in which case the voice is left alone.
    pub fn release_bridged_bars(&mut self, wall_time: f64) -> bool {
        let Some(until) = self.bridged_until.take() else {
            return false;
        };

        let at = translate(wall_time, self.wall_clock.as_ref(), self.clock.as_ref())
            .max(self.clock.now());
        if until <= at {
            return false;
        }
        self.voice.release_all(at, self.config.stop_fade);
        tracing::debug!(at, until, "bridged bars released");
        true
    }

    /// Stop playback and replace the state from a snapshot
    pub fn restore(&mut self, snapshot: DrumSnapshot) {
        self.stop();
        self.state = DrumState::from_snapshot(snapshot);
    }

    pub fn snapshot(&self) -> DrumSnapshot {
        self.state.snapshot()
    }

    fn start(&mut self, mode: PlayMode) {
        let start_time = self.clock.now() + self.config.start_offset;
        let cursor = match mode {
            PlayMode::Pattern => PlaybackCursor::new(start_time),
            PlayMode::Timeline => {
                let slot = self.state.timeline().first_filled().unwrap_or_else(|| {
                    tracing::debug!("timeline empty, playback idles");
                    0
                });
                PlaybackCursor::at_slot(start_time, slot)
            }
        };
        self.cursor = Some(cursor);
        self.transport = TransportState::playing(mode);
        self.scheduler.reset();
        tracing::debug!(?mode, start_time, "drum transport started");
    }

    /// Stop without notifying observers
    fn halt(&mut self) {
        if self.transport.is_playing() {
            self.voice
                .release_all(self.clock.now(), self.config.stop_fade);
            self.bridged_until = None;
        }
        self.transport = TransportState::Stopped;
        self.cursor = None;
    }

    /// Pattern played at the cursor, if any
    fn pattern_at(&self, cursor: &PlaybackCursor) -> Option<PatternId> {
        match self.transport {
            TransportState::Stopped => None,
            TransportState::PlayingPattern => Some(self.state.current_pattern_id()),
            TransportState::PlayingTimeline => self.state.timeline().slot(cursor.slot),
        }
    }

    fn dispatch_step(&mut self, cursor: &PlaybackCursor) {
        let Some(id) = self.pattern_at(cursor) else {
            return;
        };
        let Some(pattern) = self.state.pattern(id) else {
            tracing::debug!(pattern = id, "missing pattern treated as empty slot");
            return;
        };

        let tempo = self.state.tempo();
        let time = cursor.next_event_time;
        for trigger in step_triggers(&self.state, pattern, cursor.step, time, &tempo, &mut self.rng) {
            self.voice.trigger(trigger);
        }

        let slot = (self.transport == TransportState::PlayingTimeline).then_some(cursor.slot);
        self.positions.publish(PositionUpdate::DrumStep {
            pattern: id,
            step: cursor.step,
            slot,
            time,
        });
    }

    /// Move the cursor to the next step; false when a non-looping timeline ended
    fn advance(&mut self, cursor: &mut PlaybackCursor) -> bool {
        cursor.step += 1;
        if cursor.step < self.state.steps().get() {
            return true;
        }

        cursor.step = 0;
        cursor.bar += 1;
        if self.transport != TransportState::PlayingTimeline {
            return true;
        }

        let timeline = self.state.timeline();
        match timeline.next_filled_after(cursor.slot) {
            Some((_, true)) if !timeline.loop_enabled => false,
            Some((slot, _)) => {
                cursor.slot = slot;
                true
            }
            None => true,
        }
    }
}

impl Engine for DrumEngine {
    fn name(&self) -> &'static str {
        "drum"
    }

    fn tick_interval(&self) -> Duration {
        self.config.tick_interval()
    }

    fn transport(&self) -> TransportState {
        self.transport
    }

    fn play(&mut self, mode: PlayMode) -> TransportAction {
        let action = self.transport.transition(mode);
        match action {
            TransportAction::NoOp => {}
            TransportAction::Start => self.start(mode),
            TransportAction::Restart => {
                self.halt();
                self.start(mode);
            }
        }
        action
    }

    fn stop(&mut self) {
        if !self.transport.is_playing() {
            return;
        }
        self.halt();
        self.positions.publish(PositionUpdate::Stopped {
            engine: EngineKind::Drum,
        });
        tracing::debug!("drum transport stopped");
    }

    fn tick(&mut self) {
        let Some(mut cursor) = self.cursor.take() else {
            return;
        };

        let now = self.clock.now();
        self.scheduler.recover(now, &mut cursor.next_event_time);

        while self.scheduler.is_due(now, cursor.next_event_time) {
            self.dispatch_step(&cursor);
            cursor.next_event_time += self
                .state
                .swing()
                .step_duration(&self.state.tempo(), cursor.step);

            if !self.advance(&mut cursor) {
                tracing::info!("timeline finished");
                self.stop();
                return;
            }
        }

        self.cursor = Some(cursor);
    }
}

/// Triggers for every active, unmuted, winning step at `index`
fn step_triggers(
    state: &DrumState,
    pattern: &Pattern,
    index: u32,
    time: f64,
    tempo: &Tempo,
    rng: &mut StdRng,
) -> Vec<Trigger> {
    pattern
        .hits_at(index)
        .filter(|(instrument, _)| !state.is_muted(*instrument))
        .filter(|(_, step)| step.should_fire(rng))
        .map(|(instrument, step)| Trigger {
            instrument: InstrumentId::Drum(instrument),
            pitches: Vec::new(),
            start_time: time,
            duration: step.duration() as f64 * tempo.step_duration_seconds(),
            velocity: step.velocity() * state.channel(instrument).volume,
            variant: step.is_ghost().then(|| "ghost".to_string()),
        })
        .collect()
}

impl PatternHost for SharedEngine<DrumEngine> {
    fn schedule_pattern_bar(&self, pattern: PatternId, wall_time: f64, bpm: f64) -> bool {
        self.lock()
            .schedule_pattern_bar(pattern, wall_time, bpm)
            .is_ok()
    }

    fn release_pattern_bars(&self, wall_time: f64) -> bool {
        self.lock().release_bridged_bars(wall_time)
    }

    fn pattern_list(&self) -> Vec<PatternSummary> {
        self.lock().pattern_list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::drum::DrumInstrument;
    use crate::sequencer::pattern::Probability;
    use crate::voice::RecordingVoice;
    use ringbuf::traits::Consumer;

    struct Rig {
        engine: DrumEngine,
        clock: ManualClock,
        voice: RecordingVoice,
    }

    fn rig() -> Rig {
        let clock = ManualClock::new();
        let voice = RecordingVoice::new();
        let config = EngineConfig {
            start_offset: 0.0,
            ..EngineConfig::default()
        };
        let engine = DrumEngine::new(
            config,
            Arc::new(clock.clone()),
            Arc::new(ManualClock::new()),
            Box::new(voice.clone()),
        )
        .with_rng(StdRng::seed_from_u64(3));
        Rig {
            engine,
            clock,
            voice,
        }
    }

    /// Tick every 25 ms until `until` (inclusive)
    fn run(rig: &mut Rig, until: f64) {
        let mut t = rig.clock.now();
        while t <= until + 1e-9 {
            rig.clock.set(t);
            rig.engine.tick();
            t += 0.025;
        }
    }

    fn onsets(voice: &RecordingVoice, instrument: DrumInstrument) -> Vec<f64> {
        voice
            .triggers_for(InstrumentId::Drum(instrument))
            .iter()
            .map(|t| t.start_time)
            .collect()
    }

    fn assert_times(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{:?} vs {:?}", actual, expected);
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{:?} vs {:?}", actual, expected);
        }
    }

    #[test]
    fn test_kick_onsets_at_120_bpm() {
        let mut rig = rig();
        assert_eq!(rig.engine.play(PlayMode::Pattern), TransportAction::Start);
        run(&mut rig, 1.8);

        assert_times(
            &onsets(&rig.voice, DrumInstrument::Kick),
            &[0.0, 0.5, 1.0, 1.5],
        );
    }

    #[test]
    fn test_dispatch_never_past_horizon() {
        let mut rig = rig();
        rig.engine.play(PlayMode::Pattern);
        run(&mut rig, 0.3);

        let now = rig.clock.now();
        assert!(rig.voice.triggers().iter().all(|t| t.start_time < now + 0.1));
        assert!(rig.engine.cursor().unwrap().next_event_time >= now + 0.1);
    }

    #[test]
    fn test_velocity_scaled_by_volume_and_mute() {
        let mut rig = rig();
        rig.engine.state_mut().set_volume(DrumInstrument::Kick, 0.5);
        rig.engine.state_mut().set_muted(DrumInstrument::HiHat, true);
        rig.engine.play(PlayMode::Pattern);
        run(&mut rig, 0.0);

        let kicks = rig.voice.triggers_for(InstrumentId::Drum(DrumInstrument::Kick));
        assert_eq!(kicks[0].velocity, 0.5);
        assert!(onsets(&rig.voice, DrumInstrument::HiHat).is_empty());
    }

    #[test]
    fn test_ghost_variant() {
        let mut rig = rig();
        rig.engine
            .state_mut()
            .set_step_velocity(1, DrumInstrument::Kick, 0, 0.3)
            .unwrap();
        rig.engine.play(PlayMode::Pattern);
        run(&mut rig, 0.0);

        let kick = &rig.voice.triggers_for(InstrumentId::Drum(DrumInstrument::Kick))[0];
        assert_eq!(kick.variant.as_deref(), Some("ghost"));
    }

    #[test]
    fn test_swing_moves_odd_steps() {
        let mut rig = rig();
        let state = rig.engine.state_mut();
        state.set_swing(0.2);
        state.toggle_step(1, DrumInstrument::Clap, 1).unwrap();
        rig.engine.play(PlayMode::Pattern);
        run(&mut rig, 0.2);

        assert_times(&onsets(&rig.voice, DrumInstrument::Clap), &[0.15]);
    }

    #[test]
    fn test_swung_loop_length_matches_tempo() {
        let mut rig = rig();
        let state = rig.engine.state_mut();
        state.set_swing(0.2);
        state.clear_pattern(1).unwrap();
        state.toggle_step(1, DrumInstrument::Kick, 0).unwrap();
        rig.engine.play(PlayMode::Pattern);
        run(&mut rig, 6.0);

        assert_times(
            &onsets(&rig.voice, DrumInstrument::Kick),
            &[0.0, 2.0, 4.0, 6.0],
        );
    }

    #[test]
    fn test_timeline_skips_empty_slots_and_wraps() {
        let mut rig = rig();
        let a = rig.engine.state().current_pattern_id();
        let b = rig.engine.state_mut().create_pattern(Some("B"));
        rig.engine
            .state_mut()
            .toggle_step(b, DrumInstrument::Cowbell, 0)
            .unwrap();
        rig.engine.state_mut().set_timeline_slot(1, Some(a)).unwrap();
        rig.engine.state_mut().set_timeline_slot(3, Some(b)).unwrap();
        let mut positions = rig.engine.subscribe();

        rig.engine.play(PlayMode::Timeline);
        // Three bars of 2 s: A, B, A
        run(&mut rig, 5.8);

        let mut bar_patterns = Vec::new();
        while let Some(update) = positions.try_pop() {
            if let PositionUpdate::DrumStep {
                pattern, step: 0, slot, ..
            } = update
            {
                bar_patterns.push((pattern, slot));
            }
        }
        assert_eq!(
            bar_patterns,
            vec![(a, Some(1)), (b, Some(3)), (a, Some(1))]
        );
        assert_times(&onsets(&rig.voice, DrumInstrument::Cowbell), &[2.0]);
    }

    #[test]
    fn test_timeline_without_loop_stops() {
        let mut rig = rig();
        let a = rig.engine.state().current_pattern_id();
        rig.engine.state_mut().set_timeline_slot(0, Some(a)).unwrap();
        rig.engine.state_mut().set_timeline_loop(false);

        rig.engine.play(PlayMode::Timeline);
        run(&mut rig, 3.0);

        assert_eq!(rig.engine.transport(), TransportState::Stopped);
        assert_eq!(onsets(&rig.voice, DrumInstrument::Kick).len(), 4);
        assert_eq!(rig.voice.releases().len(), 1);
    }

    #[test]
    fn test_resize_while_playing_restarts() {
        let mut rig = rig();
        rig.engine.play(PlayMode::Pattern);
        run(&mut rig, 0.5);

        rig.engine.set_steps_per_pattern(32).unwrap();
        assert_eq!(rig.engine.transport(), TransportState::PlayingPattern);
        let cursor = rig.engine.cursor().unwrap();
        assert_eq!(cursor.step, 0);
        assert!((cursor.next_event_time - rig.clock.now()).abs() < 1e-9);

        let pattern = rig.engine.state().current_pattern().unwrap();
        assert_eq!(pattern.steps_per_pattern(), 32);
        assert_eq!(pattern.active_steps(DrumInstrument::Kick), vec![0, 4, 8, 12]);
        assert!(rig.engine.set_steps_per_pattern(3).is_err());
        assert!(rig.engine.set_steps_per_pattern(15).is_err());
        assert_eq!(rig.engine.state().steps().get(), 32);
    }

    #[test]
    fn test_same_mode_noop_other_mode_restart() {
        let mut rig = rig();
        rig.engine.play(PlayMode::Pattern);
        assert_eq!(rig.engine.play(PlayMode::Pattern), TransportAction::NoOp);
        assert_eq!(rig.engine.play(PlayMode::Timeline), TransportAction::Restart);
        assert_eq!(rig.engine.transport(), TransportState::PlayingTimeline);
    }

    #[test]
    fn test_stall_recovers_without_burst() {
        let mut rig = rig();
        rig.engine.play(PlayMode::Pattern);
        run(&mut rig, 0.1);
        let before = rig.voice.triggers().len();

        rig.clock.set(10.0);
        rig.engine.tick();

        let after = rig.voice.triggers();
        let new_triggers = &after[before..];
        assert!(!new_triggers.is_empty());
        assert!(new_triggers.iter().all(|t| t.start_time >= 10.0));
        assert!(new_triggers.iter().all(|t| t.start_time < 10.1));
    }

    #[test]
    fn test_stop_releases_and_clears_cursor() {
        let mut rig = rig();
        let mut positions = rig.engine.subscribe();
        rig.engine.play(PlayMode::Pattern);
        rig.engine.stop();

        assert!(rig.engine.cursor().is_none());
        assert_eq!(rig.voice.releases(), vec![(0.0, 0.03)]);
        assert_eq!(
            positions.try_pop(),
            Some(PositionUpdate::Stopped {
                engine: EngineKind::Drum
            })
        );

        rig.engine.stop();
        assert_eq!(rig.voice.releases().len(), 1);
    }

    #[test]
    fn test_low_probability_fires_sometimes() {
        let mut rig = rig();
        for step in 0..16 {
            rig.engine
                .state_mut()
                .set_step_probability(1, DrumInstrument::HiHat, step, Probability::P50)
                .unwrap();
        }
        rig.engine.play(PlayMode::Pattern);
        run(&mut rig, 39.8);

        // 20 loops x 8 hats at 50%
        let fired = onsets(&rig.voice, DrumInstrument::HiHat).len();
        assert!((50..=110).contains(&fired), "fired {}", fired);
    }

    #[test]
    fn test_schedule_pattern_bar_reanchors_wall_time() {
        let drum_clock = ManualClock::starting_at(100.0);
        let wall = ManualClock::starting_at(1000.0);
        let voice = RecordingVoice::new();
        let mut engine = DrumEngine::new(
            EngineConfig::default(),
            Arc::new(drum_clock),
            Arc::new(wall),
            Box::new(voice.clone()),
        );

        engine.schedule_pattern_bar(1, 1000.05, 60.0).unwrap();

        assert_times(
            &onsets(&voice, DrumInstrument::Kick),
            &[100.05, 101.05, 102.05, 103.05],
        );
        assert_eq!(engine.transport(), TransportState::Stopped);
        assert!(engine.schedule_pattern_bar(9, 1000.0, 60.0).is_err());
    }

    #[test]
    fn test_release_bridged_bars_only_while_pending() {
        let voice = RecordingVoice::new();
        let clock = ManualClock::starting_at(50.0);
        let mut engine = DrumEngine::new(
            EngineConfig::default(),
            Arc::new(clock.clone()),
            Arc::new(ManualClock::starting_at(1000.0)),
            Box::new(voice.clone()),
        );

        assert!(!engine.release_bridged_bars(1000.0));

        engine.schedule_pattern_bar(1, 1000.0, 120.0).unwrap();
        clock.set(50.1);
        assert!(engine.release_bridged_bars(1000.1));
        assert_eq!(voice.releases().len(), 1);
        let (at, fade) = voice.releases()[0];
        assert!((at - 50.1).abs() < 1e-9);
        assert_eq!(fade, 0.03);

        // Already released
        assert!(!engine.release_bridged_bars(1000.2));

        // A bar that has finished playing needs no fade
        engine.schedule_pattern_bar(1, 1000.2, 120.0).unwrap();
        clock.set(53.0);
        assert!(!engine.release_bridged_bars(1003.0));
        assert_eq!(voice.releases().len(), 1);
    }

    #[test]
    fn test_schedule_pattern_bar_plays_first_bar_and_clamps_late() {
        let voice = RecordingVoice::new();
        let mut engine = DrumEngine::new(
            EngineConfig::default(),
            Arc::new(ManualClock::starting_at(50.0)),
            Arc::new(ManualClock::starting_at(1000.0)),
            Box::new(voice.clone()),
        );
        engine.set_steps_per_pattern(32).unwrap();
        let current = engine.state().current_pattern_id();
        engine
            .state_mut()
            .toggle_step(current, DrumInstrument::Kick, 20)
            .unwrap();

        engine.schedule_pattern_bar(1, 999.0, 120.0).unwrap();

        assert_times(
            &onsets(&voice, DrumInstrument::Kick),
            &[50.0, 50.5, 51.0, 51.5],
        );
    }
}
