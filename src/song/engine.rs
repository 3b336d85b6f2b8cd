// Song engine - lookahead bar scheduler for the song arranger
// Resolves chords and note overlays per bar and bridges section drum patterns

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::engine::{CrossEngineBridge, Engine, LookaheadScheduler};
use crate::harmony::chord::Chord;
use crate::messaging::{EngineKind, PositionConsumer, PositionSink, PositionUpdate};
use crate::project::types::SongSnapshot;
use crate::sequencer::pattern::PatternSummary;
use crate::sequencer::tempo::{STEPS_PER_BAR, Tempo};
use crate::sequencer::transport::{PlayMode, PlaybackCursor, TransportAction, TransportState};
use crate::song::section::{InstrumentPart, SectionId};
use crate::song::state::SongState;
use crate::song::SongInstrument;
use crate::voice::{InstrumentId, Trigger, Voice};
use std::sync::Arc;
use std::time::Duration;

/// Bar-based song arranger
pub struct SongEngine {
    state: SongState,
    transport: TransportState,
    cursor: Option<PlaybackCursor>,
    scheduler: LookaheadScheduler,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    voice: Box<dyn Voice>,
    bridge: Option<CrossEngineBridge>,
    positions: PositionSink,
}

impl SongEngine {
    /// Create an engine with the default song and no drum bridge
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>, voice: Box<dyn Voice>) -> Self {
        Self {
            state: SongState::with_default_content(),
            transport: TransportState::Stopped,
            cursor: None,
            scheduler: LookaheadScheduler::new(config.song_horizon, config.gap_epsilon),
            config,
            clock,
            voice,
            bridge: None,
            positions: PositionSink::default(),
        }
    }

    pub fn with_state(mut self, state: SongState) -> Self {
        self.halt();
        self.state = state;
        self
    }

    /// Play section drum patterns through `bridge`
    pub fn with_bridge(mut self, bridge: CrossEngineBridge) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn set_bridge(&mut self, bridge: Option<CrossEngineBridge>) {
        self.bridge = bridge;
    }

    pub fn state(&self) -> &SongState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SongState {
        &mut self.state
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn cursor(&self) -> Option<&PlaybackCursor> {
        self.cursor.as_ref()
    }

    pub fn subscribe(&mut self) -> PositionConsumer {
        self.positions.subscribe(self.config.notification_capacity)
    }

    /// Patterns a section can be bound to (empty without a bridge)
    pub fn drum_patterns(&self) -> Vec<PatternSummary> {
        self.bridge
            .as_ref()
            .map(CrossEngineBridge::pattern_list)
            .unwrap_or_default()
    }

    pub fn restore(&mut self, snapshot: SongSnapshot) {
        self.stop();
        self.state = SongState::from_snapshot(snapshot);
    }

    pub fn snapshot(&self) -> SongSnapshot {
        self.state.snapshot()
    }

    fn start(&mut self, mode: PlayMode) {
        let start_time = self.clock.now() + self.config.start_offset;
        let cursor = match mode {
            PlayMode::Pattern => PlaybackCursor::new(start_time),
            PlayMode::Timeline => {
                let state = &self.state;
                let index = state
                    .arrangement()
                    .first_valid(|id| state.contains_section(id))
                    .unwrap_or_else(|| {
                        tracing::debug!("arrangement empty, playback idles");
                        0
                    });
                PlaybackCursor::at_arrangement(start_time, index)
            }
        };
        self.cursor = Some(cursor);
        self.transport = TransportState::playing(mode);
        self.scheduler.reset();
        tracing::debug!(?mode, start_time, "song transport started");
    }

    fn halt(&mut self) {
        if self.transport.is_playing() {
            let now = self.clock.now();
            self.voice.release_all(now, self.config.stop_fade);
            if let Some(bridge) = &self.bridge {
                bridge.release_pattern_bars(now, self.clock.as_ref());
            }
        }
        self.transport = TransportState::Stopped;
        self.cursor = None;
    }

    /// Section played at the cursor, if any
    fn section_at(&self, cursor: &PlaybackCursor) -> Option<SectionId> {
        match self.transport {
            TransportState::Stopped => None,
            TransportState::PlayingPattern => Some(self.state.current_section_id()),
            TransportState::PlayingTimeline => self.state.arrangement().get(cursor.arrangement_index),
        }
    }

    fn dispatch_bar(&mut self, cursor: &PlaybackCursor) {
        let Some(id) = self.section_at(cursor) else {
            return;
        };
        let Some(section) = self.state.section(id) else {
            tracing::debug!(section = id, "missing section treated as empty");
            return;
        };

        let tempo = self.state.tempo();
        let time = cursor.next_event_time;
        let chord = self
            .state
            .section_progression(id)
            .map(|progression| *progression.chord_at_bar(cursor.bar));

        for (instrument, part) in section.enabled_parts() {
            for trigger in part_triggers(instrument, part, chord.as_ref(), cursor.bar, time, &tempo) {
                self.voice.trigger(trigger);
            }
        }

        if let (Some(pattern), Some(bridge)) = (section.drum_pattern, self.bridge.as_ref()) {
            bridge.trigger_pattern_bar(pattern, time, self.clock.as_ref(), tempo.bpm());
        }

        let arrangement_index =
            (self.transport == TransportState::PlayingTimeline).then_some(cursor.arrangement_index);
        self.positions.publish(PositionUpdate::SongBar {
            section: id,
            bar: cursor.bar,
            arrangement_index,
            time,
        });
    }

    /// Move the cursor to the next bar; false when a non-looping arrangement ended
    fn advance(&mut self, cursor: &mut PlaybackCursor) -> bool {
        cursor.bar += 1;
        let bars = self
            .section_at(cursor)
            .map(|id| self.state.section_bars(id))
            .unwrap_or(4);
        if cursor.bar < bars {
            return true;
        }

        cursor.bar = 0;
        if self.transport != TransportState::PlayingTimeline {
            return true;
        }

        let state = &self.state;
        let arrangement = state.arrangement();
        match arrangement.next_valid_after(cursor.arrangement_index, |id| state.contains_section(id)) {
            Some((_, true)) if !arrangement.loop_enabled => false,
            Some((index, _)) => {
                cursor.arrangement_index = index;
                true
            }
            None => true,
        }
    }
}

impl Engine for SongEngine {
    fn name(&self) -> &'static str {
        "song"
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
            engine: EngineKind::Song,
        });
        tracing::debug!("song transport stopped");
    }

    fn tick(&mut self) {
        let Some(mut cursor) = self.cursor.take() else {
            return;
        };

        let now = self.clock.now();
        self.scheduler.recover(now, &mut cursor.next_event_time);

        while self.scheduler.is_due(now, cursor.next_event_time) {
            self.dispatch_bar(&cursor);
            cursor.next_event_time += self.state.tempo().bar_duration_seconds();

            if !self.advance(&mut cursor) {
                tracing::info!("arrangement finished");
                self.stop();
                return;
            }
        }

        self.cursor = Some(cursor);
    }
}

/// Triggers one instrument plays in a bar
///
/// An active note overlay replaces chord tones: notes starting inside the bar's
/// step window sound at their offset. Otherwise chord tones sound for the whole
/// bar, except the bass which plays the root then the fifth on beat 3.
fn part_triggers(
    instrument: SongInstrument,
    part: &InstrumentPart,
    chord: Option<&Chord>,
    bar: u32,
    bar_start: f64,
    tempo: &Tempo,
) -> Vec<Trigger> {
    let range = instrument.profile().range;
    let step = tempo.step_duration_seconds();
    let trigger = |pitches: Vec<u8>, start_time: f64, duration: f64, velocity: f32| Trigger {
        instrument: InstrumentId::Song(instrument),
        pitches,
        start_time,
        duration,
        velocity,
        variant: part.variant.clone(),
    };

    if let Some(notes) = part.active_notes() {
        let window_start = bar * STEPS_PER_BAR;
        return notes
            .notes_starting_in(window_start..window_start + STEPS_PER_BAR)
            .filter_map(|note| {
                let pitch = range.fold(note.pitch as i32)?;
                let offset = (note.start_step - window_start) as f64 * step;
                Some(trigger(
                    vec![pitch],
                    bar_start + offset,
                    note.duration_steps as f64 * step,
                    note.velocity * part.volume,
                ))
            })
            .collect();
    }

    let Some(chord) = chord else {
        return Vec::new();
    };
    let pitches = range.fold_all(&instrument.voicing(chord));
    let Some(&root) = pitches.first() else {
        return Vec::new();
    };

    match instrument {
        SongInstrument::Bass => {
            let half_bar = 2.0 * tempo.beat_duration_seconds();
            let mut triggers = vec![trigger(vec![root], bar_start, half_bar, part.volume)];
            if let Some(fifth) = range.fold(root as i32 + 7) {
                triggers.push(trigger(vec![fifth], bar_start + half_bar, half_bar, part.volume));
            }
            triggers
        }
        _ => vec![trigger(
            pitches,
            bar_start,
            tempo.bar_duration_seconds(),
            part.volume,
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::engine::PatternHost;
    use crate::sequencer::note::NoteEvent;
    use crate::sequencer::pattern::PatternId;
    use crate::voice::RecordingVoice;
    use ringbuf::traits::Consumer;
    use std::sync::Mutex;

    struct Rig {
        engine: SongEngine,
        clock: ManualClock,
        voice: RecordingVoice,
    }

    fn rig_with(state: SongState) -> Rig {
        let clock = ManualClock::new();
        let voice = RecordingVoice::new();
        let config = EngineConfig {
            start_offset: 0.0,
            ..EngineConfig::default()
        };
        let engine = SongEngine::new(config, Arc::new(clock.clone()), Box::new(voice.clone()))
            .with_state(state);
        Rig {
            engine,
            clock,
            voice,
        }
    }

    fn run(rig: &mut Rig, until: f64) {
        let mut t = rig.clock.now();
        while t <= until + 1e-9 {
            rig.clock.set(t);
            rig.engine.tick();
            t += 0.025;
        }
    }

    fn triggers(voice: &RecordingVoice, instrument: SongInstrument) -> Vec<Trigger> {
        voice.triggers_for(InstrumentId::Song(instrument))
    }

    fn onsets(voice: &RecordingVoice, instrument: SongInstrument) -> Vec<f64> {
        triggers(voice, instrument)
            .iter()
            .map(|t| t.start_time)
            .collect()
    }

    /// Two one-bar sections: "A" (Am) and "B" (F)
    fn two_short_sections() -> SongState {
        let mut state = SongState::new();
        let b = state.create_section(Some("B"));
        for id in [1, b] {
            for _ in 0..3 {
                state.remove_chord(id, 1).unwrap();
            }
        }
        state
            .set_chord_root(b, 0, crate::harmony::chord::PitchClass::F)
            .unwrap();
        state
            .set_chord_quality(b, 0, crate::harmony::chord::ChordQuality::Major)
            .unwrap();
        state
    }

    #[test]
    fn test_verse_chords_per_bar() {
        let mut rig = rig_with(SongState::with_default_content());
        rig.engine.play(PlayMode::Pattern);
        run(&mut rig, 5.7);

        let piano = triggers(&rig.voice, SongInstrument::Piano);
        let starts: Vec<f64> = piano.iter().map(|t| t.start_time).collect();
        assert_eq!(starts, vec![0.0, 2.0, 4.0]);
        assert_eq!(piano[0].pitches, vec![69, 72, 76]);
        assert_eq!(piano[1].pitches, vec![69, 72, 76]);
        assert_eq!(piano[2].pitches, vec![65, 69, 72]);
        assert_eq!(piano[0].duration, 2.0);
        assert_eq!(piano[0].velocity, 0.65);

        let pad = triggers(&rig.voice, SongInstrument::Pad);
        assert_eq!(pad[0].pitches, vec![57, 60, 64]);
        assert!(triggers(&rig.voice, SongInstrument::Guitar).is_empty());
    }

    #[test]
    fn test_bass_root_then_fifth() {
        let mut rig = rig_with(SongState::with_default_content());
        rig.engine.play(PlayMode::Pattern);
        run(&mut rig, 0.1);

        let bass = triggers(&rig.voice, SongInstrument::Bass);
        assert_eq!(bass.len(), 2);
        assert_eq!((bass[0].pitches.clone(), bass[0].start_time), (vec![45], 0.0));
        assert_eq!((bass[1].pitches.clone(), bass[1].start_time), (vec![52], 1.0));
        assert_eq!(bass[1].duration, 1.0);
    }

    #[test]
    fn test_horizon_is_200ms() {
        let mut rig = rig_with(SongState::with_default_content());
        rig.engine.play(PlayMode::Pattern);
        run(&mut rig, 1.775);
        assert_eq!(onsets(&rig.voice, SongInstrument::Piano), vec![0.0]);

        run(&mut rig, 1.825);
        assert_eq!(onsets(&rig.voice, SongInstrument::Piano), vec![0.0, 2.0]);
    }

    #[test]
    fn test_arrangement_walks_sections() {
        let mut state = two_short_sections();
        state.append_to_arrangement(1).unwrap();
        state.append_to_arrangement(2).unwrap();
        let mut rig = rig_with(state);
        let mut positions = rig.engine.subscribe();

        assert_eq!(rig.engine.play(PlayMode::Timeline), TransportAction::Start);
        run(&mut rig, 5.7);

        let mut sections = Vec::new();
        while let Some(update) = positions.try_pop() {
            if let PositionUpdate::SongBar {
                section,
                arrangement_index,
                ..
            } = update
            {
                sections.push((section, arrangement_index));
            }
        }
        assert_eq!(sections, vec![(1, Some(0)), (2, Some(1)), (1, Some(0))]);

        let piano = triggers(&rig.voice, SongInstrument::Piano);
        assert_eq!(piano[1].pitches, vec![65, 69, 72]);
    }

    #[test]
    fn test_arrangement_without_loop_stops() {
        let mut state = two_short_sections();
        state.append_to_arrangement(1).unwrap();
        state.append_to_arrangement(2).unwrap();
        state.set_arrangement_loop(false);
        let mut rig = rig_with(state);

        rig.engine.play(PlayMode::Timeline);
        run(&mut rig, 5.0);

        assert_eq!(rig.engine.transport(), TransportState::Stopped);
        assert_eq!(onsets(&rig.voice, SongInstrument::Piano), vec![0.0, 2.0]);
        assert_eq!(rig.voice.releases().len(), 1);
    }

    #[test]
    fn test_empty_arrangement_idles() {
        let mut rig = rig_with(SongState::new());
        rig.engine.play(PlayMode::Timeline);
        run(&mut rig, 3.0);

        assert!(rig.voice.triggers().is_empty());
        assert!(rig.engine.transport().is_playing());
    }

    #[test]
    fn test_note_overlay_replaces_chord_tones() {
        let mut state = SongState::new();
        state
            .add_note(1, SongInstrument::Piano, NoteEvent::new(64, 2, 4, 1.0))
            .unwrap();
        state
            .add_note(1, SongInstrument::Piano, NoteEvent::new(67, 18, 1, 0.5))
            .unwrap();
        let mut rig = rig_with(state);

        rig.engine.play(PlayMode::Pattern);
        run(&mut rig, 3.7);

        let piano = triggers(&rig.voice, SongInstrument::Piano);
        assert_eq!(piano.len(), 2);
        assert_eq!(piano[0].pitches, vec![64]);
        assert_eq!(piano[0].start_time, 0.25);
        assert_eq!(piano[0].duration, 0.5);
        assert_eq!(piano[1].pitches, vec![67]);
        assert_eq!(piano[1].start_time, 2.25);
        assert!((piano[1].velocity - 0.325).abs() < 1e-6);

        // Bass keeps playing chord tones
        assert_eq!(triggers(&rig.voice, SongInstrument::Bass).len(), 4);
    }

    #[test]
    fn test_bpm_change_applies_from_next_bar() {
        let mut rig = rig_with(SongState::with_default_content());
        rig.engine.play(PlayMode::Pattern);
        run(&mut rig, 0.1);

        rig.engine.state_mut().set_bpm(60.0);
        run(&mut rig, 6.5);
        assert_eq!(onsets(&rig.voice, SongInstrument::Piano), vec![0.0, 2.0, 6.0]);
    }

    #[test]
    fn test_mode_switch_restarts() {
        let mut rig = rig_with(SongState::with_default_content());
        assert_eq!(rig.engine.play(PlayMode::Pattern), TransportAction::Start);
        assert_eq!(rig.engine.play(PlayMode::Pattern), TransportAction::NoOp);
        assert_eq!(rig.engine.play(PlayMode::Timeline), TransportAction::Restart);
        assert_eq!(rig.engine.transport(), TransportState::PlayingTimeline);
        assert_eq!(rig.engine.cursor().unwrap().arrangement_index, 0);
    }

    #[derive(Default)]
    struct StubHost {
        calls: Mutex<Vec<(PatternId, f64, f64)>>,
        releases: Mutex<Vec<f64>>,
    }

    impl PatternHost for StubHost {
        fn schedule_pattern_bar(&self, pattern: PatternId, wall_time: f64, bpm: f64) -> bool {
            self.calls.lock().unwrap().push((pattern, wall_time, bpm));
            true
        }

        fn release_pattern_bars(&self, wall_time: f64) -> bool {
            self.releases.lock().unwrap().push(wall_time);
            true
        }

        fn pattern_list(&self) -> Vec<PatternSummary> {
            Vec::new()
        }
    }

    #[test]
    fn test_section_drum_pattern_bridged_each_bar() {
        let host = Arc::new(StubHost::default());
        let wall = ManualClock::starting_at(1000.0);
        let mut state = SongState::with_default_content();
        state.set_section_drum_pattern(1, Some(7)).unwrap();

        let mut rig = rig_with(state);
        rig.clock.set(10.0);
        rig.engine
            .set_bridge(Some(CrossEngineBridge::new(host.clone(), Arc::new(wall))));

        rig.engine.play(PlayMode::Pattern);
        run(&mut rig, 10.0);

        let calls = host.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![(7, 1000.0, 120.0)]);
    }

    #[test]
    fn test_stop_releases_bridged_bars() {
        let host = Arc::new(StubHost::default());
        let wall = ManualClock::starting_at(1000.0);
        let mut state = SongState::with_default_content();
        state.set_section_drum_pattern(1, Some(7)).unwrap();

        let mut rig = rig_with(state);
        rig.clock.set(10.0);
        rig.engine
            .set_bridge(Some(CrossEngineBridge::new(host.clone(), Arc::new(wall))));

        rig.engine.play(PlayMode::Pattern);
        run(&mut rig, 10.1);
        rig.engine.stop();

        let releases = host.releases.lock().unwrap().clone();
        assert_eq!(releases.len(), 1);
        // Released at the stop time, translated through the wall clock
        assert!((releases[0] - 1000.0).abs() < 1e-9);
    }
}
