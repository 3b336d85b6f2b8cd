// Integration tests for playback across both engines
// Drives the drum machine through the song arranger's bridge with independent clocks

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wavr_sequencer::clock::ManualClock;
use wavr_sequencer::config::EngineConfig;
use wavr_sequencer::drum::{DrumEngine, DrumInstrument};
use wavr_sequencer::engine::{CrossEngineBridge, Engine, SharedEngine};
use wavr_sequencer::sequencer::{PlayMode, TransportState};
use wavr_sequencer::song::{SongEngine, SongInstrument};
use wavr_sequencer::voice::{InstrumentId, RecordingVoice};

struct Studio {
    drum: SharedEngine<DrumEngine>,
    song: SharedEngine<SongEngine>,
    drum_clock: ManualClock,
    song_clock: ManualClock,
    wall: ManualClock,
    drum_voice: RecordingVoice,
    song_voice: RecordingVoice,
}

fn config() -> EngineConfig {
    EngineConfig {
        start_offset: 0.0,
        ..EngineConfig::default()
    }
}

/// Drum clock at 50 s, song clock at 5 s, wall clock at 1000 s
fn studio() -> Studio {
    let drum_clock = ManualClock::starting_at(50.0);
    let song_clock = ManualClock::starting_at(5.0);
    let wall = ManualClock::starting_at(1000.0);
    let drum_voice = RecordingVoice::new();
    let song_voice = RecordingVoice::new();

    let drum = SharedEngine::new(
        DrumEngine::new(
            config(),
            Arc::new(drum_clock.clone()),
            Arc::new(wall.clone()),
            Box::new(drum_voice.clone()),
        )
        .with_rng(StdRng::seed_from_u64(11)),
    );
    let bridge = CrossEngineBridge::new(Arc::new(drum.clone()), Arc::new(wall.clone()));
    let song = SharedEngine::new(
        SongEngine::new(
            config(),
            Arc::new(song_clock.clone()),
            Box::new(song_voice.clone()),
        )
        .with_bridge(bridge),
    );

    Studio {
        drum,
        song,
        drum_clock,
        song_clock,
        wall,
        drum_voice,
        song_voice,
    }
}

fn kick_onsets(voice: &RecordingVoice) -> Vec<f64> {
    voice
        .triggers_for(InstrumentId::Drum(DrumInstrument::Kick))
        .iter()
        .map(|t| t.start_time)
        .collect()
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "{:?} vs {:?}", actual, expected);
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-6, "{:?} vs {:?}", actual, expected);
    }
}

#[test]
fn test_section_drum_pattern_lands_on_drum_clock() {
    let studio = studio();
    let pattern = studio.drum.lock().state().current_pattern_id();
    studio
        .song
        .lock()
        .state_mut()
        .set_section_drum_pattern(1, Some(pattern))
        .unwrap();

    studio.song.lock().play(PlayMode::Pattern);
    studio.song.lock().tick();

    // Song bar at 5.0 on the song clock is 1000.0 on the wall, 50.0 on the drum clock
    assert_close(&kick_onsets(&studio.drum_voice), &[50.0, 50.5, 51.0, 51.5]);

    // All three clocks move 1.85 s; the next bar (7.0) enters the song horizon
    studio.song_clock.set(6.85);
    studio.wall.set(1001.85);
    studio.drum_clock.set(51.85);
    studio.song.lock().tick();

    assert_close(
        &kick_onsets(&studio.drum_voice),
        &[50.0, 50.5, 51.0, 51.5, 52.0, 52.5, 53.0, 53.5],
    );
    // The drum machine's own transport is untouched
    assert_eq!(studio.drum.transport(), TransportState::Stopped);
}

#[test]
fn test_bridged_bar_uses_song_tempo() {
    let studio = studio();
    {
        let mut song = studio.song.lock();
        song.state_mut().set_section_drum_pattern(1, Some(1)).unwrap();
        song.state_mut().set_bpm(60.0);
        song.play(PlayMode::Pattern);
        song.tick();
    }

    assert_close(&kick_onsets(&studio.drum_voice), &[50.0, 51.0, 52.0, 53.0]);
}

#[test]
fn test_missing_drum_pattern_only_skips_drums() {
    let studio = studio();
    {
        let mut song = studio.song.lock();
        song.state_mut().set_section_drum_pattern(1, Some(99)).unwrap();
        song.play(PlayMode::Pattern);
        song.tick();
    }

    assert!(studio.drum_voice.triggers().is_empty());
    assert_eq!(
        studio
            .song_voice
            .triggers_for(InstrumentId::Song(SongInstrument::Piano))
            .len(),
        1
    );
}

#[test]
fn test_song_lists_drum_patterns_through_bridge() {
    let studio = studio();
    studio.drum.lock().state_mut().create_pattern(Some("Fill"));

    let names: Vec<String> = studio
        .song
        .lock()
        .drum_patterns()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["Pattern 1", "Fill"]);
}

#[test]
fn test_late_bridged_bar_starts_now() {
    let studio = studio();
    studio.drum_clock.set(60.0);

    let scheduled = studio.drum.lock().schedule_pattern_bar(1, 995.0, 120.0);
    assert!(scheduled.is_ok());
    assert_close(&kick_onsets(&studio.drum_voice), &[60.0, 60.5, 61.0, 61.5]);
}

#[test]
fn test_song_stop_fades_pending_drum_bar() {
    let studio = studio();
    {
        let mut song = studio.song.lock();
        song.state_mut().set_section_drum_pattern(1, Some(1)).unwrap();
        song.play(PlayMode::Pattern);
        song.tick();
    }
    assert_eq!(kick_onsets(&studio.drum_voice).len(), 4);

    // Stop 100 ms into the bridged bar
    studio.song_clock.set(5.1);
    studio.wall.set(1000.1);
    studio.drum_clock.set(50.1);
    studio.song.stop();

    let releases = studio.drum_voice.releases();
    assert_eq!(releases.len(), 1);
    let (at, fade) = releases[0];
    assert!((at - 50.1).abs() < 1e-9);
    assert_eq!(fade, 0.03);
    assert_eq!(studio.song_voice.releases().len(), 1);
}

#[test]
fn test_song_stop_after_bridged_bar_leaves_drums_alone() {
    let studio = studio();
    {
        let mut song = studio.song.lock();
        song.state_mut().set_section_drum_pattern(1, Some(1)).unwrap();
        song.play(PlayMode::Pattern);
        song.tick();
    }

    studio.song_clock.set(7.5);
    studio.wall.set(1002.5);
    studio.drum_clock.set(52.5);
    studio.song.stop();

    assert!(studio.drum_voice.releases().is_empty());
    assert_eq!(studio.song_voice.releases().len(), 1);
}

#[test]
fn test_threaded_playback_start_and_stop() {
    let studio = studio();
    studio.drum.play(PlayMode::Pattern).unwrap();
    assert!(studio.drum.is_ticking());

    let deadline = Instant::now() + Duration::from_secs(5);
    while studio.drum_voice.triggers().is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }

    studio.drum.stop();
    assert!(!studio.drum.is_ticking());
    assert_eq!(studio.drum.transport(), TransportState::Stopped);
    assert_eq!(kick_onsets(&studio.drum_voice), vec![50.0]);
    assert_eq!(studio.drum_voice.releases().len(), 1);
}

#[test]
fn test_both_engines_tick_in_parallel() {
    let studio = studio();
    studio
        .song
        .lock()
        .state_mut()
        .set_section_drum_pattern(1, Some(1))
        .unwrap();

    studio.drum.play(PlayMode::Pattern).unwrap();
    studio.song.play(PlayMode::Timeline).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while studio.song_voice.triggers().is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }

    studio.song.stop();
    studio.drum.stop();
    assert!(!studio.song.is_ticking());
    assert!(!studio.drum.is_ticking());

    // Own playback at 50.0 plus the bridged bar at 50.0
    let kicks = kick_onsets(&studio.drum_voice);
    assert!(kicks.iter().all(|&t| t >= 50.0));
    assert!(kicks.len() >= 4);
}
