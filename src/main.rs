// Wavr sequencer - command line player
// Runs the drum machine and the song arranger against real time, logging every trigger

use clap::{Parser, ValueEnum};
use ringbuf::traits::Consumer;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use wavr_sequencer::clock::{Clock, SystemClock, WallClock};
use wavr_sequencer::config::EngineConfig;
use wavr_sequencer::drum::DrumEngine;
use wavr_sequencer::engine::{CrossEngineBridge, SharedEngine};
use wavr_sequencer::project::{self, Snapshot};
use wavr_sequencer::sequencer::PlayMode;
use wavr_sequencer::song::SongEngine;
use wavr_sequencer::voice::TracingVoice;

#[derive(Parser)]
#[command(name = "wavr_sequencer")]
#[command(about = "Lookahead drum machine and song arranger", long_about = None)]
struct Cli {
    /// Tempo of both engines (clamped to 40-240)
    #[arg(short, long)]
    bpm: Option<f64>,

    /// How long to play, in seconds
    #[arg(short, long, default_value = "8.0")]
    seconds: f64,

    /// Engine timing configuration (RON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Snapshot to load before playing (RON)
    #[arg(short = 'p', long)]
    project: Option<PathBuf>,

    /// Write a snapshot of both engines here when done
    #[arg(long)]
    save: Option<PathBuf>,

    /// Which engine drives playback
    #[arg(short, long, value_enum, default_value = "song")]
    engine: EngineChoice,

    /// Walk the timeline / arrangement instead of looping the current pattern / section
    #[arg(short, long)]
    timeline: bool,

    /// Bind the current drum pattern to every song section without one
    #[arg(long)]
    bind_drums: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EngineChoice {
    Drum,
    Song,
    Both,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let wall_clock: Arc<dyn Clock> = Arc::new(WallClock);
    let drum = SharedEngine::new(DrumEngine::new(
        config.clone(),
        Arc::new(SystemClock::new()),
        wall_clock.clone(),
        Box::new(TracingVoice::new("drum")),
    ));
    let bridge = CrossEngineBridge::new(Arc::new(drum.clone()), wall_clock);
    let song = SharedEngine::new(
        SongEngine::new(
            config,
            Arc::new(SystemClock::new()),
            Box::new(TracingVoice::new("song")),
        )
        .with_bridge(bridge),
    );

    if let Some(path) = &cli.project {
        let snapshot = project::load_from_path(path)?;
        drum.lock().restore(snapshot.drum);
        song.lock().restore(snapshot.song);
    }

    let drum_ids: Vec<_> = drum.lock().pattern_list().iter().map(|p| p.id).collect();
    let cleared = song
        .lock()
        .state_mut()
        .clear_dangling_drum_patterns(|id| drum_ids.contains(&id));
    if cleared > 0 {
        warn!("Cleared {} section drum patterns missing from the drum machine", cleared);
    }

    if let Some(bpm) = cli.bpm {
        drum.lock().state_mut().set_bpm(bpm);
        song.lock().state_mut().set_bpm(bpm);
    }

    if cli.bind_drums {
        let pattern = drum.lock().state().current_pattern_id();
        let mut guard = song.lock();
        let state = guard.state_mut();
        let unbound: Vec<_> = state
            .sections()
            .filter(|s| s.drum_pattern.is_none())
            .map(|s| s.id)
            .collect();
        for id in unbound {
            state.set_section_drum_pattern(id, Some(pattern))?;
        }
    }

    let mut drum_positions = drum.lock().subscribe();
    let mut song_positions = song.lock().subscribe();

    let mode = if cli.timeline {
        PlayMode::Timeline
    } else {
        PlayMode::Pattern
    };
    if matches!(cli.engine, EngineChoice::Drum | EngineChoice::Both) {
        drum.play(mode)?;
    }
    if matches!(cli.engine, EngineChoice::Song | EngineChoice::Both) {
        song.play(mode)?;
    }
    info!("Playing for {} seconds ({} engine, {:?})", cli.seconds, engine_label(cli.engine), mode);

    std::thread::sleep(Duration::from_secs_f64(cli.seconds.max(0.0)));
    song.stop();
    drum.stop();

    let drum_updates = drum_positions.pop_iter().count();
    let song_updates = song_positions.pop_iter().count();
    info!(
        "Stopped: {} drum steps and {} song bars reported",
        drum_updates, song_updates
    );

    if let Some(path) = &cli.save {
        let snapshot = Snapshot::new(drum.lock().snapshot(), song.lock().snapshot());
        project::save_to_path(&snapshot, path)?;
    }

    Ok(())
}

fn engine_label(choice: EngineChoice) -> &'static str {
    match choice {
        EngineChoice::Drum => "drum",
        EngineChoice::Song => "song",
        EngineChoice::Both => "drum + song",
    }
}
