// Types for snapshot persistence

use crate::drum::DrumChannel;
use crate::drum::DrumInstrument;
use crate::harmony::chord::PitchClass;
use crate::harmony::progression::{Progression, ProgressionId};
use crate::sequencer::pattern::{Pattern, PatternId};
use crate::sequencer::timeline::Timeline;
use crate::song::arrangement::Arrangement;
use crate::song::section::{Section, SectionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot format version
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProjectVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ProjectVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn current() -> Self {
        Self::new(1, 1, 0)
    }

    /// Readable by this build: same major version, not newer than current
    pub fn is_supported(&self) -> bool {
        let current = Self::current();
        self.major == current.major && *self <= current
    }
}

impl std::fmt::Display for ProjectVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Snapshot metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotMetadata {
    /// Version of the snapshot format
    pub version: ProjectVersion,
    /// Time the snapshot was taken (RFC 3339)
    pub saved_at: DateTime<Utc>,
}

impl Default for SnapshotMetadata {
    fn default() -> Self {
        Self {
            version: ProjectVersion::current(),
            saved_at: Utc::now(),
        }
    }
}

/// Serializable drum machine state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrumSnapshot {
    pub bpm: f64,
    pub steps_per_pattern: u32,
    #[serde(default)]
    pub swing: f64,
    pub patterns: Vec<Pattern>,
    #[serde(default)]
    pub pattern_counter: PatternId,
    #[serde(default)]
    pub current_pattern: Option<PatternId>,
    #[serde(default)]
    pub timeline: Timeline,
    /// Mixer settings (v1.1+)
    #[serde(default)]
    pub channels: BTreeMap<DrumInstrument, DrumChannel>,
}

/// Serializable song arranger state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SongSnapshot {
    pub bpm: f64,
    pub root_key: PitchClass,
    pub progressions: Vec<Progression>,
    pub sections: Vec<Section>,
    #[serde(default)]
    pub arrangement: Arrangement,
    #[serde(default)]
    pub current_section: Option<SectionId>,
    #[serde(default)]
    pub progression_counter: ProgressionId,
    #[serde(default)]
    pub section_counter: SectionId,
}

/// Complete persisted state of both engines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub metadata: SnapshotMetadata,
    pub drum: DrumSnapshot,
    pub song: SongSnapshot,
}

impl Snapshot {
    /// Snapshot stamped with the current version and time
    pub fn new(drum: DrumSnapshot, song: SongSnapshot) -> Self {
        Self {
            metadata: SnapshotMetadata::default(),
            drum,
            song,
        }
    }
}
