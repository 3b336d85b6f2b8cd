// Snapshot persistence for both engines
// RON files on disk, JSON for embedding, structural validation on load

pub mod serialization;
pub mod types;

pub use serialization::{
    deserialize_from_json, deserialize_from_ron, load_from_path, save_to_path, serialize_to_json,
    serialize_to_ron,
};
pub use types::{DrumSnapshot, ProjectVersion, Snapshot, SnapshotMetadata, SongSnapshot};

use crate::sequencer::tempo::SUPPORTED_STEPS;
use std::collections::HashSet;

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("File system error: {0}")]
    FileSystemError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid snapshot structure: {0}")]
    InvalidStructure(String),

    #[error("Invalid snapshot format version")]
    InvalidVersion,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Check a snapshot for structural problems that clamping cannot repair
///
/// Out-of-range values (bpm, swing, volumes) and dangling references are
/// repaired on restore and are not reported here.
pub fn validate_snapshot(snapshot: &Snapshot) -> Result<(), ProjectError> {
    let drum = &snapshot.drum;

    if !drum.bpm.is_finite() || !snapshot.song.bpm.is_finite() {
        return Err(ProjectError::InvalidStructure(
            "Tempo must be a finite number".to_string(),
        ));
    }

    if !SUPPORTED_STEPS.contains(&drum.steps_per_pattern) {
        return Err(ProjectError::InvalidStructure(format!(
            "Steps per pattern must be one of {:?}, got {}",
            SUPPORTED_STEPS, drum.steps_per_pattern
        )));
    }

    let mut pattern_ids = HashSet::new();
    for pattern in &drum.patterns {
        if !pattern_ids.insert(pattern.id) {
            return Err(ProjectError::InvalidStructure(format!(
                "Duplicate pattern ID: {}",
                pattern.id
            )));
        }
        if pattern.name.trim().is_empty() {
            return Err(ProjectError::InvalidStructure(format!(
                "Pattern {} name cannot be empty",
                pattern.id
            )));
        }
    }

    let song = &snapshot.song;
    let mut progression_ids = HashSet::new();
    for progression in &song.progressions {
        if !progression_ids.insert(progression.id) {
            return Err(ProjectError::InvalidStructure(format!(
                "Duplicate progression ID: {}",
                progression.id
            )));
        }
    }

    let mut section_ids = HashSet::new();
    for section in &song.sections {
        if !section_ids.insert(section.id) {
            return Err(ProjectError::InvalidStructure(format!(
                "Duplicate section ID: {}",
                section.id
            )));
        }
        if section.name.trim().is_empty() {
            return Err(ProjectError::InvalidStructure(format!(
                "Section {} name cannot be empty",
                section.id
            )));
        }
    }

    Ok(())
}
