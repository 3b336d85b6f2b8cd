// Serialization utilities for snapshot persistence

use crate::project::types::Snapshot;
use crate::project::{ProjectError, validate_snapshot};
use ron::ser::PrettyConfig;
use std::fs;
use std::path::Path;

/// Serialize a snapshot to RON format
pub fn serialize_to_ron(snapshot: &Snapshot) -> Result<String, ProjectError> {
    ron::ser::to_string_pretty(snapshot, PrettyConfig::default()).map_err(|e| {
        ProjectError::SerializationError(format!("Failed to serialize to RON: {}", e))
    })
}

/// Deserialize a snapshot from RON format
pub fn deserialize_from_ron(ron_data: &str) -> Result<Snapshot, ProjectError> {
    Ok(ron::from_str(ron_data)?)
}

/// Serialize a snapshot to JSON (for embedding in other documents)
pub fn serialize_to_json(snapshot: &Snapshot) -> Result<String, ProjectError> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

pub fn deserialize_from_json(json_data: &str) -> Result<Snapshot, ProjectError> {
    Ok(serde_json::from_str(json_data)?)
}

/// Write a snapshot as RON to `path`
///
/// The file is written next to the target and renamed over it, so an
/// interrupted save never leaves a truncated snapshot behind.
pub fn save_to_path<P: AsRef<Path>>(snapshot: &Snapshot, path: P) -> Result<(), ProjectError> {
    let path = path.as_ref();
    validate_snapshot(snapshot)?;
    let content = serialize_to_ron(snapshot)?;

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| {
            ProjectError::FileSystemError(format!("Failed to create snapshot directory: {}", e))
        })?;
    }

    let temp_path = path.with_extension("ron.tmp");
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path).map_err(|e| {
        ProjectError::FileSystemError(format!("Failed to move snapshot into place: {}", e))
    })?;

    tracing::info!(path = %path.display(), "snapshot saved");
    Ok(())
}

/// Read, version-check and validate a RON snapshot
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Snapshot, ProjectError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        ProjectError::FileSystemError(format!(
            "Failed to read snapshot {}: {}",
            path.display(),
            e
        ))
    })?;

    let snapshot = deserialize_from_ron(&content)?;
    if !snapshot.metadata.version.is_supported() {
        tracing::error!(version = %snapshot.metadata.version, "unsupported snapshot version");
        return Err(ProjectError::InvalidVersion);
    }
    validate_snapshot(&snapshot)?;

    tracing::info!(path = %path.display(), version = %snapshot.metadata.version, "snapshot loaded");
    Ok(snapshot)
}
