//! File-backed session state persistence.
//!
//! The state file holds a single [`SessionState`] snapshot and is replaced
//! wholesale on every save.
//!
//! # Defensive Design
//!
//! The previous process may have been killed at any point, so loading handles:
//! - Missing file (fresh install → default state)
//! - Empty file (default state)
//! - Corrupt JSON or a field that fails numeric coercion (default state, logged)
//!
//! # Atomic Writes
//!
//! Uses temp file + rename so a crash mid-save leaves the old snapshot intact.

use fs_err as fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, error};

use crate::error::{Result, TrackerError};

use super::types::SessionState;

pub struct StateStore {
    file_path: PathBuf,
}

impl StateStore {
    pub fn new(file_path: &Path) -> Self {
        StateStore {
            file_path: file_path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Loads the snapshot, falling back to `{running: false}` on any problem.
    pub fn load(&self) -> SessionState {
        match self.try_load() {
            Ok(state) => state,
            Err(err) => {
                error!(error = %err, "Error loading state file, starting from a clean state");
                SessionState::default()
            }
        }
    }

    /// Strict variant of [`StateStore::load`] that reports corruption.
    pub fn try_load(&self) -> Result<SessionState> {
        let content = match fs::read_to_string(&self.file_path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.file_path.display(), "No state file yet");
                return Ok(SessionState::default());
            }
            Err(err) => return Err(TrackerError::io("Failed to read state file", err)),
        };

        if content.trim().is_empty() {
            return Ok(SessionState::default());
        }

        serde_json::from_str::<SessionState>(&content).map_err(|err| TrackerError::CorruptState {
            path: self.file_path.clone(),
            details: err.to_string(),
        })
    }

    pub fn save(&self, state: &SessionState) -> Result<()> {
        let write_failed = |details: String| TrackerError::StateWriteFailed {
            path: self.file_path.clone(),
            details,
        };

        let content = serde_json::to_string(state).map_err(|err| TrackerError::Json {
            context: "Failed to serialize session state".to_string(),
            source: err,
        })?;

        let parent_dir = self
            .file_path
            .parent()
            .ok_or_else(|| write_failed("State file path has no parent directory".to_string()))?;
        fs::create_dir_all(parent_dir)
            .map_err(|err| write_failed(format!("Failed to create state dir: {}", err)))?;

        let mut temp_file = NamedTempFile::new_in(parent_dir)
            .map_err(|err| write_failed(format!("Temp file error: {}", err)))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|err| write_failed(format!("Failed to write temp state file: {}", err)))?;
        temp_file
            .flush()
            .map_err(|err| write_failed(format!("Failed to flush temp state file: {}", err)))?;
        temp_file
            .persist(&self.file_path)
            .map_err(|err| write_failed(format!("Failed to replace state file: {}", err.error)))?;

        Ok(())
    }
}
