//! Error types for grass-core operations.

use std::path::PathBuf;

/// All errors that can occur while tracking sessions.
///
/// Most of these are absorbed close to where they happen (a corrupt state file
/// becomes a fresh state, a failing sink is logged and skipped). The ones that
/// escape are configuration problems at startup and bookkeeping failures
/// surfaced from [`crate::SessionRecorder::shutdown`].
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Home directory not found")]
    HomeDirNotFound,

    // ─────────────────────────────────────────────────────────────────────
    // State File Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("State file corrupt: {path}: {details}")]
    CorruptState { path: PathBuf, details: String },

    #[error("State write failed: {path}: {details}")]
    StateWriteFailed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // History Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("History database error: {context}: {source}")]
    Database {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Output Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Output {sink} failed: {details}")]
    Delivery { sink: &'static str, details: String },

    #[error("HTTP request failed: {context}: {source}")]
    Http {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TrackerError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TrackerError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn db(context: impl Into<String>, source: rusqlite::Error) -> Self {
        TrackerError::Database {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results using TrackerError.
pub type Result<T> = std::result::Result<T, TrackerError>;
