//! Error types for the relay module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while probing or relaying.
#[derive(Debug, Error)]
pub enum RelayError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// The relay process could not be started.
    #[error("Failed to spawn relay: {reason}")]
    SpawnFailed { reason: String },

    /// A relay was requested for a candidate that has not been probed.
    #[error("Candidate has no probed duration: {locator}")]
    Unprobed { locator: String },

    /// I/O error while talking to the child process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Creates a new spawn failed error.
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            reason: reason.into(),
        }
    }
}
