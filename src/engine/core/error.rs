//! Error types for the compression engine.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that end the processing of a single file.
///
/// None of these abort a batch: the batch runner reports them as an
/// `Error` event and moves on to the next file.
#[derive(Debug, Error)]
pub enum CompressError {
    /// The task names a profile the store does not know.
    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    /// The encoder ran but did not exit cleanly.
    #[error("encoder exited with {} while running: {command}", describe_exit(.exit_code))]
    EncodeFailed {
        /// `None` when the process was terminated by a signal.
        exit_code: Option<i32>,
        command: String,
    },

    /// The encoder could not be started at all.
    #[error("failed to start encoder '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error while talking to the encoder.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompressError {
    /// Exit code carried by an `EncodeFailed` error.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::EncodeFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

/// Violations of the task data model.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("output path must differ from source path: {}", .0.display())]
    SameSourceAndOutput(PathBuf),

    #[error("unknown speed preset '{0}'")]
    UnknownPreset(String),

    #[error("invalid profile name '{0}': must be usable as a plain file name")]
    InvalidProfileName(String),

    #[error("additional argument '{0}' conflicts with an option the encoder command already sets")]
    ReservedArgument(String),
}

/// Errors from the process-wide service slot.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("compression service is already installed")]
    AlreadyInstalled,
}
