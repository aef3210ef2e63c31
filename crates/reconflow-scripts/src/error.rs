//! Error types for script execution.

use reconflow_sources::SourceError;
use thiserror::Error;

/// Errors that can occur while running a script.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// The named script does not exist in the script directory
    #[error("Script not found: {0}")]
    NotFound(String),

    /// The script name is not a plain file name
    #[error("invalid script name: {0}")]
    InvalidName(String),

    /// The domain cannot be used as an output directory name
    #[error("invalid domain: {0}")]
    InvalidDomain(String),

    /// The process could not be started
    #[error("failed to start {script}: {source}")]
    Spawn {
        /// Script that failed to start
        script: String,
        /// Underlying cause
        #[source]
        source: std::io::Error,
    },

    /// The script ran and exited with a nonzero code
    #[error("Script exited with code {code}: {stderr}")]
    NonZeroExit {
        /// Exit code
        code: i32,
        /// Everything the script wrote to stderr
        stderr: String,
    },

    /// The script was killed before it exited on its own
    #[error("Script was terminated before completion")]
    Terminated,

    /// The script was killed by a signal it did not get from us
    #[error("Script was terminated by signal {0}")]
    Signaled(i32),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ScriptError> for SourceError {
    fn from(err: ScriptError) -> Self {
        SourceError::Process(err.to_string())
    }
}

/// Result type alias for script operations.
pub type Result<T> = std::result::Result<T, ScriptError>;
