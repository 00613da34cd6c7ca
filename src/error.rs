//! Error types for VoxNova

use std::io;
use thiserror::Error;

/// Main error type for VoxNova
#[derive(Error, Debug)]
pub enum VoxError {
    /// The speech engine could not be reached, or it reported no voices.
    #[error("Speech backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Speech engine failed to initialize: {0}")]
    EngineInitFailed(String),

    /// A job is already running; submissions are never queued.
    #[error("A synthesis job is already running")]
    Busy,

    #[error("Nothing to synthesize: text is empty")]
    EmptyText,

    #[error("Synthesis produced no output. The speech backend may be missing on this platform.")]
    SynthesisProducedNoOutput,

    #[error("Speech backend error: {0}")]
    BackendRuntime(String),

    /// A single engine property was refused. Jobs log this and carry on.
    #[error("Backend rejected {property}: {detail}")]
    ConfigPropertyRejected { property: String, detail: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl VoxError {
    /// Whether this failure should end the job that raised it.
    ///
    /// Only rejected properties are tolerated mid-job.
    pub fn is_fatal_to_job(&self) -> bool {
        !matches!(self, VoxError::ConfigPropertyRejected { .. })
    }
}

/// Result type alias for VoxNova operations
pub type Result<T> = std::result::Result<T, VoxError>;

impl From<String> for VoxError {
    fn from(s: String) -> Self {
        VoxError::Other(s)
    }
}

impl From<&str> for VoxError {
    fn from(s: &str) -> Self {
        VoxError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_property_is_not_fatal() {
        let err = VoxError::ConfigPropertyRejected {
            property: "rate".to_string(),
            detail: "unsupported".to_string(),
        };
        assert!(!err.is_fatal_to_job());
        assert!(VoxError::SynthesisProducedNoOutput.is_fatal_to_job());
        assert!(VoxError::BackendRuntime("boom".into()).is_fatal_to_job());
    }

    #[test]
    fn test_from_str() {
        let err: VoxError = "plain".into();
        assert_eq!(err.to_string(), "plain");
    }
}
