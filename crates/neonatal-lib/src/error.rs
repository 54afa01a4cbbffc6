//! Error taxonomy for the prediction pipeline
//!
//! Fatal errors (`Configuration`, `CredentialRejected`) stop a run before any
//! record is processed. `Transport` and `Decode` are recovered per record by
//! the batch orchestrator.

use std::fmt;
use thiserror::Error;

/// Errors raised by the prediction pipeline
#[derive(Error, Debug)]
pub enum PredictorError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Credential rejected by endpoint: {0}")]
    CredentialRejected(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Decode(#[from] DecodeFailure),
}

impl PredictorError {
    /// True for errors that must halt a run before the batch starts
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PredictorError::Configuration(_) | PredictorError::CredentialRejected(_)
        )
    }
}

impl From<reqwest::Error> for PredictorError {
    fn from(err: reqwest::Error) -> Self {
        PredictorError::Transport(err.to_string())
    }
}

/// No decode strategy recovered a plausible prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeFailure {
    /// Length of the raw response in characters
    pub response_len: usize,
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no plausible prediction found in response ({} chars)",
            self.response_len
        )
    }
}

impl std::error::Error for DecodeFailure {}

/// Errors raised while reading or writing tabular data
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid record on line {line}: {reason}")]
    InvalidRecord { line: u64, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(PredictorError::Configuration("missing key".into()).is_fatal());
        assert!(PredictorError::CredentialRejected("bad key".into()).is_fatal());
        assert!(!PredictorError::Transport("timeout".into()).is_fatal());
        assert!(!PredictorError::Decode(DecodeFailure { response_len: 12 }).is_fatal());
    }

    #[test]
    fn test_decode_failure_reports_length() {
        let err = PredictorError::from(DecodeFailure { response_len: 4096 });
        assert_eq!(
            err.to_string(),
            "no plausible prediction found in response (4096 chars)"
        );
    }
}
