//! Probe errors

use std::time::Duration;
use thiserror::Error;
use tunbridge_engine::{ConfigError, EngineError};

/// Result of one delay probe, in milliseconds
pub type DelayResult = Result<u64, ProbeError>;

/// Probe errors
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    #[error("No engine instance")]
    MissingInstance,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Dial failed: {0}")]
    Dial(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("{code} {reason}")]
    Status { code: u16, reason: String },

    #[error("Probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Coarse failure category, for hosts that only branch on the kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailure {
    NilInstance,
    Dial,
    Status,
    Timeout,
    Other,
}

impl ProbeError {
    /// Classify the error
    pub fn category(&self) -> ProbeFailure {
        match self {
            ProbeError::MissingInstance => ProbeFailure::NilInstance,
            ProbeError::Engine(EngineError::NotRunning) => ProbeFailure::NilInstance,
            ProbeError::Dial(_) | ProbeError::Tls(_) => ProbeFailure::Dial,
            ProbeError::Status { .. } => ProbeFailure::Status,
            ProbeError::Timeout(_) => ProbeFailure::Timeout,
            _ => ProbeFailure::Other,
        }
    }

    /// Check if the probe never got an answer in time
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Timeout(_))
    }
}

/// Latency in milliseconds, or `-1` for any failure
pub fn delay_millis(result: &DelayResult) -> i64 {
    match result {
        Ok(ms) => i64::try_from(*ms).unwrap_or(i64::MAX),
        Err(_) => -1,
    }
}
