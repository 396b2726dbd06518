//! Error types for the engine seam

use thiserror::Error;

/// Configuration errors
///
/// Produced by a [`ConfigLoader`](crate::ConfigLoader) when a payload cannot
/// be decoded or does not describe a usable engine.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Config decode error: {0}")]
    Decode(String),

    #[error("Config payload is not valid UTF-8")]
    Encoding,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Engine errors
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine rejected a validated config
    #[error("Engine construction failed: {0}")]
    Construction(String),

    /// The engine was built but could not reach the running state
    #[error("Engine start failed: {0}")]
    Start(String),

    #[error("Engine close failed: {0}")]
    Close(String),

    #[error("Engine already started")]
    AlreadyStarted,

    #[error("Engine is closed")]
    Closed,

    #[error("Engine not running")]
    NotRunning,
}
