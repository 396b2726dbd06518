//! Bridge Configuration
//!
//! Everything the host can tune before the first call into the bridge.
//! Loadable from TOML or JSON; every field has a default, so an empty
//! document is a valid configuration.
//!
//! ```toml
//! start_failure = "close_and_discard"
//! text_format = "json"
//! log_level = "info"
//!
//! [probe]
//! default_url = "https://www.google.com/generate_204"
//! request_timeout_ms = 12000
//!
//! [runtime]
//! worker_threads = 2
//! memory_limit_bytes = 67108864
//! ```

use crate::controller::{ControllerOptions, StartFailurePolicy};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};
use tunbridge_engine::ConfigFormat;
use tunbridge_probe::ProbeConfig;

/// Bridge configuration errors
#[derive(Debug, Clone, Error)]
pub enum BridgeConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported config format")]
    UnsupportedFormat,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Async runtime sizing and memory ceiling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Worker threads (tokio default when unset)
    pub worker_threads: Option<usize>,
    /// Worker thread name
    pub thread_name: String,
    /// Soft resident memory ceiling (bytes); enables the memory watcher
    pub memory_limit_bytes: Option<u64>,
    /// Memory watcher poll interval (milliseconds)
    pub memory_poll_interval_ms: u64,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: "tunbridge-worker".to_string(),
            memory_limit_bytes: None,
            memory_poll_interval_ms: 1_000,
        }
    }
}

impl RuntimeOptions {
    pub fn memory_poll_interval(&self) -> Duration {
        Duration::from_millis(self.memory_poll_interval_ms)
    }

    /// Build the multi-thread runtime the bridge blocks on
    pub fn build_runtime(&self) -> io::Result<Runtime> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(self.thread_name.clone());
        if let Some(threads) = self.worker_threads {
            builder.worker_threads(threads);
        }
        builder.build()
    }
}

/// Bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Handling of instances that fail to start
    pub start_failure: StartFailurePolicy,
    /// Format of the text configs handed to outbound delay probes
    pub text_format: ConfigFormat,
    /// Install a `tracing` subscriber with this filter when set
    pub log_level: Option<String>,
    /// Delay probe settings
    pub probe: ProbeConfig,
    /// Runtime sizing
    pub runtime: RuntimeOptions,
}

impl BridgeConfig {
    /// Load from file, format chosen by extension
    pub fn load(path: &Path) -> Result<Self, BridgeConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let content = match ext {
            "toml" | "json" => {
                std::fs::read_to_string(path).map_err(|e| BridgeConfigError::Io(e.to_string()))?
            }
            _ => return Err(BridgeConfigError::UnsupportedFormat),
        };

        if ext == "toml" {
            Self::from_toml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    /// Load from TOML string
    pub fn from_toml(content: &str) -> Result<Self, BridgeConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| BridgeConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from JSON string
    pub fn from_json(content: &str) -> Result<Self, BridgeConfigError> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| BridgeConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Export as TOML
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), BridgeConfigError> {
        if self.probe.request_timeout_ms == 0 {
            return Err(BridgeConfigError::Invalid(
                "probe.request_timeout_ms must be positive".into(),
            ));
        }
        if self.probe.tls_handshake_timeout_ms == 0 {
            return Err(BridgeConfigError::Invalid(
                "probe.tls_handshake_timeout_ms must be positive".into(),
            ));
        }
        if self.runtime.worker_threads == Some(0) {
            return Err(BridgeConfigError::Invalid(
                "runtime.worker_threads must be positive".into(),
            ));
        }
        if self.runtime.memory_limit_bytes == Some(0) {
            return Err(BridgeConfigError::Invalid(
                "runtime.memory_limit_bytes must be positive".into(),
            ));
        }
        if self.runtime.memory_poll_interval_ms == 0 {
            return Err(BridgeConfigError::Invalid(
                "runtime.memory_poll_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Options for the instance controller
    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            probe: self.probe.clone(),
            start_failure: self.start_failure,
        }
    }
}
