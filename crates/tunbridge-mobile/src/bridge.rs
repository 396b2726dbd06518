//! Mobile Bridge
//!
//! Synchronous facade handed to the host application. Every call blocks the
//! calling thread on the bridge's own tokio runtime until the controller
//! finishes, bounded by the probe timeouts for delay measurements.
//!
//! Calls must come from host threads, never from inside an async context.
//!
//! # Usage
//!
//! ```rust,ignore
//! let bridge = MobileBridge::new(loader, factory, BridgeConfig::default())?;
//!
//! bridge.start(config_json.as_bytes(), &|msg: &str| host_log(msg))?;
//! let report = bridge.measure_delay("");
//! println!("{} -> {}ms", bridge.check_version(), report.delay_ms);
//! bridge.stop()?;
//! ```

use crate::config::{BridgeConfig, BridgeConfigError};
use crate::controller::{ControllerError, InstanceController};
use crate::log_sink::LogSink;
use crate::logging::init_logging;
use crate::memory::{MemoryCeiling, MemoryError};
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tunbridge_engine::{ConfigLoader, DocumentLoader, EngineFactory};
use tunbridge_probe::{DelayResult, delay_millis};

/// Bridge construction errors
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] BridgeConfigError),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Delay result flattened for hosts that cannot receive Rust errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// Latency in milliseconds, `-1` on failure
    pub delay_ms: i64,
    /// Failure description
    pub error: Option<String>,
}

impl ProbeReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl From<DelayResult> for ProbeReport {
    fn from(result: DelayResult) -> Self {
        Self {
            delay_ms: delay_millis(&result),
            error: result.err().map(|e| e.to_string()),
        }
    }
}

/// Blocking entry points for the host application
pub struct MobileBridge {
    runtime: Runtime,
    controller: InstanceController,
    memory: Option<MemoryCeiling>,
}

impl MobileBridge {
    /// Create a bridge with its own runtime
    pub fn new(
        loader: Arc<dyn ConfigLoader>,
        factory: Arc<dyn EngineFactory>,
        config: BridgeConfig,
    ) -> Result<Self, BridgeError> {
        config.validate()?;

        if let Some(filter) = &config.log_level {
            init_logging(filter);
        }

        let runtime = config.runtime.build_runtime()?;
        let memory = config
            .runtime
            .memory_limit_bytes
            .map(|ceiling| MemoryCeiling::start(ceiling, config.runtime.memory_poll_interval()))
            .transpose()?;

        let controller = InstanceController::new(loader, factory, config.controller_options());
        info!("Mobile bridge ready ({})", controller.version_report());

        Ok(Self {
            runtime,
            controller,
            memory,
        })
    }

    /// Create a bridge using the document loader in the configured text format
    pub fn with_factory(
        factory: Arc<dyn EngineFactory>,
        config: BridgeConfig,
    ) -> Result<Self, BridgeError> {
        let loader = Arc::new(DocumentLoader::new(config.text_format));
        Self::new(loader, factory, config)
    }

    /// Start the primary instance from a JSON payload
    pub fn start(&self, config: &[u8], sink: &dyn LogSink) -> Result<(), ControllerError> {
        self.runtime.block_on(self.controller.start(config, sink))
    }

    /// Stop the primary instance
    pub fn stop(&self) -> Result<(), ControllerError> {
        self.runtime.block_on(self.controller.stop())
    }

    /// Engine version
    pub fn version(&self) -> String {
        self.controller.version()
    }

    /// Binding and engine versions, e.g. `Lib v1, Engine v1.8.1`
    pub fn check_version(&self) -> String {
        self.controller.version_report()
    }

    pub fn is_running(&self) -> bool {
        self.runtime.block_on(self.controller.is_running())
    }

    /// Probe latency through the primary instance
    pub fn measure_delay(&self, url: &str) -> ProbeReport {
        self.runtime.block_on(self.controller.measure_delay(url)).into()
    }

    /// Probe latency through a disposable instance built from `config`
    pub fn measure_outbound_delay(&self, config: &str, url: &str) -> ProbeReport {
        self.runtime
            .block_on(self.controller.measure_outbound_delay(config, url))
            .into()
    }

    /// Memory watcher, when a ceiling is configured
    pub fn memory(&self) -> Option<&MemoryCeiling> {
        self.memory.as_ref()
    }

    /// Async controller, for hosts that run their own runtime
    pub fn controller(&self) -> &InstanceController {
        &self.controller
    }
}

impl Drop for MobileBridge {
    fn drop(&mut self) {
        // block_on panics inside an async context; the handle then only warns on drop
        if tokio::runtime::Handle::try_current().is_ok() {
            return;
        }
        match self.runtime.block_on(self.controller.stop()) {
            Ok(()) => info!("Primary instance stopped with the bridge"),
            Err(ControllerError::MissingInstance) => {}
            Err(e) => warn!("Failed to stop primary instance with the bridge: {}", e),
        }
    }
}
