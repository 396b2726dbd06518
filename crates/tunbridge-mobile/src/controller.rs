//! Instance Controller
//!
//! Owns the primary engine instance for one host session.
//!
//! # Usage
//!
//! ```rust,ignore
//! let controller = InstanceController::new(loader, factory, ControllerOptions::default());
//!
//! controller.start(&config_bytes, &TracingLogSink).await?;
//! let delay = controller.measure_delay("").await?;
//! controller.stop().await?;
//! ```
//!
//! # Concurrency
//!
//! - `start` and `stop` are mutually exclusive. A call that finds the other
//!   in progress is refused with [`ControllerError::Busy`].
//! - The slot lock is only held to read or swap the handle, never across
//!   engine I/O. Probes clone the `Arc` and release the lock first.

use crate::log_sink::LogSink;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};
use tunbridge_engine::{ConfigError, ConfigLoader, EngineError, EngineFactory, EngineHandle};
use tunbridge_probe::{DelayProbe, DelayResult, EphemeralProbeRunner, ProbeConfig, ProbeError};

/// Binding layer version, reported next to the engine version
pub const LIB_VERSION: u32 = 1;

/// What `start` does with an instance that was built but failed to start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartFailurePolicy {
    /// Close the failed instance and leave the slot empty
    #[default]
    CloseAndDiscard,
    /// Install the failed instance anyway so `stop` can release it
    InstallAnyway,
}

/// Controller errors
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Another start or stop is in progress")]
    Busy,

    #[error("Engine instance already running")]
    AlreadyRunning,

    #[error("No engine instance")]
    MissingInstance,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Controller options
#[derive(Debug, Clone, Default)]
pub struct ControllerOptions {
    pub probe: ProbeConfig,
    pub start_failure: StartFailurePolicy,
}

/// Lifecycle owner of the primary instance
pub struct InstanceController {
    loader: Arc<dyn ConfigLoader>,
    factory: Arc<dyn EngineFactory>,
    probe: DelayProbe,
    runner: EphemeralProbeRunner,
    start_failure: StartFailurePolicy,
    /// Primary instance slot
    slot: RwLock<Option<Arc<EngineHandle>>>,
    /// Serializes start/stop
    lifecycle: Mutex<()>,
}

impl InstanceController {
    /// Create a controller with an empty slot
    pub fn new(
        loader: Arc<dyn ConfigLoader>,
        factory: Arc<dyn EngineFactory>,
        options: ControllerOptions,
    ) -> Self {
        let probe = DelayProbe::new(options.probe);
        Self::with_probe(loader, factory, probe, options.start_failure)
    }

    /// Create a controller around a preconfigured probe
    pub fn with_probe(
        loader: Arc<dyn ConfigLoader>,
        factory: Arc<dyn EngineFactory>,
        probe: DelayProbe,
        start_failure: StartFailurePolicy,
    ) -> Self {
        let runner = EphemeralProbeRunner::new(loader.clone(), factory.clone(), probe.clone());

        Self {
            loader,
            factory,
            probe,
            runner,
            start_failure,
            slot: RwLock::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    /// Decode `config`, build and start the primary instance.
    ///
    /// Decode, construction and start errors are reported to `sink` and
    /// returned. A decode or construction failure never touches the slot.
    pub async fn start(&self, config: &[u8], sink: &dyn LogSink) -> Result<(), ControllerError> {
        let _lifecycle = self.lifecycle.try_lock().map_err(|_| ControllerError::Busy)?;

        if self.slot.read().await.is_some() {
            return Err(ControllerError::AlreadyRunning);
        }

        let config = self.loader.decode_binary(config).map_err(|e| {
            error!("Failed to decode engine config: {}", e);
            sink.log_data(&e.to_string());
            e
        })?;

        let handle = EngineHandle::build(self.factory.as_ref(), config)
            .await
            .map_err(|e| {
                error!("Failed to build engine: {}", e);
                sink.log_data(&e.to_string());
                e
            })?;
        let handle = Arc::new(handle);

        if let Err(e) = handle.start().await {
            error!("Engine #{} failed to start: {}", handle.id(), e);
            sink.log_data(&e.to_string());

            match self.start_failure {
                StartFailurePolicy::CloseAndDiscard => {
                    if let Err(close_err) = handle.close().await {
                        warn!("Closing failed engine #{}: {}", handle.id(), close_err);
                    }
                }
                StartFailurePolicy::InstallAnyway => {
                    *self.slot.write().await = Some(handle);
                }
            }

            return Err(e.into());
        }

        info!("Engine #{} installed as primary instance", handle.id());
        *self.slot.write().await = Some(handle);
        Ok(())
    }

    /// Close and remove the primary instance
    pub async fn stop(&self) -> Result<(), ControllerError> {
        let _lifecycle = self.lifecycle.try_lock().map_err(|_| ControllerError::Busy)?;

        let handle = self
            .slot
            .write()
            .await
            .take()
            .ok_or(ControllerError::MissingInstance)?;

        info!("Stopping engine #{}", handle.id());
        handle.close().await?;
        Ok(())
    }

    /// Engine version, independent of any instance
    pub fn version(&self) -> String {
        self.factory.version()
    }

    /// Binding and engine versions in one line
    pub fn version_report(&self) -> String {
        format!("Lib v{}, Engine v{}", LIB_VERSION, self.version())
    }

    /// Current primary instance, if any
    pub async fn instance(&self) -> Option<Arc<EngineHandle>> {
        self.slot.read().await.clone()
    }

    /// Check if a primary instance is installed and running
    pub async fn is_running(&self) -> bool {
        self.slot
            .read()
            .await
            .as_ref()
            .is_some_and(|handle| handle.is_running())
    }

    /// Probe latency through the primary instance
    pub async fn measure_delay(&self, url: &str) -> DelayResult {
        let handle = self.instance().await.ok_or(ProbeError::MissingInstance)?;
        self.probe.measure(&handle, url).await
    }

    /// Probe latency through a disposable instance built from `config_text`
    pub async fn measure_outbound_delay(&self, config_text: &str, url: &str) -> DelayResult {
        self.runner.run_probe(config_text, url).await
    }
}
