//! Ephemeral Probe Runner
//!
//! Measures outbound delay with a throwaway engine instance built from a
//! caller supplied config. The instance:
//!
//! - never binds a listener (all inbounds are stripped)
//! - only runs the subsystems needed to dial out (see [`OUTBOUND_ONLY_APPS`])
//! - is closed before `run_probe` returns, whatever the probe outcome
//!
//! It is never shared and never becomes a primary instance.

use crate::error::{DelayResult, ProbeError};
use crate::probe::DelayProbe;
use std::sync::Arc;
use tracing::{debug, warn};
use tunbridge_engine::{AppKind, ConfigLoader, EngineConfig, EngineFactory, EngineHandle};

/// Subsystems kept in a probe instance, matched by kind
pub const OUTBOUND_ONLY_APPS: [AppKind; 5] = [
    AppKind::Log,
    AppKind::Dispatcher,
    AppKind::InboundManager,
    AppKind::OutboundManager,
    AppKind::Router,
];

/// Runs one probe through a disposable engine instance
pub struct EphemeralProbeRunner {
    loader: Arc<dyn ConfigLoader>,
    factory: Arc<dyn EngineFactory>,
    probe: DelayProbe,
    allowed_apps: Vec<AppKind>,
}

impl EphemeralProbeRunner {
    /// Create a runner keeping the default outbound-only subsystems
    pub fn new(
        loader: Arc<dyn ConfigLoader>,
        factory: Arc<dyn EngineFactory>,
        probe: DelayProbe,
    ) -> Self {
        Self {
            loader,
            factory,
            probe,
            allowed_apps: OUTBOUND_ONLY_APPS.to_vec(),
        }
    }

    /// Replace the subsystem allow-list
    pub fn with_allowed_apps(mut self, apps: Vec<AppKind>) -> Self {
        self.allowed_apps = apps;
        self
    }

    pub fn allowed_apps(&self) -> &[AppKind] {
        &self.allowed_apps
    }

    /// Parse and trim a config for probing
    pub fn prepare_config(&self, config_text: &str) -> Result<EngineConfig, ProbeError> {
        let mut draft = self.loader.decode_text(config_text)?;
        draft.clear_inbounds();
        draft.retain_apps(&self.allowed_apps);
        Ok(draft.finalize()?)
    }

    /// Build, start, probe once, tear down.
    ///
    /// Teardown errors are logged and dropped; the probe's own result wins.
    pub async fn run_probe(&self, config_text: &str, url: &str) -> DelayResult {
        let config = self.prepare_config(config_text)?;
        let handle = EngineHandle::build(self.factory.as_ref(), config).await?;
        debug!("Ephemeral engine #{} built for probe", handle.id());

        let result = self.start_and_measure(&handle, url).await;

        if let Err(e) = handle.close().await {
            warn!("Ephemeral engine #{} teardown failed: {}", handle.id(), e);
        }

        result
    }

    async fn start_and_measure(&self, handle: &EngineHandle, url: &str) -> DelayResult {
        handle.start().await?;
        self.probe.measure(handle, url).await
    }
}
