//! Engine Handle
//!
//! Wraps one engine instance and enforces its lifecycle:
//!
//! ```text
//!   New ──start()──▶ Running ──close()──▶ Closed
//!    │                                      ▲
//!    └──start() fails──▶ Failed ──close()───┘
//! ```
//!
//! `close()` is idempotent: the engine's own close runs at most once, later
//! calls return `Ok(false)`. Dialing is only allowed while running.

use crate::config::EngineConfig;
use crate::engine::{Destination, Engine, EngineFactory, EngineStream};
use crate::error::EngineError;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Handle lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Built, not started
    New,
    /// Started successfully
    Running,
    /// Start was attempted and failed
    Failed,
    /// Closed (terminal)
    Closed,
}

impl HandleState {
    /// Check if the handle can carry traffic
    pub fn is_running(&self) -> bool {
        matches!(self, HandleState::Running)
    }

    /// Check if the handle reached its terminal state
    pub fn is_closed(&self) -> bool {
        matches!(self, HandleState::Closed)
    }
}

/// Owned reference to one engine instance
pub struct EngineHandle {
    /// Identifier for log correlation
    id: u64,
    /// The wrapped instance
    engine: Box<dyn Engine>,
    /// Lifecycle state, serializes start/close
    state: Mutex<HandleState>,
    /// Lock-free mirror of `state == Running` for the dial path
    running: AtomicBool,
}

impl EngineHandle {
    /// Wrap an already built instance
    pub fn from_engine(engine: Box<dyn Engine>) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            engine,
            state: Mutex::new(HandleState::New),
            running: AtomicBool::new(false),
        }
    }

    /// Build a new instance through the factory
    pub async fn build(
        factory: &dyn EngineFactory,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let engine = factory.build(config).await?;
        let handle = Self::from_engine(engine);
        debug!("Engine handle #{} built", handle.id);
        Ok(handle)
    }

    /// Handle identifier
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current state
    pub async fn state(&self) -> HandleState {
        *self.state.lock().await
    }

    /// Check if the handle is running without waiting on the lifecycle lock
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start the instance
    pub async fn start(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        match *state {
            HandleState::New => {}
            HandleState::Running | HandleState::Failed => return Err(EngineError::AlreadyStarted),
            HandleState::Closed => return Err(EngineError::Closed),
        }

        match self.engine.start().await {
            Ok(()) => {
                *state = HandleState::Running;
                self.running.store(true, Ordering::Release);
                info!("Engine handle #{} running", self.id);
                Ok(())
            }
            Err(e) => {
                *state = HandleState::Failed;
                Err(e)
            }
        }
    }

    /// Close the instance.
    ///
    /// Returns `Ok(true)` if this call closed the engine and `Ok(false)` if
    /// the handle was already closed.
    pub async fn close(&self) -> Result<bool, EngineError> {
        let mut state = self.state.lock().await;
        if state.is_closed() {
            debug!("Engine handle #{} already closed", self.id);
            return Ok(false);
        }

        self.running.store(false, Ordering::Release);
        *state = HandleState::Closed;

        self.engine.close().await?;
        info!("Engine handle #{} closed", self.id);
        Ok(true)
    }

    /// Dial through the engine
    pub async fn dial(&self, destination: &Destination) -> io::Result<Box<dyn EngineStream>> {
        if !self.is_running() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, EngineError::NotRunning));
        }

        debug!("Engine handle #{} dialing {}", self.id, destination);
        self.engine.dial(destination).await
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("id", &self.id)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("Engine handle #{} dropped while running", self.id);
        }
    }
}
