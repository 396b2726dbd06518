//! Tunbridge Engine - Collaborator seam for an external proxy engine
//!
//! The proxying itself (protocols, routing, transports) belongs to an
//! externally supplied engine. This crate defines how the binding layer
//! talks to it and nothing more.
//!
//! # Architecture
//!
//! ```text
//!  payload ──▶ ConfigLoader ──▶ EngineConfig ──▶ EngineFactory::build
//!                  │                                     │
//!                  ▼                                     ▼
//!             ConfigDraft                          EngineHandle
//!      (clear_inbounds / retain_apps)         start / dial / close
//! ```
//!
//! # Guarantees
//!
//! - `EngineConfig` only exists after validation and is immutable
//! - `EngineHandle::close` runs the engine's close at most once
//! - Dialing a handle that is not running never reaches the engine

mod config;
mod engine;
mod error;
mod handle;

pub use config::{
    AppKind, AppModule, ConfigDraft, ConfigFormat, ConfigLoader, DocumentLoader, EngineConfig,
};
pub use engine::{Destination, Engine, EngineFactory, EngineStream, Network};
pub use error::{ConfigError, EngineError};
pub use handle::{EngineHandle, HandleState};
