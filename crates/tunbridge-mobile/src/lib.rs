//! Tunbridge Mobile - Binding layer for a proxy engine on mobile hosts
//!
//! Lets a host application (iOS/Android bridge) run one long-lived engine
//! instance and measure latency through it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    Host application                      │
//! └───────────────┬──────────────────────────────────────────┘
//!                 │ blocking calls
//!                 ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │ MobileBridge (tokio runtime, memory ceiling)             │
//! │   └── InstanceController                                 │
//! │         ├── primary slot ── EngineHandle ──▶ engine      │
//! │         ├── DelayProbe (through the primary instance)    │
//! │         └── EphemeralProbeRunner (private instance)      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Features
//!
//! - **Guarded lifecycle**: start/stop are mutually exclusive, stop without
//!   an instance is an error, never a crash
//! - **Host log sink**: decode/build/start failures are reported to the host
//! - **Delay probes**: single bounded attempt, 200/204 only
//! - **Disposable probe instances**: no listeners, always torn down

mod bridge;
mod config;
mod controller;
mod log_sink;
mod logging;
mod memory;

pub use bridge::{BridgeError, MobileBridge, ProbeReport};
pub use config::{BridgeConfig, BridgeConfigError, RuntimeOptions};
pub use controller::{
    ControllerError, ControllerOptions, InstanceController, LIB_VERSION, StartFailurePolicy,
};
pub use log_sink::{LogSink, TracingLogSink};
pub use logging::init_logging;
pub use memory::{MemoryCeiling, MemoryError, MemoryPressure, read_rss};

pub use tunbridge_engine as engine;
pub use tunbridge_probe as probe;
