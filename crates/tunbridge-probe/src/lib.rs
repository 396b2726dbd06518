//! Tunbridge Probe - Latency measurement through an engine instance
//!
//! Two entry points:
//!
//! - [`DelayProbe::measure`]: one HTTP GET through a live [`EngineHandle`]
//! - [`EphemeralProbeRunner::run_probe`]: builds a private outbound-only
//!   instance, probes once through it and tears it down
//!
//! ```text
//!  DelayProbe ──GET──▶ hyper http1 ──▶ (rustls) ──▶ EngineHandle::dial ──▶ engine
//! ```
//!
//! [`EngineHandle`]: tunbridge_engine::EngineHandle

mod ephemeral;
mod error;
mod probe;

pub use ephemeral::{EphemeralProbeRunner, OUTBOUND_ONLY_APPS};
pub use error::{DelayResult, ProbeError, ProbeFailure, delay_millis};
pub use probe::{DEFAULT_PROBE_URL, DelayProbe, ProbeConfig};
