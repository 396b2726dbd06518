//! Memory Ceiling
//!
//! Mobile hosts kill background processes that grow too large. When a
//! ceiling is configured, a watcher thread polls the resident set size and
//! logs every pressure level change.
//!
//! Pressure levels (relative to the ceiling):
//! - Low: < 50%
//! - Medium: 50-80%
//! - High: 80-100%
//! - Critical: over the ceiling

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Memory watcher errors
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Failed to get process info")]
    ProcessNotFound,

    #[error("Failed to spawn memory watcher: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Memory pressure levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemoryPressure {
    Low,
    Medium,
    High,
    Critical,
}

impl MemoryPressure {
    /// Determine pressure level from RSS and ceiling
    pub fn from_usage(rss: u64, ceiling: u64) -> Self {
        let ratio = rss as f64 / ceiling.max(1) as f64;

        if ratio >= 1.0 {
            Self::Critical
        } else if ratio >= 0.8 {
            Self::High
        } else if ratio >= 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    fn to_usize(self) -> usize {
        self as usize
    }

    fn from_usize(value: usize) -> Self {
        match value {
            0 => Self::Low,
            1 => Self::Medium,
            2 => Self::High,
            _ => Self::Critical,
        }
    }
}

/// Read the resident set size of this process (bytes)
pub fn read_rss() -> Result<u64, MemoryError> {
    let mut system = System::new();
    sample_rss(&mut system).ok_or(MemoryError::ProcessNotFound)
}

fn sample_rss(system: &mut System) -> Option<u64> {
    let pid = Pid::from_u32(std::process::id());
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::everything(),
    );
    system.process(pid).map(|p| p.memory())
}

/// Background watcher for a soft memory ceiling
pub struct MemoryCeiling {
    ceiling: u64,
    current_rss: Arc<AtomicU64>,
    current_pressure: Arc<AtomicUsize>,
    stop_tx: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl MemoryCeiling {
    /// Spawn the watcher thread
    pub fn start(ceiling: u64, poll_interval: Duration) -> Result<Self, MemoryError> {
        let current_rss = Arc::new(AtomicU64::new(0));
        let current_pressure = Arc::new(AtomicUsize::new(MemoryPressure::Low.to_usize()));
        let (stop_tx, stop_rx) = bounded(1);

        let rss = current_rss.clone();
        let pressure = current_pressure.clone();
        let thread = thread::Builder::new()
            .name("tunbridge-memory".to_string())
            .spawn(move || watch(ceiling, poll_interval, stop_rx, rss, pressure))?;

        info!("Memory ceiling watcher started ({} bytes)", ceiling);

        Ok(Self {
            ceiling,
            current_rss,
            current_pressure,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    /// Last sampled RSS in bytes (0 before the first sample)
    pub fn current_rss(&self) -> u64 {
        self.current_rss.load(Ordering::Relaxed)
    }

    pub fn pressure(&self) -> MemoryPressure {
        MemoryPressure::from_usize(self.current_pressure.load(Ordering::Relaxed))
    }

    /// Stop the watcher and wait for its thread
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for MemoryCeiling {
    fn drop(&mut self) {
        self.stop();
    }
}

fn watch(
    ceiling: u64,
    poll_interval: Duration,
    stop_rx: Receiver<()>,
    current_rss: Arc<AtomicU64>,
    current_pressure: Arc<AtomicUsize>,
) {
    let mut system = System::new();
    let mut last = MemoryPressure::Low;

    loop {
        if let Some(rss) = sample_rss(&mut system) {
            current_rss.store(rss, Ordering::Relaxed);

            let pressure = MemoryPressure::from_usage(rss, ceiling);
            current_pressure.store(pressure.to_usize(), Ordering::Relaxed);

            if pressure != last {
                if pressure >= MemoryPressure::High {
                    warn!(
                        "Memory pressure {:?} -> {:?} (RSS: {} / {} bytes)",
                        last, pressure, rss, ceiling
                    );
                } else {
                    info!("Memory pressure {:?} -> {:?} (RSS: {} bytes)", last, pressure, rss);
                }
                last = pressure;
            }
        }

        match stop_rx.recv_timeout(poll_interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            _ => break,
        }
    }

    debug!("Memory ceiling watcher stopped");
}
